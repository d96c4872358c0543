//! セットシンボルカタログの構築
//!
//! 1. ローカルキャッシュを遅延エントリとして登録
//! 2. 年代判定で「そのセットに存在するレアリティ」を決める
//! 3. 足りないレアリティだけ、セットの印刷を古い順に取得してシンボルを抽出
//!
//! 取得できなかったセットは `CatalogIncomplete` として報告するが、処理は続ける。
//! 発売日も枠も分からないセットは「年代不明」とし、不足の判定をしない。

use super::{SetSymbolCatalog, StoreOutcome};
use crate::cancel::CancelContext;
use crate::catalog::CardCatalog;
use crate::detection::{DetectionInterpreter, Detector};
use crate::error::{MoxError, Result};
use crate::scanner::encode_png;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use indicatif::{ProgressBar, ProgressStyle};
use mox_common::{expected_rarities, DetectionClass, EraInputs, Printing, Rarity, RaritySet, RawDetections, SetMeta};
use tokio::runtime::{Handle, RuntimeFlavor};

/// 背景に貼り付けるときの余白 (px)
const BACKGROUND_PADDING: u32 = 5;

/// セットごとの構築結果
#[derive(Debug, Clone, Default)]
pub struct SetBuildOutcome {
    pub set_code: String,
    pub expected: Vec<Rarity>,
    pub found: RaritySet,
    /// 今回カタログから取得したレアリティ
    pub fetched: Vec<Rarity>,
    /// デジタル専用セットのためスキップ
    pub skipped_digital: bool,
    /// セットの印刷一覧を取得できなかった
    pub fetch_error: Option<String>,
    /// 年代を判定できず、必要なレアリティが分からない
    pub era_unknown: bool,
}

impl SetBuildOutcome {
    pub fn missing(&self) -> Vec<Rarity> {
        self.found.missing(&self.expected)
    }

    pub fn is_complete(&self) -> bool {
        self.skipped_digital || (!self.era_unknown && self.found.covers(&self.expected))
    }

    /// 必要なレアリティが分かっていて、それが揃っていない
    pub fn is_incomplete(&self) -> bool {
        !self.skipped_digital && !self.era_unknown && !self.found.covers(&self.expected)
    }

    /// 不足があれば `CatalogIncomplete`
    pub fn check(&self) -> Result<()> {
        if !self.is_incomplete() {
            Ok(())
        } else {
            Err(MoxError::CatalogIncomplete {
                set_code: self.set_code.clone(),
                missing: self.missing(),
            })
        }
    }
}

/// カタログ構築の集計
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub sets: Vec<SetBuildOutcome>,
}

impl BuildReport {
    pub fn incomplete(&self) -> impl Iterator<Item = &SetBuildOutcome> {
        self.sets.iter().filter(|s| s.is_incomplete())
    }

    pub fn era_unknown(&self) -> impl Iterator<Item = &SetBuildOutcome> {
        self.sets.iter().filter(|s| s.era_unknown)
    }

    pub fn complete_count(&self) -> usize {
        self.sets.iter().filter(|s| s.is_complete()).count()
    }

    pub fn fetched_count(&self) -> usize {
        self.sets.iter().map(|s| s.fetched.len()).sum()
    }
}

/// ローカルキャッシュだけで完全性を報告する（取得・検出はしない）
pub fn local_report(catalog: &SetSymbolCatalog, known_sets: &[SetMeta]) -> Result<BuildReport> {
    let scan = catalog.scan_local()?;
    tracing::info!(registered = scan.registered, dir = %catalog.dir().display(), "ローカルのシンボルを登録");

    let sets = known_sets.iter().map(|set| judge_set(catalog, set)).collect();
    Ok(BuildReport { sets })
}

/// キャッシュ済みのセットコードに、セット一覧のメタ情報を対応させる
///
/// 一覧にないコードは発売日なし（年代不明）のまま残す
pub fn cached_sets(catalog: &SetSymbolCatalog, listed: &[SetMeta]) -> Vec<SetMeta> {
    catalog
        .set_codes()
        .iter()
        .map(|code| {
            listed
                .iter()
                .find(|set| set.code.eq_ignore_ascii_case(code))
                .cloned()
                .unwrap_or_else(|| SetMeta::from_code(code))
        })
        .collect()
}

/// セット情報とローカルの登録状況だけで判定する
fn judge_set(catalog: &SetSymbolCatalog, set: &SetMeta) -> SetBuildOutcome {
    let mut outcome = SetBuildOutcome {
        set_code: set.code.to_lowercase(),
        found: catalog.found_rarities(&set.code),
        ..Default::default()
    };

    if set.digital {
        outcome.skipped_digital = true;
        return outcome;
    }

    let inputs = EraInputs {
        set_code: &set.code,
        released_at: set.released_at,
        ..Default::default()
    };
    outcome.expected = expected_rarities(&inputs);
    outcome.era_unknown = !inputs.is_determinable();
    outcome
}

pub struct SymbolCatalogBuilder<'a, C, D> {
    client: &'a C,
    detector: &'a D,
    interpreter: DetectionInterpreter,
    background: Option<DynamicImage>,
    show_progress: bool,
}

impl<'a, C: CardCatalog, D: Detector> SymbolCatalogBuilder<'a, C, D> {
    pub fn new(client: &'a C, detector: &'a D, interpreter: DetectionInterpreter) -> Self {
        Self {
            client,
            detector,
            interpreter,
            background: None,
            show_progress: false,
        }
    }

    /// 参照カードを貼り付ける背景画像
    pub fn with_background(mut self, background: DynamicImage) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// カタログを構築する
    ///
    /// キャンセル・タイムアウトは即座に返す。それ以外の失敗はセット単位で記録して続行。
    pub async fn build(
        &self,
        catalog: &SetSymbolCatalog,
        known_sets: &[SetMeta],
        fetch_missing: bool,
        ctx: &CancelContext,
    ) -> Result<BuildReport> {
        let scan = catalog.scan_local()?;
        tracing::info!(
            registered = scan.registered,
            skipped = scan.skipped.len(),
            dir = %catalog.dir().display(),
            "ローカルのシンボルを登録"
        );

        let progress = if self.show_progress && fetch_missing {
            let pb = ProgressBar::new(known_sets.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut report = BuildReport::default();
        for set in known_sets {
            progress.set_message(set.code.clone());
            let outcome = self.build_set(catalog, set, fetch_missing, ctx).await?;

            if let Err(err) = outcome.check() {
                tracing::warn!("{}", err);
            } else if outcome.era_unknown {
                tracing::warn!(set = %outcome.set_code, "年代を判定できないため不足を判定しません");
            }
            report.sets.push(outcome);
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(report)
    }

    async fn build_set(
        &self,
        catalog: &SetSymbolCatalog,
        set: &SetMeta,
        fetch_missing: bool,
        ctx: &CancelContext,
    ) -> Result<SetBuildOutcome> {
        // まずはセット情報だけで判定
        let mut outcome = judge_set(catalog, set);

        if outcome.skipped_digital || !fetch_missing || outcome.found.covers(&outcome.expected) {
            return Ok(outcome);
        }

        let printings = match ctx.run(self.client.search_by_set_code(&set.code)).await {
            Ok(printings) => printings,
            Err(err) if err.is_aborted() => return Err(err),
            Err(err) => {
                tracing::warn!(set = %set.code, "セットの印刷一覧を取得できません: {}", err);
                outcome.fetch_error = Some(err.to_string());
                return Ok(outcome);
            }
        };

        // 古い順（同日は取得順のまま）
        let printings = stable_earliest_first(printings);

        // 最初期の印刷の枠・枠色で判定し直す
        if let Some(earliest) = printings.first() {
            let inputs = EraInputs {
                set_code: &set.code,
                released_at: set.released_at.or(earliest.released_at),
                frame: Some(&earliest.frame),
                border_color: Some(&earliest.border_color),
            };
            outcome.expected = expected_rarities(&inputs);
            outcome.era_unknown = !inputs.is_determinable();
        }

        for printing in &printings {
            if outcome.found.covers(&outcome.expected) {
                break;
            }

            let Ok(rarity) = printing.rarity.parse::<Rarity>() else {
                continue;
            };
            if !outcome.expected.contains(&rarity) || outcome.found.has(rarity) {
                continue;
            }

            match self.extract_symbol(printing, ctx).await {
                Ok(Some(symbol)) => {
                    let key = mox_common::SetSymbolKey::new(&set.code, rarity);
                    match catalog.store(&key, symbol)? {
                        StoreOutcome::Written(path) => {
                            tracing::info!(%key, path = %path.display(), "シンボルを保存");
                        }
                        StoreOutcome::AlreadyCached(_) => {}
                    }
                    outcome.found.mark(rarity);
                    outcome.fetched.push(rarity);
                }
                Ok(None) => {
                    tracing::debug!(
                        set = %set.code,
                        collector_number = %printing.collector_number,
                        "シンボルが検出されません、次の候補へ"
                    );
                }
                Err(err) if err.is_aborted() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        set = %set.code,
                        collector_number = %printing.collector_number,
                        "シンボル抽出に失敗: {}",
                        err
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// 印刷画像からセットシンボルを抽出（検出されなければ None）
    async fn extract_symbol(&self, printing: &Printing, ctx: &CancelContext) -> Result<Option<DynamicImage>> {
        let Some(url) = printing.image_url.as_deref() else {
            return Ok(None);
        };

        let bytes = ctx.run(self.client.fetch_image(url)).await?;
        let card = image::load_from_memory(&bytes)
            .map_err(|e| MoxError::ImageLoad(format!("{}: {}", url, e)))?;

        let card = match &self.background {
            Some(background) => paste_on_background(&card, background),
            None => card,
        };

        let raw = detect_blocking(self.detector, &encode_png(&card)?)?;
        let mut interpretation = self.interpreter.interpret(&raw, &card)?;
        interpretation.log_outcomes(url);

        Ok(interpretation
            .take(DetectionClass::SetSymbol)
            .map(|crop| crop.image))
    }
}

/// 外部の検出器を呼ぶ間、マルチスレッドランタイムのワーカーを手放す
fn detect_blocking<D: Detector>(detector: &D, image_bytes: &[u8]) -> Result<RawDetections> {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| detector.detect(image_bytes)),
        _ => detector.detect(image_bytes),
    }
}

/// 発売日の古い順（日付なしは最後）に並べる。同順位は元の順序を保つ。
fn stable_earliest_first(mut printings: Vec<Printing>) -> Vec<Printing> {
    printings.sort_by(|a, b| match (a.released_at, b.released_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    printings
}

/// カードを背景画像に余白付きで貼り付ける（角の透明部分に背景が見える）
fn paste_on_background(card: &DynamicImage, background: &DynamicImage) -> DynamicImage {
    let width = card.width() + BACKGROUND_PADDING * 2;
    let height = card.height() + BACKGROUND_PADDING * 2;

    let mut canvas: RgbaImage = if background.width() == 0 || background.height() == 0 {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    } else {
        background
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgba8()
    };

    image::imageops::overlay(
        &mut canvas,
        &card.to_rgba8(),
        BACKGROUND_PADDING as i64,
        BACKGROUND_PADDING as i64,
    );
    DynamicImage::ImageRgba8(canvas)
}
