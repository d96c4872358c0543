//! セットシンボルカタログ
//!
//! (セットコード, レアリティ) をキーに参照シンボル画像を保持する。
//! ローカルキャッシュのファイルは遅延読み込み、取得したシンボルはメモリ上に保持する。
//!
//! キャッシュフォルダのファイル名は `{set}-{rarity}.{png|jpg|jpeg}`。
//! ファイルがないことは「未取得」であってエラーではない。

mod builder;
mod entry;

pub use builder::{cached_sets, local_report, BuildReport, SetBuildOutcome, SymbolCatalogBuilder};
pub use entry::CatalogEntry;

use crate::error::{MoxError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use mox_common::{Rarity, RaritySet, SetSymbolKey};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use walkdir::WalkDir;

const SYMBOL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// 保存するシンボル画像のJPEG品質
const JPEG_QUALITY: u8 = 95;

/// ローカルキャッシュの走査結果
#[derive(Debug, Clone, Default)]
pub struct LocalScan {
    pub registered: usize,
    /// 命名規則に合わないファイル名
    pub skipped: Vec<String>,
    /// 読み取れなかったエントリ（エラー内容）
    pub unreadable: Vec<String>,
}

/// シンボル保存の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Written(PathBuf),
    /// 同じキーのファイルが既にある（重複書き込みは無害）
    AlreadyCached(PathBuf),
}

#[derive(Debug)]
pub struct SetSymbolCatalog {
    dir: PathBuf,
    entries: RwLock<HashMap<SetSymbolKey, Arc<CatalogEntry>>>,
}

impl SetSymbolCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// エントリを登録する
    ///
    /// 同じキーが既にあれば既存のエントリを残す（解決済みの画像は変わらない）
    pub fn insert(&self, entry: CatalogEntry) -> Arc<CatalogEntry> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            entries
                .entry(entry.key().clone())
                .or_insert_with(|| Arc::new(entry)),
        )
    }

    pub fn get(&self, key: &SetSymbolKey) -> Option<Arc<CatalogEntry>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn contains(&self, key: &SetSymbolKey) -> bool {
        self.get(key).is_some()
    }

    /// キーの参照画像を取得（未登録なら None）
    pub fn resolve(&self, key: &SetSymbolKey) -> Result<Option<Arc<DynamicImage>>> {
        match self.get(key) {
            Some(entry) => entry.resolve().map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 登録済みキー（ソート済み）
    pub fn keys(&self) -> Vec<SetSymbolKey> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<_> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// セットの登録済みレアリティ
    pub fn found_rarities(&self, set_code: &str) -> RaritySet {
        let mut found = RaritySet::default();
        for rarity in Rarity::ALL {
            if self.contains(&SetSymbolKey::new(set_code, rarity)) {
                found.mark(rarity);
            }
        }
        found
    }

    /// 登録済みのセットコード（重複なし・ソート済み）
    pub fn set_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.keys().iter().map(|k| k.set_code().to_string()).collect();
        codes.dedup();
        codes
    }

    /// キャッシュフォルダのファイルを遅延エントリとして登録
    pub fn scan_local(&self) -> Result<LocalScan> {
        let mut scan = LocalScan::default();
        if !self.dir.exists() {
            return Ok(scan);
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(&self.dir).max_depth(1) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(dir = %self.dir.display(), "シンボルフォルダのエントリを読めません: {}", err);
                    scan.unreadable.push(err.to_string());
                }
            }
        }
        files.sort();

        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            match parse_symbol_file_name(&file_name) {
                Some(key) => {
                    if !self.contains(&key) {
                        self.insert(CatalogEntry::deferred(key, path));
                        scan.registered += 1;
                    }
                }
                None => {
                    tracing::debug!(file_name = %file_name, "シンボルのファイル名ではないためスキップ");
                    scan.skipped.push(file_name);
                }
            }
        }

        Ok(scan)
    }

    /// キーに対応する保存先パス
    pub fn symbol_path(&self, key: &SetSymbolKey) -> PathBuf {
        self.dir.join(format!("{}.jpg", key))
    }

    /// 抽出したシンボルをキャッシュフォルダに保存し、メモリ上にも登録する
    ///
    /// 既存ファイルは上書きしない
    pub fn store(&self, key: &SetSymbolKey, image: DynamicImage) -> Result<StoreOutcome> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.symbol_path(key);
        let image = DynamicImage::ImageRgb8(flatten_alpha(image).to_rgb8());

        let outcome = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                let mut writer = BufWriter::new(file);
                image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))?;
                writer.flush()?;
                StoreOutcome::Written(path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(%key, "シンボルは保存済み");
                StoreOutcome::AlreadyCached(path)
            }
            Err(e) => return Err(e.into()),
        };

        self.insert(CatalogEntry::resolved(key.clone(), image));
        Ok(outcome)
    }
}

/// `{set}-{rarity}.{ext}` 形式のファイル名を解析
pub fn parse_symbol_file_name(file_name: &str) -> Option<SetSymbolKey> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !SYMBOL_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
        return None;
    }

    let (set_code, rarity) = stem.rsplit_once('-')?;
    if set_code.is_empty() || !set_code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let rarity: Rarity = rarity.parse().ok()?;
    Some(SetSymbolKey::new(set_code, rarity))
}

/// シンボル画像を読み込む（透明部分は白にする）
pub fn load_symbol_image(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path)
        .map_err(|e| MoxError::ImageLoad(format!("{}: {}", path.display(), e)))?;
    Ok(flatten_alpha(image))
}

/// 透明度を白背景に合成して不透明なRGBにする
pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image;
    }

    let rgba = image.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    });
    DynamicImage::ImageRgb8(flattened)
}
