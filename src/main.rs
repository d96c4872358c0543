use clap::Parser;
use mox_common::SetMeta;
use mox_rust::analyzer::cache::{filter_cached_images, CacheFile};
use mox_rust::analyzer::{CardReader, ScanResult};
use mox_rust::cancel::{CancelContext, CancelToken};
use mox_rust::catalog::{CardCatalog, ScryfallClient};
use mox_rust::cli::{Cli, Commands};
use mox_rust::config::Config;
use mox_rust::descriptor::PerceptualHashDescriptor;
use mox_rust::detection::{CommandDetector, DetectionInterpreter};
use mox_rust::error::{MoxError, Result};
use mox_rust::matcher::{CardMatcher, MatchMethod, MatchResult, NoMatchReason};
use mox_rust::ocr::TesseractOcr;
use mox_rust::scanner::{self, ImageInfo};
use mox_rust::symbols::{cached_sets, local_report, BuildReport, SetSymbolCatalog, SymbolCatalogBuilder};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;

    let token = CancelToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n中断しています...");
                token.cancel();
            }
        });
    }
    let ctx = CancelContext::new(token, config.timeout());

    match cli.command {
        Commands::Scan { input, output, fetch_symbols, offline, use_cache, dump_crops } => {
            let options = ScanOptions {
                input,
                output,
                fetch_symbols,
                offline,
                use_cache,
                dump_crops,
            };
            run_scan(&config, options, &ctx).await?;
        }

        Commands::Symbols { fetch, sets, background } => {
            println!("🔣 mox - セットシンボル\n");

            let client = ScryfallClient::from_config(&config)?;
            let catalog = SetSymbolCatalog::new(&config.set_symbol_dir);

            println!("セット一覧を取得中...");
            let report = if fetch {
                let known_sets = filter_sets(ctx.run(client.list_sets()).await?, &sets);
                println!("✔ 対象セット: {}件\n", known_sets.len());

                let detector = CommandDetector::new(config.detector_command()?)?;
                let background = background.or_else(|| config.background_path.clone());
                build_symbols(&config, &client, &detector, &catalog, &known_sets, background.as_deref(), &ctx).await?
            } else {
                catalog.scan_local()?;
                let listed = match ctx.run(client.list_sets()).await {
                    Ok(listed) => listed,
                    Err(err) if err.is_aborted() => return Err(err),
                    Err(err) => {
                        tracing::warn!("セット一覧を取得できません、発売日なしで判定します: {}", err);
                        println!("  ⚠ セット一覧を取得できません（年代不明のセットは判定しません）");
                        Vec::new()
                    }
                };
                let known_sets = filter_sets(cached_sets(&catalog, &listed), &sets);
                println!("✔ 対象セット: {}件\n", known_sets.len());

                local_report(&catalog, &known_sets)?
            };
            print_build_report(&report, &catalog);
        }

        Commands::Config { set_detector, set_symbols_dir, show } => {
            let mut config = config;

            if let Some(command) = set_detector {
                config.set_detector(&command)?;
                println!("✔ 検出コマンドを設定しました");
            }

            if let Some(dir) = set_symbols_dir {
                config.set_symbol_dir(dir)?;
                println!("✔ シンボル保存先を設定しました");
            }

            if show {
                println!("設定:");
                println!("  設定ファイル: {}", Config::config_path()?.display());
                match config.detector_command() {
                    Ok(command) => println!("  検出コマンド: {}", command.join(" ")),
                    Err(_) => println!("  検出コマンド: 未設定"),
                }
                println!("  Tesseract: {} (-l {} --psm {})", config.tesseract_path, config.ocr_language, config.ocr_psm);
                println!("  シンボル保存先: {}", config.set_symbol_dir.display());
                if let Some(background) = &config.background_path {
                    println!("  背景画像: {}", background.display());
                }
                println!("  検出スコア下限: {}", config.probability_floor);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  カタログ: {}", config.scryfall_base_url);
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = CacheFile::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = CacheFile::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match CacheFile::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "mox=debug,mox_rust=debug" } else { "mox_rust=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct ScanOptions {
    input: PathBuf,
    output: Option<PathBuf>,
    fetch_symbols: bool,
    offline: bool,
    use_cache: bool,
    dump_crops: Option<PathBuf>,
}

async fn run_scan(config: &Config, options: ScanOptions, ctx: &CancelContext) -> Result<()> {
    println!("🃏 mox - カード読み取り\n");

    // 1. 写真スキャン
    println!("[1/4] 写真をスキャン中...");
    let images = scanner::scan_input(&options.input)?;
    println!("✔ {}枚の写真を検出\n", images.len());

    if images.is_empty() {
        return Err(MoxError::NoImagesFound(options.input.display().to_string()));
    }

    let cache_folder = cache_folder(&options.input);
    let mut cache = CacheFile::load(&cache_folder);
    let (mut results, pending) = if options.use_cache {
        let (cached, uncached) = filter_cached_images(&images, &cache);
        if !cached.is_empty() {
            println!("  キャッシュ済み: {}枚", cached.len());
        }
        (cached, uncached)
    } else {
        (Vec::new(), images.into_iter().map(|img| (img, String::new())).collect())
    };

    // 2. 読み取り（写真ごとに並列）
    println!("[2/4] カードを読み取り中...");
    let detector = CommandDetector::new(config.detector_command()?)?;
    let ocr = TesseractOcr::from_config(config);
    let interpreter = DetectionInterpreter::new(config.probability_floor);
    let mut reader = CardReader::new(&detector, &ocr, interpreter);
    if let Some(dir) = &options.dump_crops {
        reader = reader.with_dump_dir(dir);
    }

    let infos: Vec<ImageInfo> = pending.iter().map(|(info, _)| info.clone()).collect();
    let records = tokio::task::block_in_place(|| reader.read_cards(&infos));
    println!("✔ {}枚を読み取り\n", records.len());

    // 3. 照合
    let client = ScryfallClient::from_config(config)?;
    let symbols = SetSymbolCatalog::new(&config.set_symbol_dir);
    if options.offline {
        println!("[3/4] 照合をスキップ (--offline)\n");
    } else {
        println!("[3/4] カタログと照合中...");
        if options.fetch_symbols {
            let known_sets = ctx.run(client.list_sets()).await?;
            let background = config.background_path.as_deref();
            let report = build_symbols(config, &client, &detector, &symbols, &known_sets, background, ctx).await?;
            print_build_report(&report, &symbols);
        } else {
            let scan = symbols.scan_local()?;
            println!("  ローカルのシンボル: {}件", scan.registered);
        }
    }

    let matcher = CardMatcher::new(&client, &symbols, PerceptualHashDescriptor::default());
    let mut fresh = Vec::with_capacity(records.len());
    for ((info, hash), record) in pending.iter().zip(records) {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(file = %info.file_name, "読み取り失敗: {}", err);
                fresh.push((hash, ScanResult::failed(info, &err)));
                continue;
            }
        };

        let mut result = ScanResult::from_record(info, &record);
        if !options.offline {
            match matcher.find_closest(&record, ctx).await {
                Ok(report) => result.match_report = Some(report),
                Err(err) if err.is_aborted() => return Err(err),
                Err(err) => {
                    tracing::warn!(file = %info.file_name, "照合失敗: {}", err);
                    result.error = Some(err.to_string());
                }
            }
        }
        fresh.push((hash, result));
    }
    println!("✔ 照合完了\n");

    // 4. 結果保存
    println!("[4/4] 結果を出力中...");
    if options.use_cache && !options.offline {
        for (hash, result) in &fresh {
            if hash.is_empty() || result.error.is_some() {
                continue;
            }
            let file_size = pending
                .iter()
                .find(|(_, h)| h == *hash)
                .and_then(|(info, _)| std::fs::metadata(&info.path).ok())
                .map(|meta| meta.len())
                .unwrap_or(0);
            cache.insert(hash.to_string(), result.file_name.clone(), file_size, result.clone());
        }
        if let Err(err) = cache.save(&cache_folder) {
            tracing::warn!("キャッシュを保存できません: {}", err);
        }
    }

    results.extend(fresh.into_iter().map(|(_, result)| result));
    results.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    for result in &results {
        println!("  {}", summarize(result));
    }

    if let Some(output) = &options.output {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(output, json)?;
        println!("\n✔ 結果を保存: {}", output.display());
    }

    let matched = results.iter().filter(|r| r.is_matched()).count();
    println!("\n✅ 完了: {}/{}枚を特定", matched, results.len());
    Ok(())
}

/// キャッシュファイルを置くフォルダ（ファイル指定時はその親）
fn cache_folder(input: &Path) -> PathBuf {
    if input.is_dir() {
        input.to_path_buf()
    } else {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn filter_sets(sets: Vec<SetMeta>, wanted: &[String]) -> Vec<SetMeta> {
    if wanted.is_empty() {
        return sets;
    }
    let wanted: Vec<String> = wanted.iter().map(|code| code.to_lowercase()).collect();
    sets.into_iter()
        .filter(|set| wanted.contains(&set.code.to_lowercase()))
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn build_symbols<C: CardCatalog>(
    config: &Config,
    client: &C,
    detector: &CommandDetector,
    catalog: &SetSymbolCatalog,
    known_sets: &[SetMeta],
    background: Option<&Path>,
    ctx: &CancelContext,
) -> Result<BuildReport> {
    let mut builder = SymbolCatalogBuilder::new(client, detector, DetectionInterpreter::new(config.probability_floor))
        .with_progress(true);

    if let Some(path) = background {
        let image = image::open(path).map_err(|e| MoxError::ImageLoad(format!("{}: {}", path.display(), e)))?;
        builder = builder.with_background(image);
    }

    builder.build(catalog, known_sets, true, ctx).await
}

fn print_build_report(report: &BuildReport, catalog: &SetSymbolCatalog) {
    println!(
        "✔ シンボル: {}件登録 (今回取得 {}件), 完全なセット {}/{}",
        catalog.len(),
        report.fetched_count(),
        report.complete_count(),
        report.sets.len()
    );

    let incomplete: Vec<_> = report.incomplete().collect();
    if !incomplete.is_empty() {
        println!("  ⚠ 不足のあるセット: {}件", incomplete.len());
        for set in incomplete.iter().take(20) {
            let missing: Vec<_> = set.missing().iter().map(|r| r.as_str()).collect();
            match &set.fetch_error {
                Some(err) => println!("    {} ({}) 取得エラー: {}", set.set_code, missing.join(", "), err),
                None => println!("    {} ({})", set.set_code, missing.join(", ")),
            }
        }
        if incomplete.len() > 20 {
            println!("    ...ほか{}件", incomplete.len() - 20);
        }
    }

    let unknown: Vec<_> = report.era_unknown().map(|s| s.set_code.as_str()).collect();
    if !unknown.is_empty() {
        println!("  年代不明のセット: {}件 ({})", unknown.len(), unknown.join(", "));
    }
    println!();
}

fn summarize(result: &ScanResult) -> String {
    if let Some(err) = &result.error {
        return format!("✗ {}: {}", result.file_name, err);
    }

    let name = if result.name.is_empty() { "(名前なし)" } else { result.name.as_str() };
    match result.match_report.as_ref().map(|report| &report.result) {
        None => format!("- {}: {} #{}", result.file_name, name, result.collector_number),
        Some(MatchResult::Matched { printing, method }) => {
            let how = match method {
                MatchMethod::CollectorNumber => "番号一致".to_string(),
                MatchMethod::SymbolDistance { distance } => format!("シンボル距離 {}", distance),
                MatchMethod::FirstCandidate => "候補先頭".to_string(),
            };
            format!(
                "✔ {}: {} → {} #{} [{}] ({})",
                result.file_name, printing.name, printing.set_code, printing.collector_number, printing.rarity, how
            )
        }
        Some(MatchResult::NoMatch { reason }) => {
            let why = match reason {
                NoMatchReason::EmptyName => "名前を読み取れません",
                NoMatchReason::NoCandidates => "候補なし",
            };
            format!("✗ {}: {} ({})", result.file_name, name, why)
        }
    }
}
