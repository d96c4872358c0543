//! キャッシュ機能テスト
//!
//! スキャン結果キャッシュの動作を検証

use mox_common::Printing;
use mox_rust::analyzer::cache::{compute_file_hash, filter_cached_images, CacheFile};
use mox_rust::analyzer::ScanResult;
use mox_rust::matcher::{MatchMethod, MatchReport, MatchResult};
use mox_rust::scanner::ImageInfo;
use tempfile::tempdir;

fn scan_result(file_name: &str, name: &str) -> ScanResult {
    ScanResult {
        file_name: file_name.to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

fn image_info(dir: &std::path::Path, file_name: &str, content: &[u8]) -> ImageInfo {
    let path = dir.join(file_name);
    std::fs::write(&path, content).unwrap();
    ImageInfo {
        path,
        file_name: file_name.to_string(),
        date: None,
    }
}

/// 空のキャッシュファイル
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache = CacheFile::load(dir.path());

    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// 照合結果を含めて保存・読み込みできる
#[test]
fn test_cache_save_and_load_with_match() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = CacheFile::load(dir.path());
    let mut result = scan_result("shock.jpg", "Shock");
    result.collector_number = "156/280".to_string();
    result.match_report = Some(MatchReport {
        result: MatchResult::Matched {
            printing: Printing {
                set_code: "m19".to_string(),
                collector_number: "156".to_string(),
                rarity: "common".to_string(),
                ..Default::default()
            },
            method: MatchMethod::CollectorNumber,
        },
        candidates: Vec::new(),
    });

    cache.insert("abc123".to_string(), "shock.jpg".to_string(), 1024, result);
    cache.save(dir.path()).expect("キャッシュ保存失敗");

    let loaded = CacheFile::load(dir.path());
    assert_eq!(loaded.len(), 1);

    let cached = loaded.get("abc123").expect("キャッシュが見つからない");
    assert_eq!(cached.name, "Shock");
    assert_eq!(cached.collector_number, "156/280");
    assert!(cached.is_matched());
    let printing = cached.match_report.as_ref().and_then(|r| r.result.printing()).unwrap();
    assert_eq!(printing.set_code, "m19");
}

/// 同じハッシュへの書き込みは上書き
#[test]
fn test_cache_overwrite() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = CacheFile::load(dir.path());
    cache.insert("same_hash".to_string(), "a.jpg".to_string(), 1000, scan_result("a.jpg", "Opt"));
    cache.insert("same_hash".to_string(), "a.jpg".to_string(), 1000, scan_result("a.jpg", "Shock"));

    assert_eq!(cache.get("same_hash").unwrap().name, "Shock");
    assert_eq!(cache.len(), 1);
}

/// ハッシュは内容だけで決まる
#[test]
fn test_file_hash_depends_on_content() {
    let dir = tempdir().expect("Failed to create temp dir");
    let a = image_info(dir.path(), "a.jpg", b"same bytes");
    let b = image_info(dir.path(), "b.jpg", b"same bytes");
    let c = image_info(dir.path(), "c.jpg", b"other bytes");

    let hash_a = compute_file_hash(&a.path).unwrap();
    assert_eq!(hash_a.len(), 64);
    assert_eq!(hash_a, compute_file_hash(&b.path).unwrap());
    assert_ne!(hash_a, compute_file_hash(&c.path).unwrap());
}

/// キャッシュ済みと未処理の振り分け
#[test]
fn test_filter_cached_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cached_img = image_info(dir.path(), "img1.jpg", b"fake image 1");
    let new_img = image_info(dir.path(), "img2.jpg", b"fake image 2");

    let mut cache = CacheFile::load(dir.path());
    let hash = compute_file_hash(&cached_img.path).unwrap();
    cache.insert(hash, "img1.jpg".to_string(), 12, scan_result("img1.jpg", "Opt"));

    let (cached, uncached) = filter_cached_images(&[cached_img, new_img], &cache);

    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].name, "Opt");
    assert_eq!(uncached.len(), 1);
    assert_eq!(uncached[0].0.file_name, "img2.jpg");
    assert_eq!(uncached[0].1, compute_file_hash(&uncached[0].0.path).unwrap());
}

/// 読めないファイルはハッシュなしで未処理側へ
#[test]
fn test_filter_missing_file_is_uncached() {
    let dir = tempdir().expect("Failed to create temp dir");
    let missing = ImageInfo {
        path: dir.path().join("gone.jpg"),
        file_name: "gone.jpg".to_string(),
        date: None,
    };

    let (cached, uncached) = filter_cached_images(&[missing], &CacheFile::default());
    assert!(cached.is_empty());
    assert_eq!(uncached[0].1, "");
}

/// キャッシュファイルが破損している場合は空として扱う
#[test]
fn test_cache_corrupted_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(CacheFile::cache_path(dir.path()), "{ invalid json }").unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// バージョン違いは読み捨てる
#[test]
fn test_cache_version_mismatch() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(
        CacheFile::cache_path(dir.path()),
        r#"{"version": 99, "entries": {"h": {"file_name": "a.jpg", "file_size": 1, "result": {"fileName": "a.jpg"}}}}"#,
    )
    .unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// キャッシュの削除
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");

    assert!(!CacheFile::clear(dir.path()).unwrap());

    let mut cache = CacheFile::default();
    cache.insert("h".to_string(), "a.jpg".to_string(), 1, scan_result("a.jpg", "Opt"));
    cache.save(dir.path()).unwrap();
    assert!(CacheFile::cache_path(dir.path()).exists());

    assert!(CacheFile::clear(dir.path()).unwrap());
    assert!(!CacheFile::cache_path(dir.path()).exists());
}
