//! スキャン結果キャッシュモジュール
//!
//! 写真ファイルの SHA-256 をキーにしてスキャン結果を保存し、
//! 同じ写真の再スキャンをスキップする。

use super::types::ScanResult;
use crate::error::Result;
use crate::scanner::ImageInfo;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = ".mox-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイルハッシュ → スキャン結果
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub result: ScanResult,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（なければ・壊れていれば空）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                tracing::info!("キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(err) => {
                tracing::warn!(path = %cache_path.display(), "キャッシュを読めません: {}", err);
                Self::default()
            }
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    pub fn get(&self, hash: &str) -> Option<&ScanResult> {
        self.entries.get(hash).map(|e| &e.result)
    }

    pub fn insert(&mut self, hash: String, file_name: String, file_size: u64, result: ScanResult) {
        self.entries.insert(
            hash,
            CacheEntry {
                file_name,
                file_size,
                result,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 写真ファイルの SHA-256（16進）
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// キャッシュ済みの結果と未処理の写真に分ける
///
/// 未処理側はハッシュを添えて返す（ハッシュ計算に失敗した写真は空文字）
pub fn filter_cached_images(
    images: &[ImageInfo],
    cache: &CacheFile,
) -> (Vec<ScanResult>, Vec<(ImageInfo, String)>) {
    let mut cached_results = Vec::new();
    let mut uncached_images = Vec::new();

    for img in images {
        let hash = match compute_file_hash(&img.path) {
            Ok(h) => h,
            Err(err) => {
                tracing::warn!(file = %img.file_name, "ハッシュを計算できません: {}", err);
                uncached_images.push((img.clone(), String::new()));
                continue;
            }
        };

        match cache.get(&hash) {
            Some(result) => cached_results.push(result.clone()),
            None => uncached_images.push((img.clone(), hash)),
        }
    }

    (cached_results, uncached_images)
}
