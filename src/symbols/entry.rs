use super::load_symbol_image;
use crate::error::Result;
use image::DynamicImage;
use mox_common::SetSymbolKey;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
enum EntryState {
    /// キャッシュファイルのみ（未読み込み）
    Unresolved(PathBuf),
    Resolved(Arc<DynamicImage>),
}

/// セットシンボルの参照画像
///
/// ファイルは初回アクセス時に1度だけ読み込む。
/// 読み込みはエントリごとのロック内で行うため、同時に呼ばれても
/// 未解決か解決済みのどちらかの状態しか見えない。
#[derive(Debug)]
pub struct CatalogEntry {
    key: SetSymbolKey,
    state: Mutex<EntryState>,
}

impl CatalogEntry {
    pub fn deferred(key: SetSymbolKey, path: PathBuf) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState::Unresolved(path)),
        }
    }

    pub fn resolved(key: SetSymbolKey, image: DynamicImage) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState::Resolved(Arc::new(image))),
        }
    }

    pub fn key(&self) -> &SetSymbolKey {
        &self.key
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.lock(), EntryState::Resolved(_))
    }

    /// 参照画像を取得（未読み込みならファイルから読む）
    pub fn resolve(&self) -> Result<Arc<DynamicImage>> {
        self.resolve_with(load_symbol_image)
    }

    /// 読み込み関数を指定して解決する
    ///
    /// 失敗した場合は未解決のまま残り、次の呼び出しで再試行される
    pub fn resolve_with<F>(&self, loader: F) -> Result<Arc<DynamicImage>>
    where
        F: FnOnce(&Path) -> Result<DynamicImage>,
    {
        let mut state = self.lock();

        let path = match &*state {
            EntryState::Resolved(image) => return Ok(Arc::clone(image)),
            EntryState::Unresolved(path) => path.clone(),
        };

        let image = Arc::new(loader(&path)?);
        tracing::debug!(key = %self.key, path = %path.display(), "シンボル画像を読み込み");
        *state = EntryState::Resolved(Arc::clone(&image));
        Ok(image)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EntryState> {
        // 読み込み中にパニックしても状態は書き換え前なので、そのまま使える
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
