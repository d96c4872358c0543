//! カード検索クライアントの境界
//!
//! 検索エンジン自体は実装しない。`ScryfallClient` は公開APIを使うアダプタ。
//! 呼び出し側は `CancelContext::run` で包んで中断・タイムアウトを扱う。

mod scryfall;

pub use scryfall::ScryfallClient;

use crate::error::Result;
use mox_common::{Printing, SetMeta};

#[allow(async_fn_in_trait)]
pub trait CardCatalog {
    /// 名前で全印刷を検索（トークン・特殊版も含む、重複除去なし）
    async fn search_by_name(&self, name: &str) -> Result<Vec<Printing>>;

    async fn list_sets(&self) -> Result<Vec<SetMeta>>;

    /// セットの全印刷（発売日の古い順）
    async fn search_by_set_code(&self, code: &str) -> Result<Vec<Printing>>;

    /// 印刷画像をダウンロード
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

impl<T: CardCatalog> CardCatalog for &T {
    async fn search_by_name(&self, name: &str) -> Result<Vec<Printing>> {
        (**self).search_by_name(name).await
    }

    async fn list_sets(&self) -> Result<Vec<SetMeta>> {
        (**self).list_sets().await
    }

    async fn search_by_set_code(&self, code: &str) -> Result<Vec<Printing>> {
        (**self).search_by_set_code(code).await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch_image(url).await
    }
}
