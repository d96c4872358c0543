//! Scryfall API クライアント
//!
//! - `/cards/search`: ページング（has_more / next_page）、0件は 404 が返る
//! - `/sets`: セット一覧
//! - 画像URL: カード面が複数ある場合は1面目の画像を使う

use super::CardCatalog;
use crate::config::Config;
use crate::error::{MoxError, Result};
use chrono::NaiveDate;
use mox_common::{FrameEra, Printing, SetMeta};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("mox-rust/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ScryfallClient {
    http_client: reqwest::Client,
    base_url: String,
    request_delay: Duration,
}

/// 一覧レスポンス
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageUris {
    #[serde(default)]
    png: Option<String>,
    #[serde(default)]
    large: Option<String>,
}

impl ImageUris {
    fn best(&self) -> Option<String> {
        self.png.clone().or_else(|| self.large.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CardFace {
    #[serde(default)]
    image_uris: Option<ImageUris>,
}

#[derive(Debug, Deserialize)]
struct ScryfallCard {
    id: String,
    name: String,
    set: String,
    collector_number: String,
    rarity: String,
    #[serde(default)]
    frame: String,
    #[serde(default)]
    border_color: String,
    #[serde(default)]
    released_at: Option<NaiveDate>,
    #[serde(default)]
    image_uris: Option<ImageUris>,
    #[serde(default)]
    card_faces: Vec<CardFace>,
}

impl From<ScryfallCard> for Printing {
    fn from(card: ScryfallCard) -> Self {
        let image_url = card
            .image_uris
            .as_ref()
            .and_then(ImageUris::best)
            .or_else(|| {
                card.card_faces
                    .first()
                    .and_then(|face| face.image_uris.as_ref())
                    .and_then(ImageUris::best)
            });

        Printing {
            id: card.id,
            name: card.name,
            set_code: card.set.to_lowercase(),
            collector_number: card.collector_number,
            rarity: card.rarity,
            frame: FrameEra::from(card.frame),
            border_color: card.border_color,
            released_at: card.released_at,
            image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScryfallSet {
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    released_at: Option<NaiveDate>,
    #[serde(default)]
    set_type: String,
    #[serde(default)]
    digital: bool,
}

impl From<ScryfallSet> for SetMeta {
    fn from(set: ScryfallSet) -> Self {
        SetMeta {
            code: set.code.to_lowercase(),
            name: set.name,
            released_at: set.released_at,
            set_type: set.set_type,
            digital: set.digital,
        }
    }
}

impl ScryfallClient {
    pub fn new(base_url: impl Into<String>, request_delay: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MoxError::Network(format!("HTTPクライアント作成失敗: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_delay,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.scryfall_base_url, config.request_delay())
    }

    /// GET してJSONを返す（404 は None）
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        // APIの利用規約に従いリクエスト間隔を空ける
        tokio::time::sleep(self.request_delay).await;

        tracing::debug!(url, "Scryfall リクエスト");
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| MoxError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoxError::Network(format!("HTTP {}: {}", status, body.trim())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MoxError::Network(e.to_string()))?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// 全ページを取得
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Option<ListResponse<T>> = self.get_json(url, query).await?;

        while let Some(list) = page {
            items.extend(list.data);
            page = match (list.has_more, list.next_page) {
                // next_page はクエリ込みのURL
                (true, Some(next)) => self.get_json(&next, &[]).await?,
                _ => None,
            };
        }

        Ok(items)
    }

    async fn search_cards(&self, query: &str) -> Result<Vec<Printing>> {
        let url = format!("{}/cards/search", self.base_url);
        let cards: Vec<ScryfallCard> = self
            .get_all_pages(
                &url,
                &[
                    ("q", query),
                    ("unique", "prints"),
                    ("include_extras", "true"),
                    ("order", "released"),
                    ("dir", "asc"),
                ],
            )
            .await?;
        Ok(cards.into_iter().map(Printing::from).collect())
    }
}

impl CardCatalog for ScryfallClient {
    async fn search_by_name(&self, name: &str) -> Result<Vec<Printing>> {
        self.search_cards(name.trim()).await
    }

    async fn list_sets(&self) -> Result<Vec<SetMeta>> {
        let url = format!("{}/sets", self.base_url);
        let sets: Vec<ScryfallSet> = self.get_all_pages(&url, &[]).await?;
        Ok(sets.into_iter().map(SetMeta::from).collect())
    }

    async fn search_by_set_code(&self, code: &str) -> Result<Vec<Printing>> {
        self.search_cards(&format!("e:{}", code.trim().to_lowercase()))
            .await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        tokio::time::sleep(self.request_delay).await;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| MoxError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MoxError::Network(format!(
                "画像取得失敗 HTTP {}: {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MoxError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
