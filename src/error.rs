use mox_common::{DetectionClass, Rarity};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MoxError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("検出コマンドが設定されていません。`mox config --set-detector \"<command>\"` または環境変数 MOX_DETECTOR で設定してください")]
    MissingDetector,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("画像処理エラー: {0}")]
    Image(#[from] image::ImageError),

    #[error("検出エラー: {0}")]
    Detection(String),

    #[error("不正なバウンディングボックス ({class}): {reason}")]
    InvalidBoundingBox { class: DetectionClass, reason: String },

    #[error("OCRエラー: {0}")]
    Ocr(String),

    #[error("セットシンボルが揃っていません: {set_code} (不足: {})", format_rarities(.missing))]
    CatalogIncomplete { set_code: String, missing: Vec<Rarity> },

    #[error("通信エラー: {0}")]
    Network(String),

    #[error("処理がキャンセルされました")]
    Canceled,

    #[error("タイムアウトしました ({0}秒)")]
    TimedOut(u64),

    #[error("外部コマンド実行エラー: {0}")]
    Command(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] mox_common::Error),
}

impl MoxError {
    /// キャンセルまたはタイムアウトによる中断か（「見つからない」と区別する）
    pub fn is_aborted(&self) -> bool {
        matches!(self, MoxError::Canceled | MoxError::TimedOut(_))
    }
}

fn format_rarities(rarities: &[Rarity]) -> String {
    rarities
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, MoxError>;
