//! Mox Common Library
//!
//! 検出器出力・カタログ型・セット年代判定など、画像やネットワークに依存しない共通部分

pub mod types;
pub mod rarity;
pub mod era;
pub mod error;
pub mod parser;

pub use types::{DetectionClass, Detection, RawDetections, FrameEra, Printing, SetMeta};
pub use rarity::{Rarity, RaritySet, SetSymbolKey};
pub use era::{EraClass, EraInputs, classify_era, expected_rarities};
pub use error::{Error, Result};
pub use parser::{extract_json, parse_detections};
