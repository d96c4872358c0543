//! mox: カード写真から印刷を特定する
//!
//! 処理の流れ:
//! 写真 → 検出 (detection) → クロップ・向き補正 → OCR前処理 (normalizer) → OCR (ocr)
//! → 部分レコード (analyzer) → 照合 (matcher、symbols のシンボルカタログを参照)

pub mod analyzer;
pub mod cancel;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod detection;
pub mod error;
pub mod matcher;
pub mod normalizer;
pub mod ocr;
pub mod scanner;
pub mod symbols;
