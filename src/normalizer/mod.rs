//! テキスト正規化モジュール
//!
//! OCRの前後処理を行う。
//!
//! ## 処理内容
//! 1. クロップ画像の拡大（OCR用の最小サイズ）
//! 2. OCR出力の空行・末尾空白の除去
//! 3. コレクター番号の正規化（"007/280" → "7"）

mod collector_number;

pub use collector_number::{collector_numbers_match, normalize_collector_number};

use image::imageops::FilterType;
use image::DynamicImage;

/// OCRに渡す最小幅 (px)
pub const MIN_OCR_WIDTH: u32 = 1500;

/// OCRに渡す最小高さ (px)
pub const MIN_OCR_HEIGHT: u32 = 400;

/// OCR用にクロップを拡大する
///
/// 幅が足りなければ幅 1500px に、その後高さが足りなければ高さ 400px に、
/// それぞれ縦横比を保って拡大する。縮小はしない。
pub fn prepare_for_ocr(crop: &DynamicImage) -> DynamicImage {
    let (width, height) = (crop.width(), crop.height());
    if width == 0 || height == 0 {
        return crop.clone();
    }

    let mut prepared = None;

    if width < MIN_OCR_WIDTH {
        let new_height = scale(height, MIN_OCR_WIDTH, width);
        prepared = Some(crop.resize_exact(MIN_OCR_WIDTH, new_height, FilterType::Lanczos3));
    }

    let current = prepared.as_ref().unwrap_or(crop);
    if current.height() < MIN_OCR_HEIGHT {
        let new_width = scale(current.width(), MIN_OCR_HEIGHT, current.height());
        prepared = Some(current.resize_exact(new_width, MIN_OCR_HEIGHT, FilterType::Lanczos3));
    }

    prepared.unwrap_or_else(|| crop.clone())
}

/// value * numerator / denominator（四捨五入、元の値を下回らない）
fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (value as f64 * numerator as f64 / denominator as f64).round() as u32;
    scaled.max(value)
}

/// OCR出力を整形する
///
/// 空白だけの行と末尾の空白を取り除く。行内の記号・大文字小文字はそのまま。
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
