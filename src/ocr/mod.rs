//! OCRエンジンの境界
//!
//! クロップ1枚分のエンコード済み画像を受け取り、生テキストを返す。
//! 精度の改善はこのクレートの範囲外で、ノイズは `normalizer::clean_text` で落とす。

mod tesseract;

pub use tesseract::TesseractOcr;

use crate::error::Result;

pub trait OcrEngine: Send + Sync {
    fn recognize(&self, png_bytes: &[u8]) -> Result<String>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn recognize(&self, png_bytes: &[u8]) -> Result<String> {
        (**self).recognize(png_bytes)
    }
}
