//! 物体検出
//!
//! 検出モデルそのものは外部コマンド（`CommandDetector`）として扱い、
//! このモジュールは生出力の解釈（`DetectionInterpreter`）を担当する。

mod command;
mod interpreter;

pub use command::CommandDetector;
pub use interpreter::{
    DetectionInterpreter, Interpretation, PixelRect, RegionCrop, RegionOutcome, PROBABILITY_FLOOR,
};

use crate::error::Result;
use mox_common::RawDetections;

/// 検出モデルの境界
///
/// エンコード済み画像バイト列を受け取り、同じ長さの boxes/scores/classes 配列を返す。
/// 純粋関数として扱う（同じ入力には同じ出力）。
pub trait Detector: Send + Sync {
    fn detect(&self, image_bytes: &[u8]) -> Result<RawDetections>;
}

impl<T: Detector + ?Sized> Detector for &T {
    fn detect(&self, image_bytes: &[u8]) -> Result<RawDetections> {
        (**self).detect(image_bytes)
    }
}

impl<T: Detector + ?Sized> Detector for std::sync::Arc<T> {
    fn detect(&self, image_bytes: &[u8]) -> Result<RawDetections> {
        (**self).detect(image_bytes)
    }
}
