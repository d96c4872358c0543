//! 検出結果の解釈
//!
//! 1. クラスごとに閾値以上で最高スコアの検出だけを残す
//! 2. 正規化ボックス (y1, x1, y2, x2) を画素座標に変換してクロップ
//! 3. カード名の位置から上下逆さまを判定し、全クロップを180度回転
//!
//! 不正なボックスはそのクラスだけを落とし、画像全体は中断しない。

use crate::error::{MoxError, Result};
use image::DynamicImage;
use mox_common::{Detection, DetectionClass, RawDetections};
use std::collections::BTreeMap;

/// 既定の検出スコア下限
pub const PROBABILITY_FLOOR: f32 = 0.4;

/// 画素座標の矩形（左上基準）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// 検出領域のクロップ
///
/// 生成したステージが所有し、下流へはムーブで渡す
#[derive(Debug, Clone)]
pub struct RegionCrop {
    pub class: DetectionClass,
    pub image: DynamicImage,
    pub rect: PixelRect,
}

/// クラスごとの処理結果
#[derive(Debug)]
pub enum RegionOutcome {
    Cropped(PixelRect),
    /// カード全体: 検出はされるがクロップしない
    Skipped,
    /// `MoxError::InvalidBoundingBox`
    Rejected(MoxError),
}

/// 1画像分の解釈結果
#[derive(Debug, Default)]
pub struct Interpretation {
    pub crops: BTreeMap<DetectionClass, RegionCrop>,
    pub outcomes: Vec<(DetectionClass, RegionOutcome)>,
    pub upside_down: bool,
}

impl Interpretation {
    pub fn get(&self, class: DetectionClass) -> Option<&RegionCrop> {
        self.crops.get(&class)
    }

    pub fn take(&mut self, class: DetectionClass) -> Option<RegionCrop> {
        self.crops.remove(&class)
    }

    /// 落としたクラスをログに残す
    pub fn log_outcomes(&self, source: &str) {
        for (class, outcome) in &self.outcomes {
            match outcome {
                RegionOutcome::Cropped(rect) => {
                    tracing::debug!(source, %class, ?rect, "クロップ");
                }
                RegionOutcome::Skipped => {
                    tracing::trace!(source, %class, "スキップ");
                }
                RegionOutcome::Rejected(err) => {
                    tracing::warn!(source, %class, "領域を破棄: {}", err);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionInterpreter {
    probability_floor: f32,
}

impl Default for DetectionInterpreter {
    fn default() -> Self {
        Self::new(PROBABILITY_FLOOR)
    }
}

impl DetectionInterpreter {
    pub fn new(probability_floor: f32) -> Self {
        Self { probability_floor }
    }

    pub fn probability_floor(&self) -> f32 {
        self.probability_floor
    }

    /// クラスごとに閾値以上・最高スコアの検出を選ぶ
    ///
    /// 同点の場合は先に出現した検出を残す。未知のクラスIDは無視する。
    pub fn select_best(&self, detections: &[Detection]) -> BTreeMap<DetectionClass, Detection> {
        let mut best: BTreeMap<DetectionClass, Detection> = BTreeMap::new();

        for det in detections {
            if det.score.is_nan() || det.score < self.probability_floor {
                continue;
            }
            match best.get(&det.class) {
                Some(current) if current.score >= det.score => {}
                _ => {
                    best.insert(det.class, *det);
                }
            }
        }

        best
    }

    /// 検出モデルの生出力を解釈する
    ///
    /// 配列長の不一致は `MoxError::Detection`（この画像のみ失敗）
    pub fn interpret(&self, raw: &RawDetections, image: &DynamicImage) -> Result<Interpretation> {
        let rows = raw
            .rows()
            .map_err(|e| MoxError::Detection(e.to_string()))?;

        let detections: Vec<Detection> = rows
            .into_iter()
            .filter_map(|(id, score, bbox)| match DetectionClass::from_id(id) {
                Some(class) => Some(Detection { class, score, bbox }),
                None => {
                    tracing::trace!(id, "未知のクラスIDを無視");
                    None
                }
            })
            .collect();

        Ok(self.interpret_detections(&detections, image))
    }

    /// 検出一覧から領域をクロップする
    pub fn interpret_detections(&self, detections: &[Detection], image: &DynamicImage) -> Interpretation {
        let best = self.select_best(detections);

        // 向きはカード名の検出だけで決める（名前のクロップが破棄されても同じ）
        let upside_down = best
            .get(&DetectionClass::Name)
            .map(|name| name.vertical_center() > 0.5)
            .unwrap_or(false);

        let mut result = Interpretation {
            upside_down,
            ..Default::default()
        };

        for (class, det) in best {
            if class == DetectionClass::FullCard {
                result.outcomes.push((class, RegionOutcome::Skipped));
                continue;
            }

            match to_pixel_rect(&det, image.width(), image.height()) {
                Ok(rect) => {
                    let mut cropped = image.crop_imm(rect.left, rect.top, rect.width, rect.height);
                    if upside_down {
                        cropped = cropped.rotate180();
                    }
                    result.outcomes.push((class, RegionOutcome::Cropped(rect)));
                    result.crops.insert(
                        class,
                        RegionCrop {
                            class,
                            image: cropped,
                            rect,
                        },
                    );
                }
                Err(err) => {
                    result.outcomes.push((class, RegionOutcome::Rejected(err)));
                }
            }
        }

        result
    }
}

/// 正規化ボックスを画素矩形に変換
fn to_pixel_rect(det: &Detection, img_width: u32, img_height: u32) -> Result<PixelRect> {
    let w = img_width as f64;
    let h = img_height as f64;

    let top = (det.top() as f64 * h).round();
    let left = (det.left() as f64 * w).round();
    let bottom = (det.bottom() as f64 * h).round();
    let right = (det.right() as f64 * w).round();

    let invalid = |reason: String| MoxError::InvalidBoundingBox {
        class: det.class,
        reason,
    };

    if !(top.is_finite() && left.is_finite() && bottom.is_finite() && right.is_finite()) {
        return Err(invalid(format!("座標が数値ではありません: {:?}", det.bbox)));
    }

    let width = right - left;
    let height = bottom - top;
    if width <= 0.0 || height <= 0.0 {
        return Err(invalid(format!("幅または高さが0以下です ({}x{})", width, height)));
    }

    if left < 0.0 || top < 0.0 || right > w || bottom > h {
        return Err(invalid(format!(
            "画像の範囲外です (left={}, top={}, right={}, bottom={}, 画像={}x{})",
            left, top, right, bottom, img_width, img_height
        )));
    }

    Ok(PixelRect {
        left: left as u32,
        top: top as u32,
        width: width as u32,
        height: height as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// 画素値に座標を埋め込んだテスト画像 (R=x, G=y)
    fn coordinate_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, 0])
        }))
    }

    fn det(class: DetectionClass, score: f32, bbox: [f32; 4]) -> Detection {
        Detection { class, score, bbox }
    }

    #[test]
    fn test_select_best_keeps_highest_per_class() {
        let interpreter = DetectionInterpreter::default();
        let detections = vec![
            det(DetectionClass::Name, 0.5, [0.0, 0.0, 0.1, 0.5]),
            det(DetectionClass::Name, 0.9, [0.0, 0.0, 0.2, 0.5]),
            det(DetectionClass::Name, 0.7, [0.0, 0.0, 0.3, 0.5]),
            det(DetectionClass::SetSymbol, 0.3, [0.5, 0.5, 0.6, 0.6]),
        ];

        let best = interpreter.select_best(&detections);
        assert_eq!(best.len(), 1);
        assert_eq!(best[&DetectionClass::Name].score, 0.9);
        assert!(!best.contains_key(&DetectionClass::SetSymbol));
    }

    #[test]
    fn test_floor_moves_class_membership() {
        let detections = vec![
            det(DetectionClass::Name, 0.45, [0.0, 0.0, 0.1, 0.5]),
            det(DetectionClass::TypeLine, 0.6, [0.5, 0.0, 0.6, 0.5]),
        ];

        // 最小スコア未満の閾値なら全クラス残る
        let low = DetectionInterpreter::new(0.1).select_best(&detections);
        assert_eq!(low.len(), 2);

        // 最大スコアを超える閾値なら全クラス消える
        let high = DetectionInterpreter::new(0.61).select_best(&detections);
        assert!(high.is_empty());
    }

    #[test]
    fn test_score_equal_to_floor_survives() {
        let interpreter = DetectionInterpreter::new(0.4);
        let best = interpreter.select_best(&[det(DetectionClass::Name, 0.4, [0.0, 0.0, 0.1, 0.5])]);
        assert!(best.contains_key(&DetectionClass::Name));
    }

    #[test]
    fn test_crop_uses_y1_x1_y2_x2_order() {
        let image = coordinate_image(100, 200);
        let interpreter = DetectionInterpreter::default();

        let result = interpreter.interpret_detections(
            &[det(DetectionClass::TypeLine, 0.9, [0.25, 0.5, 0.5, 0.75])],
            &image,
        );

        let crop = result.get(DetectionClass::TypeLine).unwrap();
        assert_eq!(
            crop.rect,
            PixelRect { left: 50, top: 50, width: 25, height: 50 }
        );
        assert_eq!(crop.image.width(), 25);
        assert_eq!(crop.image.height(), 50);
        assert_eq!(crop.image.to_rgb8().get_pixel(0, 0), &Rgb([50, 50, 0]));
        assert!(!result.upside_down);
    }

    #[test]
    fn test_full_card_is_never_cropped() {
        let image = coordinate_image(64, 64);
        let result = DetectionInterpreter::default().interpret_detections(
            &[det(DetectionClass::FullCard, 0.99, [0.0, 0.0, 1.0, 1.0])],
            &image,
        );

        assert!(result.crops.is_empty());
        assert!(matches!(
            result.outcomes.as_slice(),
            [(DetectionClass::FullCard, RegionOutcome::Skipped)]
        ));
    }

    #[test]
    fn test_invalid_box_drops_only_that_class() {
        let image = coordinate_image(100, 100);
        let result = DetectionInterpreter::default().interpret_detections(
            &[
                // 幅0
                det(DetectionClass::CollectorNumber, 0.9, [0.5, 0.5, 0.75, 0.5]),
                // 範囲外
                det(DetectionClass::SetSymbol, 0.9, [0.5, 0.5, 1.5, 0.75]),
                det(DetectionClass::TypeLine, 0.9, [0.5, 0.0, 0.75, 0.5]),
            ],
            &image,
        );

        assert_eq!(result.crops.len(), 1);
        assert!(result.get(DetectionClass::TypeLine).is_some());

        let rejected: Vec<_> = result
            .outcomes
            .iter()
            .filter_map(|(class, outcome)| match outcome {
                RegionOutcome::Rejected(MoxError::InvalidBoundingBox { class: c, .. }) => {
                    assert_eq!(c, class);
                    Some(*class)
                }
                _ => None,
            })
            .collect();
        assert_eq!(rejected, vec![DetectionClass::SetSymbol, DetectionClass::CollectorNumber]);
    }

    #[test]
    fn test_name_below_midpoint_rotates_every_crop() {
        let image = coordinate_image(100, 100);
        let interpreter = DetectionInterpreter::default();
        let symbol = det(DetectionClass::SetSymbol, 0.9, [0.25, 0.5, 0.5, 0.75]);

        // 名前の中心 0.625 → 逆さま
        let flipped = interpreter.interpret_detections(
            &[det(DetectionClass::Name, 0.9, [0.5, 0.25, 0.75, 0.75]), symbol],
            &image,
        );
        // 名前の中心 0.125 → そのまま
        let upright = interpreter.interpret_detections(
            &[det(DetectionClass::Name, 0.9, [0.0, 0.25, 0.25, 0.75]), symbol],
            &image,
        );

        assert!(flipped.upside_down);
        assert!(!upright.upside_down);

        let a = flipped.get(DetectionClass::SetSymbol).unwrap().image.to_rgb8();
        let b = upright.get(DetectionClass::SetSymbol).unwrap().image.to_rgb8();
        assert_eq!(a.dimensions(), b.dimensions());
        let (w, h) = b.dimensions();
        for y in 0..h {
            for x in 0..w {
                assert_eq!(a.get_pixel(x, y), b.get_pixel(w - 1 - x, h - 1 - y));
            }
        }

        let name = flipped.get(DetectionClass::Name).unwrap().image.to_rgb8();
        assert_eq!(name.get_pixel(0, 0), &Rgb([74, 74, 0]));
    }

    #[test]
    fn test_no_name_means_no_rotation() {
        let image = coordinate_image(100, 100);
        let result = DetectionInterpreter::default().interpret_detections(
            &[det(DetectionClass::SetSymbol, 0.9, [0.75, 0.5, 1.0, 0.75])],
            &image,
        );
        assert!(!result.upside_down);
        let crop = result.get(DetectionClass::SetSymbol).unwrap().image.to_rgb8();
        assert_eq!(crop.get_pixel(0, 0), &Rgb([50, 75, 0]));
    }

    #[test]
    fn test_interpret_rejects_shape_mismatch() {
        let raw = RawDetections {
            boxes: vec![[0.0, 0.0, 0.5, 0.5]],
            scores: vec![0.9],
            classes: vec![],
            num_detections: None,
        };
        let image = coordinate_image(10, 10);
        let result = DetectionInterpreter::default().interpret(&raw, &image);
        assert!(matches!(result, Err(MoxError::Detection(_))));
    }

    #[test]
    fn test_interpret_ignores_unknown_class_ids() {
        let raw = RawDetections {
            boxes: vec![[0.0, 0.0, 0.5, 0.5], [0.0, 0.0, 0.5, 0.5]],
            scores: vec![0.9, 0.9],
            classes: vec![0.0, 4.0],
            num_detections: Some(2.0),
        };
        let image = coordinate_image(10, 10);
        let result = DetectionInterpreter::default().interpret(&raw, &image).unwrap();
        assert_eq!(result.crops.len(), 1);
        assert!(result.get(DetectionClass::TypeLine).is_some());
    }
}
