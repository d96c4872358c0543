//! カード読み取りモジュール
//!
//! 写真1枚につき 読み込み → 検出 → 解釈 → OCR を順に行い、部分レコードを作る。
//! 1枚の中では直列、写真どうしは rayon で並列に処理する。

pub mod cache;
mod types;

pub use types::{PartialCardRecord, ScanResult};

use crate::detection::{DetectionInterpreter, Detector, RegionCrop};
use crate::error::{MoxError, Result};
use crate::normalizer::{clean_text, prepare_for_ocr};
use crate::ocr::OcrEngine;
use crate::scanner::{encode_png, load_card_image, ImageInfo};
use image::DynamicImage;
use mox_common::DetectionClass;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

pub struct CardReader<D, O> {
    detector: D,
    ocr: O,
    interpreter: DetectionInterpreter,
    dump_dir: Option<PathBuf>,
}

impl<D: Detector, O: OcrEngine> CardReader<D, O> {
    pub fn new(detector: D, ocr: O, interpreter: DetectionInterpreter) -> Self {
        Self {
            detector,
            ocr,
            interpreter,
            dump_dir: None,
        }
    }

    /// OCRに渡すクロップを保存する（デバッグ用）
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// 写真1枚を読み取る
    ///
    /// 画像の読み込み失敗と検出器の失敗はエラー。
    /// 領域単位・OCR単位の失敗はそのフィールドを空にして続ける。
    pub fn read_card(&self, info: &ImageInfo) -> Result<PartialCardRecord> {
        let image = load_card_image(&info.path)?;
        let encoded = encode_png(&image)?;
        let raw = self.detector.detect(&encoded)?;

        let mut interpretation = self.interpreter.interpret(&raw, &image)?;
        interpretation.log_outcomes(&info.file_name);

        let name = self.read_text(info, interpretation.take(DetectionClass::Name));
        let type_line = self.read_text(info, interpretation.take(DetectionClass::TypeLine));
        let collector_number = self.read_text(info, interpretation.take(DetectionClass::CollectorNumber));

        let set_symbol = interpretation.take(DetectionClass::SetSymbol).map(|crop| {
            self.dump(info, crop.class, &crop.image);
            crop.image
        });

        tracing::debug!(
            file = %info.file_name,
            name = %name,
            collector_number = %collector_number,
            upside_down = interpretation.upside_down,
            "読み取り完了"
        );

        Ok(PartialCardRecord {
            name,
            type_line,
            collector_number,
            set_symbol,
            upside_down: interpretation.upside_down,
        })
    }

    /// 複数の写真を並列に読み取る（入力順を保つ）
    pub fn read_cards(&self, images: &[ImageInfo]) -> Vec<Result<PartialCardRecord>> {
        images.par_iter().map(|info| self.read_card(info)).collect()
    }

    fn read_text(&self, info: &ImageInfo, crop: Option<RegionCrop>) -> String {
        let Some(crop) = crop else {
            return String::new();
        };

        let prepared = prepare_for_ocr(&crop.image);
        self.dump(info, crop.class, &prepared);

        match encode_png(&prepared).and_then(|png| self.ocr.recognize(&png)) {
            Ok(raw) => clean_text(&raw),
            Err(err) => {
                tracing::warn!(file = %info.file_name, class = %crop.class, "OCR失敗、空欄にします: {}", err);
                String::new()
            }
        }
    }

    fn dump(&self, info: &ImageInfo, class: DetectionClass, image: &DynamicImage) {
        let Some(dir) = &self.dump_dir else {
            return;
        };

        let path = dump_path(dir, &info.path, class);
        let saved = std::fs::create_dir_all(dir)
            .map_err(MoxError::from)
            .and_then(|_| image.save(&path).map_err(MoxError::from));
        if let Err(err) = saved {
            tracing::warn!(path = %path.display(), "クロップを保存できません: {}", err);
        }
    }
}

/// `{元ファイル名の拡張子なし}-{クラス}.png`
fn dump_path(dir: &Path, source: &Path, class: DetectionClass) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "card".to_string());
    dir.join(format!("{}-{}.png", stem, class.label()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use mox_common::RawDetections;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector(RawDetections);

    impl Detector for FixedDetector {
        fn detect(&self, _image_bytes: &[u8]) -> Result<RawDetections> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _image_bytes: &[u8]) -> Result<RawDetections> {
            Err(MoxError::Detection("model crashed".into()))
        }
    }

    /// 呼ばれた順に用意した応答を返す
    struct ScriptedOcr {
        calls: AtomicUsize,
        replies: Vec<Result<String>>,
    }

    impl ScriptedOcr {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                replies,
            }
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, png_bytes: &[u8]) -> Result<String> {
            let decoded = image::load_from_memory(png_bytes).unwrap();
            assert!(decoded.width() >= 1500);
            assert!(decoded.height() >= 400);

            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.replies[index] {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(MoxError::Ocr("tesseract failed".into())),
            }
        }
    }

    fn write_card(dir: &Path) -> ImageInfo {
        let path = dir.join("card.png");
        RgbImage::from_pixel(100, 140, Rgb([200, 200, 200])).save(&path).unwrap();
        ImageInfo {
            path,
            file_name: "card.png".into(),
            date: None,
        }
    }

    fn detections() -> RawDetections {
        // Name, TypeLine, CollectorNumber, SetSymbol
        RawDetections {
            boxes: vec![
                [0.05, 0.1, 0.12, 0.8],
                [0.55, 0.1, 0.6, 0.7],
                [0.9, 0.05, 0.95, 0.3],
                [0.55, 0.8, 0.6, 0.9],
            ],
            scores: vec![0.9, 0.8, 0.7, 0.95],
            classes: vec![1.0, 4.0, 3.0, 2.0],
            num_detections: None,
        }
    }

    #[test]
    fn test_read_card_fills_fields() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_card(dir.path());

        let ocr = ScriptedOcr::new(vec![
            Ok("Llanowar Elves\n\n".into()),
            Ok("Creature - Elf Druid  \n".into()),
            Ok("\n314/280\n".into()),
        ]);
        let reader = CardReader::new(FixedDetector(detections()), &ocr, DetectionInterpreter::default());

        let record = reader.read_card(&info).unwrap();
        assert_eq!(record.name, "Llanowar Elves");
        assert_eq!(record.type_line, "Creature - Elf Druid");
        assert_eq!(record.collector_number, "314/280");
        assert!(record.set_symbol.is_some());
        assert!(!record.upside_down);
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_ocr_failure_leaves_field_empty() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_card(dir.path());

        let ocr = ScriptedOcr::new(vec![
            Ok("Shock".into()),
            Err(MoxError::Ocr(String::new())),
            Ok("7".into()),
        ]);
        let reader = CardReader::new(FixedDetector(detections()), &ocr, DetectionInterpreter::default());

        let record = reader.read_card(&info).unwrap();
        assert_eq!(record.name, "Shock");
        assert_eq!(record.type_line, "");
        assert_eq!(record.collector_number, "7");
    }

    #[test]
    fn test_detector_failure_is_fatal_for_image() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_card(dir.path());
        let ocr = ScriptedOcr::new(vec![]);
        let reader = CardReader::new(FailingDetector, &ocr, DetectionInterpreter::default());

        assert!(matches!(reader.read_card(&info), Err(MoxError::Detection(_))));
    }

    #[test]
    fn test_missing_regions_produce_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_card(dir.path());
        let ocr = ScriptedOcr::new(vec![]);
        let reader = CardReader::new(
            FixedDetector(RawDetections::default()),
            &ocr,
            DetectionInterpreter::default(),
        );

        let record = reader.read_card(&info).unwrap();
        assert!(record.name.is_empty());
        assert!(record.set_symbol.is_none());
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dump_dir_receives_crops() {
        let dir = tempfile::tempdir().unwrap();
        let info = write_card(dir.path());
        let dump = dir.path().join("crops");

        let ocr = ScriptedOcr::new(vec![Ok("a".into()), Ok("b".into()), Ok("c".into())]);
        let reader = CardReader::new(FixedDetector(detections()), &ocr, DetectionInterpreter::default())
            .with_dump_dir(&dump);
        reader.read_card(&info).unwrap();

        assert!(dump.join("card-name.png").exists());
        assert!(dump.join("card-set-symbol.png").exists());
        assert!(dump.join("card-collector-number.png").exists());
    }

    #[test]
    fn test_read_cards_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_card(dir.path());
        let missing = ImageInfo {
            path: dir.path().join("missing.png"),
            file_name: "missing.png".into(),
            date: None,
        };

        let ocr = ScriptedOcr::new(vec![]);
        let reader = CardReader::new(
            FixedDetector(RawDetections::default()),
            &ocr,
            DetectionInterpreter::default(),
        );

        let results = reader.read_cards(&[missing, good]);
        assert!(matches!(results[0], Err(MoxError::FileNotFound(_))));
        assert!(results[1].is_ok());
    }
}
