//! 共通型定義
//!
//! - DetectionClass / Detection / RawDetections: 物体検出モデルの出力
//! - Printing / SetMeta: カード検索クライアントから得られるカタログ情報

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 検出クラス（モデルのラベルは1始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionClass {
    Name = 1,
    SetSymbol = 2,
    CollectorNumber = 3,
    TypeLine = 4,
    /// カード全体（検出されるが現状は未使用）
    FullCard = 5,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 5] = [
        DetectionClass::Name,
        DetectionClass::SetSymbol,
        DetectionClass::CollectorNumber,
        DetectionClass::TypeLine,
        DetectionClass::FullCard,
    ];

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }

    pub fn id(self) -> i64 {
        self as i64
    }

    /// OCR対象のテキスト領域か
    pub fn is_text(self) -> bool {
        matches!(
            self,
            DetectionClass::Name | DetectionClass::CollectorNumber | DetectionClass::TypeLine
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            DetectionClass::Name => "name",
            DetectionClass::SetSymbol => "set-symbol",
            DetectionClass::CollectorNumber => "collector-number",
            DetectionClass::TypeLine => "type-line",
            DetectionClass::FullCard => "card",
        }
    }
}

impl std::fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 検出1件分
///
/// `bbox` は正規化座標 (y1, x1, y2, x2)、各値は 0.0〜1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    pub score: f32,
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn top(&self) -> f32 {
        self.bbox[0]
    }

    pub fn left(&self) -> f32 {
        self.bbox[1]
    }

    pub fn bottom(&self) -> f32 {
        self.bbox[2]
    }

    pub fn right(&self) -> f32 {
        self.bbox[3]
    }

    /// 正規化座標での縦方向の中心
    pub fn vertical_center(&self) -> f32 {
        (self.top() + self.bottom()) / 2.0
    }
}

/// 検出モデルの生出力
///
/// TensorFlow Object Detection API の出力名（detection_boxes 等）もそのまま受け付ける
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDetections {
    #[serde(alias = "detection_boxes")]
    pub boxes: Vec<[f32; 4]>,

    #[serde(alias = "detection_scores")]
    pub scores: Vec<f32>,

    #[serde(alias = "detection_classes")]
    pub classes: Vec<f32>,

    #[serde(default)]
    pub num_detections: Option<f32>,
}

/// 形状チェック済みの1行: (クラスID, スコア, 正規化ボックス)
pub type RawRow = (i64, f32, [f32; 4]);

impl RawDetections {
    /// 配列長を検証して有効な行を返す
    ///
    /// boxes/scores/classes の長さが一致しない場合は形状エラー。
    /// num_detections があればその件数までを有効とする。
    pub fn rows(&self) -> Result<Vec<RawRow>> {
        let len = self.scores.len();
        if self.boxes.len() != len || self.classes.len() != len {
            return Err(Error::Parse(format!(
                "検出結果の配列長が一致しません (boxes={}, scores={}, classes={})",
                self.boxes.len(),
                len,
                self.classes.len()
            )));
        }

        let count = match self.num_detections {
            Some(n) if n.is_finite() && n >= 0.0 => (n as usize).min(len),
            Some(n) => {
                return Err(Error::Parse(format!("num_detections が不正です: {}", n)));
            }
            None => len,
        };

        Ok((0..count)
            .map(|i| (self.classes[i].round() as i64, self.scores[i], self.boxes[i]))
            .collect())
    }
}

/// カード枠の世代
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameEra {
    Frame1993,
    Frame1997,
    Frame2003,
    Frame2015,
    Future,
    #[default]
    Unknown,
    Other(String),
}

impl FrameEra {
    pub fn as_str(&self) -> &str {
        match self {
            FrameEra::Frame1993 => "1993",
            FrameEra::Frame1997 => "1997",
            FrameEra::Frame2003 => "2003",
            FrameEra::Frame2015 => "2015",
            FrameEra::Future => "future",
            FrameEra::Unknown => "",
            FrameEra::Other(s) => s,
        }
    }

    /// 現行ルール（全レアリティのシンボルが区別される）の枠か
    pub fn is_modern(&self) -> bool {
        matches!(self, FrameEra::Frame2003 | FrameEra::Frame2015)
    }
}

impl From<&str> for FrameEra {
    fn from(s: &str) -> Self {
        match s.trim() {
            "1993" => FrameEra::Frame1993,
            "1997" => FrameEra::Frame1997,
            "2003" => FrameEra::Frame2003,
            "2015" => FrameEra::Frame2015,
            "future" => FrameEra::Future,
            "" => FrameEra::Unknown,
            other => FrameEra::Other(other.to_string()),
        }
    }
}

impl From<String> for FrameEra {
    fn from(s: String) -> Self {
        FrameEra::from(s.as_str())
    }
}

impl From<FrameEra> for String {
    fn from(frame: FrameEra) -> Self {
        frame.as_str().to_string()
    }
}

/// カードの1印刷（セット＋コレクター番号＋レアリティ）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Printing {
    pub id: String,

    pub name: String,

    pub set_code: String,

    pub collector_number: String,

    /// カタログ上の表記そのまま（"common", "mythic", "special" 等）
    pub rarity: String,

    #[serde(default)]
    pub frame: FrameEra,

    #[serde(default)]
    pub border_color: String,

    #[serde(default)]
    pub released_at: Option<NaiveDate>,

    #[serde(default)]
    pub image_url: Option<String>,
}

/// セット情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMeta {
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub released_at: Option<NaiveDate>,

    #[serde(default)]
    pub set_type: String,

    /// デジタル専用セット（物理カードなし）
    #[serde(default)]
    pub digital: bool,
}

impl SetMeta {
    /// コードのみのセット情報（オフライン時にキャッシュのファイル名から作る）
    pub fn from_code(code: &str) -> Self {
        Self {
            code: code.to_lowercase(),
            ..Default::default()
        }
    }
}
