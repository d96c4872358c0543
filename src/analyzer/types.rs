use crate::matcher::MatchReport;
use crate::scanner::ImageInfo;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// 1枚の写真から読み取った部分レコード
///
/// 照合が始まった後は変更しない
#[derive(Debug, Clone, Default)]
pub struct PartialCardRecord {
    pub name: String,
    pub type_line: String,
    /// OCRの生テキスト（"7/280" の形のまま）
    pub collector_number: String,
    pub set_symbol: Option<DynamicImage>,
    pub upside_down: bool,
}

/// 1枚分のスキャン結果（JSON出力・キャッシュ用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub file_name: String,

    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub type_line: String,

    #[serde(default)]
    pub collector_number: String,

    #[serde(default)]
    pub upside_down: bool,

    #[serde(default)]
    pub has_set_symbol: bool,

    /// オフライン時は照合しない
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_report: Option<MatchReport>,

    /// 画像単位で失敗した場合のエラー
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn from_record(info: &ImageInfo, record: &PartialCardRecord) -> Self {
        Self {
            file_name: info.file_name.clone(),
            date: info.date.clone(),
            name: record.name.clone(),
            type_line: record.type_line.clone(),
            collector_number: record.collector_number.clone(),
            upside_down: record.upside_down,
            has_set_symbol: record.set_symbol.is_some(),
            ..Default::default()
        }
    }

    pub fn failed(info: &ImageInfo, error: impl ToString) -> Self {
        Self {
            file_name: info.file_name.clone(),
            date: info.date.clone(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn is_matched(&self) -> bool {
        self.match_report
            .as_ref()
            .map(|report| report.result.is_match())
            .unwrap_or(false)
    }
}
