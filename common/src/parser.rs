//! 検出器出力パーサー
//!
//! 外部の検出コマンドの標準出力からJSONを抽出し、
//! RawDetections にパースする

use crate::error::{Error, Result};
use crate::types::RawDetections;

/// 出力からJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use mox_common::extract_json;
///
/// let output = "loading model...\n{\"scores\": []}";
/// let json = extract_json(output).unwrap();
/// assert!(json.starts_with('{'));
/// ```
pub fn extract_json(output: &str) -> Result<&str> {
    // ```json ... ``` ブロックを探す
    if let Some(start_marker) = output.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = output[start..].find("```") {
            let end = start + end_offset;
            return Ok(output[start..end].trim());
        }
    }

    // 生の {...} を探す
    if let Some(start) = output.find('{') {
        if let Some(end) = output.rfind('}') {
            if end >= start {
                return Ok(&output[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// 検出コマンドの出力をパース
///
/// # Returns
/// * `Ok(RawDetections)` - パース成功（配列長の検証は `RawDetections::rows` で行う）
/// * `Err` - JSONが見つからないかパース失敗
pub fn parse_detections(output: &str) -> Result<RawDetections> {
    let json_str = extract_json(output)?;
    let raw: RawDetections = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("検出結果 JSONパースエラー: {}", e)))?;
    Ok(raw)
}
