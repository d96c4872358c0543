//! コレクター番号の正規化
//!
//! カード下部の "007/280" 形式から番号部分だけを取り出し、先頭の0を除く。
//! OCR側・カタログ側の両方に同じ正規化をかけてから比較する。

use regex::Regex;

/// コレクター番号を正規化
///
/// - 前後の空白を除去
/// - "/" より前だけを使う
/// - 先頭の0を除去（"000" のように0だけなら "0"）
pub fn normalize_collector_number(raw: &str) -> String {
    lazy_static::lazy_static! {
        static ref LEADING_ZEROS_RE: Regex = Regex::new(r"^0+").unwrap();
    }

    let number = raw.trim().split('/').next().unwrap_or("").trim();
    if number.is_empty() {
        return String::new();
    }

    let stripped = LEADING_ZEROS_RE.replace(number, "");
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.into_owned()
    }
}

/// 正規化後のコレクター番号が一致するか（空同士は一致としない）
pub fn collector_numbers_match(a: &str, b: &str) -> bool {
    let a = normalize_collector_number(a);
    !a.is_empty() && a == normalize_collector_number(b)
}
