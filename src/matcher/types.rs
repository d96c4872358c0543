use mox_common::Printing;
use serde::{Deserialize, Serialize};

/// 照合方法
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchMethod {
    /// コレクター番号の完全一致
    CollectorNumber,
    /// セットシンボルの画像距離が最小
    SymbolDistance { distance: f64 },
    /// 比較できる候補がなく、最初の候補を採用
    FirstCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoMatchReason {
    /// カード名が空（検索しない）
    EmptyName,
    /// 検索結果が0件
    NoCandidates,
}

/// 照合結果（該当なしはエラーではなく結果の1つ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MatchResult {
    #[serde(rename_all = "camelCase")]
    Matched { printing: Printing, method: MatchMethod },
    #[serde(rename_all = "camelCase")]
    NoMatch { reason: NoMatchReason },
}

impl MatchResult {
    pub fn printing(&self) -> Option<&Printing> {
        match self {
            MatchResult::Matched { printing, .. } => Some(printing),
            MatchResult::NoMatch { .. } => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// 候補ごとの比較結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "camelCase")]
pub enum CandidateVerdict {
    Compared { distance: f64 },
    /// カタログに参照シンボルがない
    NoReference,
    /// "special" 等、シンボルのないレアリティ
    UnknownRarity,
    /// 参照シンボルの読み込みに失敗
    ResolveFailed { reason: String },
    /// 読み取り側にシンボルのクロップがない
    NotCompared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateOutcome {
    pub set_code: String,
    pub collector_number: String,
    pub rarity: String,
    #[serde(flatten)]
    pub verdict: CandidateVerdict,
}

/// 照合の詳細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub result: MatchResult,
    /// 画像比較を行った場合のみ候補ごとの結果が入る
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateOutcome>,
}

impl MatchReport {
    pub fn no_match(reason: NoMatchReason) -> Self {
        Self {
            result: MatchResult::NoMatch { reason },
            candidates: Vec::new(),
        }
    }
}
