//! カード照合モジュール
//!
//! 1. 名前で全印刷を検索
//! 2. コレクター番号が一致する候補があれば即採用
//! 3. なければセットシンボルの画像距離が最小の候補を採用
//!
//! 距離は小さいほど似ている。同距離なら先に評価した候補が残る。

mod types;

pub use types::{CandidateOutcome, CandidateVerdict, MatchMethod, MatchReport, MatchResult, NoMatchReason};

use crate::analyzer::PartialCardRecord;
use crate::cancel::CancelContext;
use crate::catalog::CardCatalog;
use crate::descriptor::SymbolDescriptor;
use crate::error::Result;
use crate::normalizer::normalize_collector_number;
use crate::symbols::SetSymbolCatalog;
use mox_common::{Printing, SetSymbolKey};
use std::collections::HashMap;

pub struct CardMatcher<'a, C, S> {
    client: &'a C,
    symbols: &'a SetSymbolCatalog,
    descriptor: S,
}

impl<'a, C: CardCatalog, S: SymbolDescriptor> CardMatcher<'a, C, S> {
    pub fn new(client: &'a C, symbols: &'a SetSymbolCatalog, descriptor: S) -> Self {
        Self {
            client,
            symbols,
            descriptor,
        }
    }

    /// 読み取り結果に最も近い印刷を探す
    ///
    /// 検索の通信エラー・キャンセルはそのまま返す。候補単位の失敗は `MatchReport` に記録する。
    pub async fn find_closest(&self, record: &PartialCardRecord, ctx: &CancelContext) -> Result<MatchReport> {
        let name = record.name.trim();
        if name.is_empty() {
            return Ok(MatchReport::no_match(NoMatchReason::EmptyName));
        }

        let candidates = ctx.run(self.client.search_by_name(name)).await?;
        tracing::debug!(name, count = candidates.len(), "候補を取得");

        if candidates.is_empty() {
            return Ok(MatchReport::no_match(NoMatchReason::NoCandidates));
        }

        if let Some(printing) = find_by_collector_number(&candidates, &record.collector_number) {
            return Ok(MatchReport {
                result: MatchResult::Matched {
                    printing: printing.clone(),
                    method: MatchMethod::CollectorNumber,
                },
                candidates: Vec::new(),
            });
        }

        Ok(self.closest_by_symbol(record, &candidates))
    }

    fn closest_by_symbol(&self, record: &PartialCardRecord, candidates: &[Printing]) -> MatchReport {
        let record_descriptor = record
            .set_symbol
            .as_ref()
            .map(|crop| self.descriptor.describe(crop));

        let mut outcomes = Vec::with_capacity(candidates.len());
        // 同じ (セット, レアリティ) の候補は距離を使い回す
        let mut distances: HashMap<SetSymbolKey, CandidateVerdict> = HashMap::new();
        let mut best: Option<(usize, f64)> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            let verdict = match (&record_descriptor, SetSymbolKey::parse(&candidate.set_code, &candidate.rarity)) {
                (None, _) => CandidateVerdict::NotCompared,
                (Some(_), None) => CandidateVerdict::UnknownRarity,
                (Some(descriptor), Some(key)) => distances
                    .entry(key)
                    .or_insert_with_key(|key| self.compare(descriptor, key))
                    .clone(),
            };

            if let CandidateVerdict::Compared { distance } = verdict {
                if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                    best = Some((index, distance));
                }
            }

            outcomes.push(CandidateOutcome {
                set_code: candidate.set_code.clone(),
                collector_number: candidate.collector_number.clone(),
                rarity: candidate.rarity.clone(),
                verdict,
            });
        }

        let result = match best {
            Some((index, distance)) => MatchResult::Matched {
                printing: candidates[index].clone(),
                method: MatchMethod::SymbolDistance { distance },
            },
            None => {
                tracing::debug!("比較できる候補がないため最初の候補を採用");
                MatchResult::Matched {
                    printing: candidates[0].clone(),
                    method: MatchMethod::FirstCandidate,
                }
            }
        };

        MatchReport {
            result,
            candidates: outcomes,
        }
    }

    fn compare(&self, record_descriptor: &S::Descriptor, key: &SetSymbolKey) -> CandidateVerdict {
        let Some(entry) = self.symbols.get(key) else {
            return CandidateVerdict::NoReference;
        };

        match entry.resolve() {
            Ok(reference) => {
                let reference_descriptor = self.descriptor.describe(&reference);
                CandidateVerdict::Compared {
                    distance: self.descriptor.distance(record_descriptor, &reference_descriptor),
                }
            }
            Err(err) => {
                tracing::warn!(%key, "参照シンボルを読み込めません: {}", err);
                CandidateVerdict::ResolveFailed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// 正規化したコレクター番号が一致する最初の候補
pub fn find_by_collector_number<'p>(candidates: &'p [Printing], collector_number: &str) -> Option<&'p Printing> {
    let wanted = normalize_collector_number(collector_number);
    if wanted.is_empty() {
        return None;
    }

    candidates
        .iter()
        .find(|candidate| normalize_collector_number(&candidate.collector_number) == wanted)
}
