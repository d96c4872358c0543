//! レアリティとセットシンボルのキー

use serde::{Deserialize, Serialize};

/// セットシンボルの色分けに対応するレアリティ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Uncommon, Rarity::Rare, Rarity::Mythic];

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Mythic => "mythic",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "common" => Ok(Rarity::Common),
            "uncommon" => Ok(Rarity::Uncommon),
            "rare" => Ok(Rarity::Rare),
            "mythic" | "mythic rare" => Ok(Rarity::Mythic),
            _ => Err(format!("Unknown rarity: {}", s)),
        }
    }
}

/// カタログのキー (セットコード, レアリティ)
///
/// セットコードは常に小文字で保持する
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SetSymbolKey {
    set_code: String,
    rarity: Rarity,
}

impl SetSymbolKey {
    pub fn new(set_code: &str, rarity: Rarity) -> Self {
        Self {
            set_code: set_code.trim().to_lowercase(),
            rarity,
        }
    }

    /// カタログ表記のレアリティ文字列から作る（"special" 等は None）
    pub fn parse(set_code: &str, rarity: &str) -> Option<Self> {
        rarity.parse().ok().map(|r| Self::new(set_code, r))
    }

    pub fn set_code(&self) -> &str {
        &self.set_code
    }

    pub fn rarity(&self) -> Rarity {
        self.rarity
    }
}

impl std::fmt::Display for SetSymbolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.set_code, self.rarity)
    }
}

/// セットごとのシンボル収集状況
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaritySet {
    pub found_common: bool,
    pub found_uncommon: bool,
    pub found_rare: bool,
    pub found_mythic: bool,
}

impl RaritySet {
    pub fn of(rarities: &[Rarity]) -> Self {
        let mut set = Self::default();
        for &r in rarities {
            set.mark(r);
        }
        set
    }

    pub fn mark(&mut self, rarity: Rarity) {
        match rarity {
            Rarity::Common => self.found_common = true,
            Rarity::Uncommon => self.found_uncommon = true,
            Rarity::Rare => self.found_rare = true,
            Rarity::Mythic => self.found_mythic = true,
        }
    }

    pub fn has(&self, rarity: Rarity) -> bool {
        match rarity {
            Rarity::Common => self.found_common,
            Rarity::Uncommon => self.found_uncommon,
            Rarity::Rare => self.found_rare,
            Rarity::Mythic => self.found_mythic,
        }
    }

    pub fn is_full(&self) -> bool {
        Rarity::ALL.iter().all(|&r| self.has(r))
    }

    /// `expected` のうちまだ見つかっていないもの
    pub fn missing(&self, expected: &[Rarity]) -> Vec<Rarity> {
        expected.iter().copied().filter(|&r| !self.has(r)).collect()
    }

    /// 期待されるレアリティがすべて揃っているか
    pub fn covers(&self, expected: &[Rarity]) -> bool {
        self.missing(expected).is_empty()
    }

    pub fn found(&self) -> Vec<Rarity> {
        Rarity::ALL.iter().copied().filter(|&r| self.has(r)).collect()
    }
}
