//! セット年代判定
//!
//! 古いセットはレアリティごとにシンボルの色が分かれておらず、
//! 神話レアも2008年10月（Shards of Alara）まで存在しない。
//! セットごとに「収集すべきレアリティ」を決め、存在しないシンボルを探し続けないようにする。

use chrono::NaiveDate;

use crate::rarity::Rarity;
use crate::types::FrameEra;

/// 初期の基本セット・限定版など、シンボル自体が1種類しかないセット
const LEGACY_SET_CODES: &[&str] = &["lea", "leb", "2ed", "ced", "cei", "3ed", "sum"];

/// Exodus 発売日（これより前はシンボルの色分けなし）
const RARITY_COLORS_SINCE: (i32, u32, u32) = (1998, 6, 14);

/// Shards of Alara 発売日（これより前は神話レアなし）
const MYTHIC_SINCE: (i32, u32, u32) = (2008, 10, 2);

/// 判定の入力
///
/// `frame` / `border_color` はセット内の最初期の印刷から取る。
/// セット一覧だけで判定する段階では None のままでよい。
#[derive(Debug, Clone, Copy, Default)]
pub struct EraInputs<'a> {
    pub set_code: &'a str,
    pub released_at: Option<NaiveDate>,
    pub frame: Option<&'a FrameEra>,
    pub border_color: Option<&'a str>,
}

impl EraInputs<'_> {
    /// 年代を判定できるだけの情報があるか
    ///
    /// 初期セットのコード・発売日・枠のいずれもなければ、
    /// `classify_era` は Modern に倒すしかない。
    pub fn is_determinable(&self) -> bool {
        LEGACY_SET_CODES.contains(&self.set_code.trim().to_lowercase().as_str())
            || self.released_at.is_some()
            || self.frame.is_some_and(|f| *f != FrameEra::Unknown)
    }
}

/// 年代区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraClass {
    /// 初期セット・白枠の1993年枠: コモンのみ
    Legacy,
    /// 1993年枠 / Exodus以前: シンボルが全レアリティ共通
    Undistinguished,
    /// 1997年枠 / Shards of Alara以前: 神話レアなし
    PreMythic,
    /// 2003年枠・2015年枠（または枠不明）: 4種すべて
    Modern,
    /// 上記以外の枠（future等）: コモンのみ
    Unclassified,
}

impl EraClass {
    pub fn expected_rarities(self) -> Vec<Rarity> {
        match self {
            EraClass::Legacy | EraClass::Undistinguished | EraClass::Unclassified => {
                vec![Rarity::Common]
            }
            EraClass::PreMythic => vec![Rarity::Common, Rarity::Uncommon, Rarity::Rare],
            EraClass::Modern => Rarity::ALL.to_vec(),
        }
    }
}

fn released_before(date: Option<NaiveDate>, (y, m, d): (i32, u32, u32)) -> bool {
    match (date, NaiveDate::from_ymd_opt(y, m, d)) {
        (Some(date), Some(boundary)) => date < boundary,
        _ => false,
    }
}

/// 年代区分を判定する
pub fn classify_era(inputs: &EraInputs) -> EraClass {
    let code = inputs.set_code.trim().to_lowercase();
    let frame = inputs.frame.filter(|f| **f != FrameEra::Unknown);
    let white_border = inputs
        .border_color
        .map(|b| b.eq_ignore_ascii_case("white"))
        .unwrap_or(false);

    if LEGACY_SET_CODES.contains(&code.as_str())
        || (frame == Some(&FrameEra::Frame1993) && white_border)
    {
        return EraClass::Legacy;
    }

    if frame == Some(&FrameEra::Frame1993) || released_before(inputs.released_at, RARITY_COLORS_SINCE) {
        return EraClass::Undistinguished;
    }

    // 1997年枠のExodus以降・Shards以前の2003年枠・future枠はここ
    if frame == Some(&FrameEra::Frame1997) || released_before(inputs.released_at, MYTHIC_SINCE) {
        return EraClass::PreMythic;
    }

    match frame {
        None => EraClass::Modern,
        Some(f) if f.is_modern() => EraClass::Modern,
        Some(_) => EraClass::Unclassified,
    }
}

/// セットで収集すべきレアリティ
pub fn expected_rarities(inputs: &EraInputs) -> Vec<Rarity> {
    classify_era(inputs).expected_rarities()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_legacy_codes_only_common() {
        let inputs = EraInputs {
            set_code: "LEA",
            released_at: date(1993, 8, 5),
            ..Default::default()
        };
        assert_eq!(classify_era(&inputs), EraClass::Legacy);
        assert_eq!(expected_rarities(&inputs), vec![Rarity::Common]);
    }

    #[test]
    fn test_white_bordered_1993_frame_is_legacy() {
        let frame = FrameEra::Frame1993;
        let inputs = EraInputs {
            set_code: "4ed",
            released_at: date(1995, 4, 1),
            frame: Some(&frame),
            border_color: Some("white"),
        };
        assert_eq!(classify_era(&inputs), EraClass::Legacy);
    }

    #[test]
    fn test_1993_frame_before_exodus_never_needs_mythic() {
        let frame = FrameEra::Frame1993;
        let inputs = EraInputs {
            set_code: "mir",
            released_at: date(1996, 10, 8),
            frame: Some(&frame),
            border_color: Some("black"),
        };
        let expected = expected_rarities(&inputs);
        assert!(!expected.contains(&Rarity::Mythic));
        assert_eq!(classify_era(&inputs), EraClass::Undistinguished);
    }

    #[test]
    fn test_release_before_exodus_without_frame() {
        let inputs = EraInputs {
            set_code: "tmp",
            released_at: date(1997, 10, 14),
            ..Default::default()
        };
        assert_eq!(classify_era(&inputs), EraClass::Undistinguished);
    }

    #[test]
    fn test_1997_frame_after_exodus_has_no_mythic() {
        let frame = FrameEra::Frame1997;
        let inputs = EraInputs {
            set_code: "ulg",
            released_at: date(1999, 2, 15),
            frame: Some(&frame),
            border_color: Some("black"),
        };
        assert_eq!(
            expected_rarities(&inputs),
            vec![Rarity::Common, Rarity::Uncommon, Rarity::Rare]
        );
    }

    #[test]
    fn test_2003_frame_before_shards_has_no_mythic() {
        let frame = FrameEra::Frame2003;
        let inputs = EraInputs {
            set_code: "shm",
            released_at: date(2008, 5, 2),
            frame: Some(&frame),
            border_color: Some("black"),
        };
        assert_eq!(classify_era(&inputs), EraClass::PreMythic);
    }

    #[test]
    fn test_modern_frame_after_shards_needs_all_four() {
        let frame = FrameEra::Frame2015;
        let inputs = EraInputs {
            set_code: "m19",
            released_at: date(2018, 7, 13),
            frame: Some(&frame),
            border_color: Some("black"),
        };
        assert_eq!(expected_rarities(&inputs), Rarity::ALL.to_vec());
    }

    #[test]
    fn test_boundary_day_is_not_before() {
        let inputs = EraInputs {
            set_code: "ala",
            released_at: date(2008, 10, 2),
            ..Default::default()
        };
        assert_eq!(classify_era(&inputs), EraClass::Modern);
    }

    #[test]
    fn test_unknown_frame_after_shards_falls_back_to_common() {
        let frame = FrameEra::Future;
        let inputs = EraInputs {
            set_code: "plc",
            released_at: date(2009, 1, 1),
            frame: Some(&frame),
            border_color: None,
        };
        assert_eq!(classify_era(&inputs), EraClass::Unclassified);
        assert_eq!(expected_rarities(&inputs), vec![Rarity::Common]);
    }

    #[test]
    fn test_missing_release_date_is_modern() {
        let inputs = EraInputs {
            set_code: "xyz",
            ..Default::default()
        };
        assert_eq!(classify_era(&inputs), EraClass::Modern);
    }

    #[test]
    fn test_is_determinable() {
        let bare = EraInputs {
            set_code: "mir",
            ..Default::default()
        };
        assert!(!bare.is_determinable());

        let legacy = EraInputs {
            set_code: "LEB",
            ..Default::default()
        };
        assert!(legacy.is_determinable());

        let dated = EraInputs {
            set_code: "mir",
            released_at: date(1996, 10, 8),
            ..Default::default()
        };
        assert!(dated.is_determinable());

        let unknown = FrameEra::Unknown;
        let unknown_frame = EraInputs {
            set_code: "mir",
            frame: Some(&unknown),
            ..Default::default()
        };
        assert!(!unknown_frame.is_determinable());
    }
}
