//! Pedigree master: sire-to-line mapping and per-line aptitude tables.
//!
//! Sires are grouped into seven named lines plus `Other`; each line carries
//! aptitudes in [0, 1] per distance band and per track type.

use crate::types::TrackType;

/// Coarse ancestral grouping of a sire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SireLine {
    SundaySilence,
    Kingmambo,
    NorthernDancer,
    MrProspector,
    Roberto,
    StormCat,
    HailToReason,
    Other,
}

/// Distance band. Boundaries are inclusive on the lower class:
/// 1400 is sprint, 1800 is mile, 2200 is middle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBand {
    Sprint,
    Mile,
    Middle,
    Long,
}

impl DistanceBand {
    pub fn from_distance(distance: u32) -> DistanceBand {
        if distance <= 1400 {
            DistanceBand::Sprint
        } else if distance <= 1800 {
            DistanceBand::Mile
        } else if distance <= 2200 {
            DistanceBand::Middle
        } else {
            DistanceBand::Long
        }
    }
}

/// Aptitude table of one sire line.
#[derive(Debug, Clone, Copy)]
pub struct LineAptitude {
    pub sprint: f64,
    pub mile: f64,
    pub middle: f64,
    pub long: f64,
    pub good: f64,
    pub heavy: f64,
}

impl LineAptitude {
    pub fn distance(&self, band: DistanceBand) -> f64 {
        match band {
            DistanceBand::Sprint => self.sprint,
            DistanceBand::Mile => self.mile,
            DistanceBand::Middle => self.middle,
            DistanceBand::Long => self.long,
        }
    }

    pub fn track(&self, track: TrackType) -> f64 {
        match track {
            TrackType::Good => self.good,
            TrackType::Heavy => self.heavy,
        }
    }
}

/// Classify a sire name into its line. Unknown sires map to `Other`.
pub fn sire_line(name: &str) -> SireLine {
    match name {
        // サンデーサイレンス系
        "サンデーサイレンス" | "ディープインパクト" | "ステイゴールド" | "ハーツクライ"
        | "ダイワメジャー" | "マンハッタンカフェ" | "ゼンノロブロイ" | "アグネスタキオン"
        | "スペシャルウィーク" | "フジキセキ" | "ネオユニヴァース" | "キズナ"
        | "オルフェーヴル" | "ゴールドシップ" | "ドゥラメンテ" | "エピファネイア"
        | "コントレイル" => SireLine::SundaySilence,
        // キングマンボ系
        "キングマンボ" | "キングカメハメハ" | "ロードカナロア" | "ルーラーシップ"
        | "レイデオロ" | "ドゥラモンド" => SireLine::Kingmambo,
        // ノーザンダンサー系
        "ノーザンダンサー" | "サドラーズウェルズ" | "ガリレオ" | "フランケル"
        | "ニジンスキー" | "リファール" => SireLine::NorthernDancer,
        // ミスタープロスペクター系（キングマンボ除く）
        "ミスタープロスペクター" | "フォーティナイナー" | "エンドスウィープ"
        | "アドマイヤムーン" | "ゴールドアリュール" | "スマートファルコン" => {
            SireLine::MrProspector
        }
        // ロベルト系
        "ロベルト" | "ブライアンズタイム" | "タニノギムレット" | "ウオッカ"
        | "シンボリクリスエス" | "エピカリス" | "モーリス" | "スクリーンヒーロー" => {
            SireLine::Roberto
        }
        // ストームキャット系
        "ストームキャット" | "ヘネシー" | "テイルオブザキャット"
        | "ジャイアンツコーズウェイ" | "ヨハネスブルグ" => SireLine::StormCat,
        // ヘイルトゥリーズン系（サンデーサイレンス除く）
        "ヘイルトゥリーズン" | "リアルシャダイ" | "トニービン" | "ジャングルポケット" => {
            SireLine::HailToReason
        }
        _ => SireLine::Other,
    }
}

/// Aptitude table for a line.
pub fn line_aptitude(line: SireLine) -> LineAptitude {
    match line {
        SireLine::SundaySilence => LineAptitude {
            sprint: 0.6,
            mile: 0.9,
            middle: 1.0,
            long: 0.8,
            good: 1.0,
            heavy: 0.7,
        },
        SireLine::Kingmambo => LineAptitude {
            sprint: 0.8,
            mile: 1.0,
            middle: 0.9,
            long: 0.6,
            good: 0.9,
            heavy: 0.9,
        },
        SireLine::NorthernDancer => LineAptitude {
            sprint: 0.5,
            mile: 0.8,
            middle: 1.0,
            long: 0.9,
            good: 0.9,
            heavy: 1.0,
        },
        SireLine::MrProspector => LineAptitude {
            sprint: 1.0,
            mile: 0.9,
            middle: 0.7,
            long: 0.5,
            good: 0.9,
            heavy: 1.0,
        },
        SireLine::Roberto => LineAptitude {
            sprint: 0.6,
            mile: 0.9,
            middle: 1.0,
            long: 0.8,
            good: 0.8,
            heavy: 1.0,
        },
        SireLine::StormCat => LineAptitude {
            sprint: 1.0,
            mile: 0.9,
            middle: 0.6,
            long: 0.4,
            good: 1.0,
            heavy: 0.6,
        },
        SireLine::HailToReason => LineAptitude {
            sprint: 0.5,
            mile: 0.7,
            middle: 0.9,
            long: 1.0,
            good: 0.9,
            heavy: 0.8,
        },
        SireLine::Other => LineAptitude {
            sprint: 0.7,
            mile: 0.8,
            middle: 0.8,
            long: 0.7,
            good: 0.9,
            heavy: 0.9,
        },
    }
}
