//! エンジンオプション表
//!
//! USIの`option`応答行を生成する宣言部分と、`setoption`で実際に値を
//! 書き換える適用部分を1つの型にまとめる。spin系は範囲外の値が来ても
//! エラーにせず最寄りの境界値へクランプする(GUI側の丸め誤差を許容する)。

use std::fmt;

use anyhow::{anyhow, Result};
use shogi_core::types::MAX_PLY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinRange {
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

impl SpinRange {
    const fn new(min: i64, max: i64, default: i64) -> SpinRange {
        SpinRange { min, max, default }
    }

    fn clamp(self, v: i64) -> i64 {
        v.clamp(self.min, self.max)
    }
}

/// USIが宣言する1オプションの型。`option name ...`行の整形にのみ使う。
#[derive(Debug, Clone)]
pub enum EngineOptionKind {
    Check { default: bool },
    Spin { range: SpinRange },
    Button,
}

pub struct OptionDecl {
    pub name: &'static str,
    pub kind: EngineOptionKind,
}

impl fmt::Display for OptionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EngineOptionKind::Check { default } => {
                write!(f, "option name {} type check default {}", self.name, default)
            }
            EngineOptionKind::Spin { range } => write!(
                f,
                "option name {} type spin default {} min {} max {}",
                self.name, range.default, range.min, range.max
            ),
            EngineOptionKind::Button => write!(f, "option name {} type button", self.name),
        }
    }
}

const USI_HASH: SpinRange = SpinRange::new(1, 16384, 256);
const THREADS: SpinRange = SpinRange::new(1, 64, 1);
const MULTI_PV: SpinRange = SpinRange::new(1, 593, 1);
const DRAW_SCORE: SpinRange = SpinRange::new(-200, 200, 0);
const BYOYOMI_MARGIN: SpinRange = SpinRange::new(0, 10_000, 100);
const FISCHER_MARGIN: SpinRange = SpinRange::new(0, 60_000, 12_000);
const SUDDEN_DEATH_MARGIN: SpinRange = SpinRange::new(0, 600, 60);
const MIN_THINKING_TIME: SpinRange = SpinRange::new(10, 60_000, 1000);
const BOOK_MAX_PLY: SpinRange = SpinRange::new(0, 50, 50);
const MIN_BOOK_SCORE_FOR_BLACK: SpinRange = SpinRange::new(-2000, 2000, 0);
const MIN_BOOK_SCORE_FOR_WHITE: SpinRange = SpinRange::new(-2000, 2000, -180);
const LIMIT_DEPTH: SpinRange = SpinRange::new(1, (MAX_PLY as i64) - 1, (MAX_PLY as i64) - 1);

/// 実際にエンジンの挙動を左右する、型付きのオプション値
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub usi_hash_mb: i64,
    pub usi_ponder: bool,
    pub threads: i64,
    pub multi_pv: i64,
    pub draw_score: i64,
    pub byoyomi_margin_ms: i64,
    pub fischer_margin_ms: i64,
    pub sudden_death_margin_ms: i64,
    pub min_thinking_time_ms: i64,
    pub own_book: bool,
    pub book_max_ply: i64,
    pub min_book_score_for_black: i64,
    pub min_book_score_for_white: i64,
    pub narrow_book: bool,
    pub tiny_book: bool,
    pub limit_depth: i64,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            usi_hash_mb: USI_HASH.default,
            usi_ponder: true,
            threads: THREADS.default,
            multi_pv: MULTI_PV.default,
            draw_score: DRAW_SCORE.default,
            byoyomi_margin_ms: BYOYOMI_MARGIN.default,
            fischer_margin_ms: FISCHER_MARGIN.default,
            sudden_death_margin_ms: SUDDEN_DEATH_MARGIN.default,
            min_thinking_time_ms: MIN_THINKING_TIME.default,
            own_book: true,
            book_max_ply: BOOK_MAX_PLY.default,
            min_book_score_for_black: MIN_BOOK_SCORE_FOR_BLACK.default,
            min_book_score_for_white: MIN_BOOK_SCORE_FOR_WHITE.default,
            narrow_book: false,
            tiny_book: false,
            limit_depth: LIMIT_DEPTH.default,
        }
    }
}

impl EngineOptions {
    /// `usi`コマンドに応答する`option`宣言行を、登録順に返す
    pub fn declarations() -> Vec<OptionDecl> {
        vec![
            OptionDecl { name: "USI_Hash", kind: EngineOptionKind::Spin { range: USI_HASH } },
            OptionDecl { name: "USI_Ponder", kind: EngineOptionKind::Check { default: true } },
            OptionDecl { name: "Threads", kind: EngineOptionKind::Spin { range: THREADS } },
            OptionDecl { name: "MultiPV", kind: EngineOptionKind::Spin { range: MULTI_PV } },
            OptionDecl { name: "DrawScore", kind: EngineOptionKind::Spin { range: DRAW_SCORE } },
            OptionDecl { name: "ByoyomiMargin", kind: EngineOptionKind::Spin { range: BYOYOMI_MARGIN } },
            OptionDecl { name: "FischerMargin", kind: EngineOptionKind::Spin { range: FISCHER_MARGIN } },
            OptionDecl {
                name: "SuddenDeathMargin",
                kind: EngineOptionKind::Spin { range: SUDDEN_DEATH_MARGIN },
            },
            OptionDecl { name: "MinThinkingTime", kind: EngineOptionKind::Spin { range: MIN_THINKING_TIME } },
            OptionDecl { name: "OwnBook", kind: EngineOptionKind::Check { default: true } },
            OptionDecl { name: "BookMaxPly", kind: EngineOptionKind::Spin { range: BOOK_MAX_PLY } },
            OptionDecl {
                name: "MinBookScoreForBlack",
                kind: EngineOptionKind::Spin { range: MIN_BOOK_SCORE_FOR_BLACK },
            },
            OptionDecl {
                name: "MinBookScoreForWhite",
                kind: EngineOptionKind::Spin { range: MIN_BOOK_SCORE_FOR_WHITE },
            },
            OptionDecl { name: "NarrowBook", kind: EngineOptionKind::Check { default: false } },
            OptionDecl { name: "TinyBook", kind: EngineOptionKind::Check { default: false } },
            OptionDecl { name: "LimitDepth", kind: EngineOptionKind::Spin { range: LIMIT_DEPTH } },
        ]
    }

    /// `setoption name <N> value <V>`を適用する。範囲外のspin値はクランプし、
    /// 名前が未知なら`info string`相当の扱いとしてエラーを返す(呼び出し側が警告する)。
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let spin = |v: Option<&str>, field: &str| -> Result<i64> {
            v.ok_or_else(|| anyhow!("option {field} requires a value"))?
                .parse::<i64>()
                .map_err(|_| anyhow!("invalid integer for option {field}: {:?}", v))
        };
        let check = |v: Option<&str>, field: &str| -> Result<bool> {
            match v {
                Some("true") => Ok(true),
                Some("false") => Ok(false),
                other => Err(anyhow!("invalid boolean for option {field}: {:?}", other)),
            }
        };

        match name {
            "USI_Hash" => self.usi_hash_mb = USI_HASH.clamp(spin(value, name)?),
            "USI_Ponder" => self.usi_ponder = check(value, name)?,
            "Threads" => self.threads = THREADS.clamp(spin(value, name)?),
            "MultiPV" => self.multi_pv = MULTI_PV.clamp(spin(value, name)?),
            "DrawScore" => self.draw_score = DRAW_SCORE.clamp(spin(value, name)?),
            "ByoyomiMargin" => self.byoyomi_margin_ms = BYOYOMI_MARGIN.clamp(spin(value, name)?),
            "FischerMargin" => self.fischer_margin_ms = FISCHER_MARGIN.clamp(spin(value, name)?),
            "SuddenDeathMargin" => self.sudden_death_margin_ms = SUDDEN_DEATH_MARGIN.clamp(spin(value, name)?),
            "MinThinkingTime" => self.min_thinking_time_ms = MIN_THINKING_TIME.clamp(spin(value, name)?),
            "OwnBook" => self.own_book = check(value, name)?,
            "BookMaxPly" => self.book_max_ply = BOOK_MAX_PLY.clamp(spin(value, name)?),
            "MinBookScoreForBlack" => {
                self.min_book_score_for_black = MIN_BOOK_SCORE_FOR_BLACK.clamp(spin(value, name)?)
            }
            "MinBookScoreForWhite" => {
                self.min_book_score_for_white = MIN_BOOK_SCORE_FOR_WHITE.clamp(spin(value, name)?)
            }
            "NarrowBook" => self.narrow_book = check(value, name)?,
            "TinyBook" => self.tiny_book = check(value, name)?,
            "LimitDepth" => self.limit_depth = LIMIT_DEPTH.clamp(spin(value, name)?),
            other => return Err(anyhow!("unknown option: {other}")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_declared_option_table() {
        let opts = EngineOptions::default();
        assert_eq!(opts.usi_hash_mb, 256);
        assert!(opts.usi_ponder);
        assert_eq!(opts.threads, 1);
        assert_eq!(opts.multi_pv, 1);
        assert_eq!(opts.min_book_score_for_white, -180);
    }

    #[test]
    fn spin_values_are_clamped_not_rejected() {
        let mut opts = EngineOptions::default();
        opts.apply("USI_Hash", Some("999999")).unwrap();
        assert_eq!(opts.usi_hash_mb, 16384);
        opts.apply("USI_Hash", Some("0")).unwrap();
        assert_eq!(opts.usi_hash_mb, 1);
    }

    #[test]
    fn unknown_option_name_is_an_error() {
        let mut opts = EngineOptions::default();
        assert!(opts.apply("NotAnOption", Some("1")).is_err());
    }

    #[test]
    fn check_option_rejects_non_boolean_values() {
        let mut opts = EngineOptions::default();
        assert!(opts.apply("OwnBook", Some("maybe")).is_err());
    }

    #[test]
    fn declaration_lines_are_formatted_per_usi_grammar() {
        let decls = EngineOptions::declarations();
        let hash = decls.iter().find(|d| d.name == "USI_Hash").unwrap();
        assert_eq!(hash.to_string(), "option name USI_Hash type spin default 256 min 1 max 16384");
        let ponder = decls.iter().find(|d| d.name == "USI_Ponder").unwrap();
        assert_eq!(ponder.to_string(), "option name USI_Ponder type check default true");
    }
}
