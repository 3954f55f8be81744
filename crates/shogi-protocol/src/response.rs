//! エンジン→GUIの出力メッセージの整形
//!
//! ここでの型は純粋なデータと`Display`実装のみを持つ。実際にstdoutへ
//! 書き出すループ(非同期ライター/チャンネル)は`shogi-engine`側の責務。

use std::fmt;

use shogi_core::Value;

use crate::moves::{format_move, parse_move};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    Exact,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    MateIn(i32),
    MatedIn(i32),
}

impl Score {
    pub fn from_value(value: Value) -> Score {
        if value.is_win() {
            Score::MateIn(value.mate_ply())
        } else if value.is_loss() {
            Score::MatedIn(value.mate_ply())
        } else {
            Score::Cp(value.to_cp())
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "cp {cp}"),
            Score::MateIn(ply) => write!(f, "mate {ply}"),
            Score::MatedIn(ply) => write!(f, "mate -{ply}"),
        }
    }
}

/// `go`の反復深化1回ぶんに対応する`info`行
#[derive(Debug, Clone, Default)]
pub struct SearchInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub bound: Option<ScoreBound>,
    pub multipv: Option<u32>,
    pub currmove: Option<shogi_core::Move>,
    pub nps: Option<u64>,
    pub hashfull: Option<u32>,
    pub pv: Vec<shogi_core::Move>,
    pub string: Option<String>,
}

impl fmt::Display for SearchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(d) = self.depth {
            parts.push(format!("depth {d}"));
        }
        if let Some(sd) = self.seldepth {
            parts.push(format!("seldepth {sd}"));
        }
        if let Some(t) = self.time_ms {
            parts.push(format!("time {t}"));
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {n}"));
        }
        if let Some(score) = self.score {
            let mut s = format!("score {score}");
            if let Some(bound) = self.bound {
                match bound {
                    ScoreBound::Exact => {}
                    ScoreBound::Lower => s.push_str(" lowerbound"),
                    ScoreBound::Upper => s.push_str(" upperbound"),
                }
            }
            parts.push(s);
        }
        if let Some(mpv) = self.multipv {
            parts.push(format!("multipv {mpv}"));
        }
        if let Some(mv) = self.currmove {
            parts.push(format!("currmove {}", format_move(mv)));
        }
        if let Some(nps) = self.nps {
            parts.push(format!("nps {nps}"));
        }
        if let Some(hf) = self.hashfull {
            parts.push(format!("hashfull {hf}"));
        }
        if !self.pv.is_empty() {
            let pv: Vec<String> = self.pv.iter().map(|&mv| format_move(mv)).collect();
            parts.push(format!("pv {}", pv.join(" ")));
        }
        if let Some(s) = &self.string {
            parts.push(format!("string {s}"));
        }
        if parts.is_empty() {
            return Ok(());
        }
        write!(f, "info {}", parts.join(" "))
    }
}

/// 子プロセス(クラスタ/コンサルテーションのワーカー)から届いた`info`行を
/// 読む。整形側(`Display`)とは独立した経路なので往復一致は保証しない
/// (`string`の自由形式テキストなど)。未知のトークンは黙って読み飛ばす。
pub fn parse_info_line(line: &str) -> Option<SearchInfo> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first().copied() != Some("info") {
        return None;
    }
    let mut info = SearchInfo::default();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                info.depth = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "seldepth" => {
                info.seldepth = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "time" => {
                info.time_ms = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "nodes" => {
                info.nodes = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "nps" => {
                info.nps = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "hashfull" => {
                info.hashfull = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "multipv" => {
                info.multipv = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "currmove" => {
                info.currmove = tokens.get(i + 1).and_then(|v| parse_move(v).ok());
                i += 2;
            }
            "score" => {
                let bound = match tokens.get(i + 2).copied() {
                    Some("lowerbound") => Some(ScoreBound::Lower),
                    Some("upperbound") => Some(ScoreBound::Upper),
                    _ => None,
                };
                match (tokens.get(i + 1).copied(), tokens.get(i + 2)) {
                    (Some("cp"), Some(v)) => {
                        info.score = v.parse().ok().map(Score::Cp);
                        info.bound = bound;
                    }
                    (Some("mate"), Some(v)) => {
                        info.score = v.strip_prefix('-').map_or_else(
                            || v.parse().ok().map(Score::MateIn),
                            |rest| rest.parse().ok().map(Score::MatedIn),
                        );
                    }
                    _ => {}
                }
                i += if bound.is_some() { 3 } else { 2 };
            }
            "string" => {
                info.string = Some(tokens[i + 1..].join(" "));
                break;
            }
            "pv" => {
                info.pv = tokens[i + 1..].iter().filter_map(|t| parse_move(t).ok()).collect();
                break;
            }
            _ => i += 1,
        }
    }
    Some(info)
}

#[derive(Debug, Clone)]
pub enum Response {
    Id { name: String, author: String },
    UsiOk,
    ReadyOk,
    Info(SearchInfo),
    BestMove { mv: shogi_core::Move, ponder: Option<shogi_core::Move> },
    BestMoveResign,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Id { name, author } => write!(f, "id name {name}\nid author {author}"),
            Response::UsiOk => write!(f, "usiok"),
            Response::ReadyOk => write!(f, "readyok"),
            Response::Info(info) => write!(f, "{info}"),
            Response::BestMove { mv, ponder } => {
                write!(f, "bestmove {}", format_move(*mv))?;
                if let Some(p) = ponder {
                    write!(f, " ponder {}", format_move(*p))?;
                }
                Ok(())
            }
            Response::BestMoveResign => write!(f, "bestmove resign"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shogi_core::{Move, Square};

    #[test]
    fn empty_info_formats_as_empty_string() {
        let info = SearchInfo::default();
        assert_eq!(info.to_string(), "");
    }

    #[test]
    fn populated_info_orders_fields_per_usi_convention() {
        let mv = Move::new_normal(Square::new(2, 6), Square::new(2, 5), false);
        let info = SearchInfo {
            depth: Some(7),
            seldepth: Some(10),
            time_ms: Some(1234),
            nodes: Some(50_000),
            score: Some(Score::Cp(35)),
            bound: None,
            multipv: Some(1),
            currmove: None,
            nps: Some(40_500),
            hashfull: Some(120),
            pv: vec![mv],
            string: None,
        };
        assert_eq!(
            info.to_string(),
            "info depth 7 seldepth 10 time 1234 nodes 50000 score cp 35 multipv 1 nps 40500 hashfull 120 pv 7g7f"
        );
    }

    #[test]
    fn mate_scores_format_with_sign() {
        assert_eq!(Score::MateIn(3).to_string(), "mate 3");
        assert_eq!(Score::MatedIn(3).to_string(), "mate -3");
    }

    #[test]
    fn bound_suffixes_are_appended_after_the_score() {
        let info = SearchInfo { score: Some(Score::Cp(10)), bound: Some(ScoreBound::Lower), ..Default::default() };
        assert_eq!(info.to_string(), "info score cp 10 lowerbound");
    }

    #[test]
    fn bestmove_includes_ponder_when_present() {
        let mv = Move::new_normal(Square::new(2, 6), Square::new(2, 5), false);
        let ponder = Move::new_normal(Square::new(3, 3), Square::new(3, 4), false);
        let resp = Response::BestMove { mv, ponder: Some(ponder) };
        assert_eq!(resp.to_string(), "bestmove 7g7f ponder 6d6e");
    }

    #[test]
    fn bestmove_without_ponder_omits_it() {
        let mv = Move::new_normal(Square::new(2, 6), Square::new(2, 5), false);
        let resp = Response::BestMove { mv, ponder: None };
        assert_eq!(resp.to_string(), "bestmove 7g7f");
    }

    #[test]
    fn parse_info_line_reads_the_common_fields() {
        let info = parse_info_line("info depth 10 seldepth 12 nodes 12345 time 67 nps 890 score cp 34 pv 7g7f 3c3d")
            .unwrap();
        assert_eq!(info.depth, Some(10));
        assert_eq!(info.seldepth, Some(12));
        assert_eq!(info.nodes, Some(12_345));
        assert_eq!(info.time_ms, Some(67));
        assert_eq!(info.nps, Some(890));
        assert_eq!(info.score, Some(Score::Cp(34)));
        assert_eq!(info.pv.len(), 2);
    }

    #[test]
    fn parse_info_line_reads_negative_mate_scores() {
        let info = parse_info_line("info depth 3 score mate -2 pv 7g7f").unwrap();
        assert_eq!(info.score, Some(Score::MatedIn(2)));
    }

    #[test]
    fn parse_info_line_reads_bound_suffix() {
        let info = parse_info_line("info score cp 10 lowerbound").unwrap();
        assert_eq!(info.bound, Some(ScoreBound::Lower));
    }

    #[test]
    fn parse_info_line_rejects_non_info_lines() {
        assert!(parse_info_line("bestmove 7g7f").is_none());
    }

    #[test]
    fn parse_info_line_reads_string_payload_to_end_of_line() {
        let info = parse_info_line("info string Unsupported Command: frobnicate").unwrap();
        assert_eq!(info.string.as_deref(), Some("Unsupported Command: frobnicate"));
    }
}
