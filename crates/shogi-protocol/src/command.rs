//! USIコマンドの定義とパース
//!
//! コマンドは空白区切りのトークン列として届く。不明なキーワードは
//! `info string`で警告して無視する方針(§7)なので、`go`のパースは
//! 未知のパラメータをエラーにせずログだけ残す。

use log::warn;
use thiserror::Error;

/// USIコマンドのパース失敗。`info string`にそのまま表示するだけで
/// 復旧は呼び出し側(受信スレッド)がコマンドを1行捨てるだけなので、
/// 種別ごとの分岐は今のところ必要ないが、原因を握りつぶさず保持しておく。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unsupported command: {0}")]
    Unsupported(String),
    #[error("setoption requires 'name <N> [value <V>]'")]
    MalformedSetOption,
    #[error("position requires 'startpos' or 'sfen ...'")]
    MissingPosition,
    #[error("position must start with 'startpos' or 'sfen'")]
    InvalidPositionKeyword,
    #[error("sfen position requires the 4 sfen fields")]
    IncompleteSfenFields,
    #[error("go {keyword} requires a value")]
    MissingGoValue { keyword: &'static str },
    #[error("invalid {keyword} value: {value}")]
    InvalidGoValue { keyword: &'static str, value: String },
    #[error("go cannot combine searchmoves and ignoremoves")]
    ConflictingMoveRestriction,
    #[error("invalid gameover result: {0}")]
    InvalidGameOverResult(String),
}

pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Usi,
    IsReady,
    SetOption { name: String, value: Option<String> },
    UsiNewGame,
    Position { startpos: bool, sfen: Option<String>, moves: Vec<String> },
    Go(GoParams),
    Stop,
    PonderHit,
    GameOver(GameResult),
    Quit,
}

/// `go`に付与できるパラメータ。`searchmoves`と`ignoremoves`は排他的だが、
/// パース段階では両方保持し、上位が矛盾を判定する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub ponder: bool,
    pub infinite: bool,
    pub btime: Option<u64>,
    pub wtime: Option<u64>,
    pub byoyomi: Option<u64>,
    pub binc: Option<u64>,
    pub winc: Option<u64>,
    pub movetime: Option<u64>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub moves_to_go: Option<u32>,
    pub mate: Option<MateLimit>,
    pub searchmoves: Vec<String>,
    pub ignoremoves: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateLimit {
    Infinite,
    Millis(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win,
    Lose,
    Draw,
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GameResult::Win => "win",
            GameResult::Lose => "lose",
            GameResult::Draw => "draw",
        };
        write!(f, "{s}")
    }
}

pub fn parse_command(line: &str) -> Result<Command> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = parts.first() else {
        return Err(CommandError::Empty);
    };

    match head {
        "usi" => Ok(Command::Usi),
        "isready" => Ok(Command::IsReady),
        "usinewgame" => Ok(Command::UsiNewGame),
        "stop" => Ok(Command::Stop),
        "ponderhit" => Ok(Command::PonderHit),
        "quit" => Ok(Command::Quit),
        "setoption" => parse_setoption(&parts[1..]),
        "position" => parse_position(&parts[1..]),
        "go" => parse_go(&parts[1..]),
        "gameover" => parse_gameover(&parts[1..]),
        other => Err(CommandError::Unsupported(other.to_string())),
    }
}

fn parse_setoption(parts: &[&str]) -> Result<Command> {
    if parts.len() < 2 || parts[0] != "name" {
        return Err(CommandError::MalformedSetOption);
    }
    let value_pos = parts.iter().position(|&p| p == "value");
    let name = match value_pos {
        Some(pos) => parts[1..pos].join(" "),
        None => parts[1..].join(" "),
    };
    let value = value_pos.and_then(|pos| {
        let rest = parts[pos + 1..].join(" ");
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    });
    Ok(Command::SetOption { name, value })
}

fn parse_position(parts: &[&str]) -> Result<Command> {
    if parts.is_empty() {
        return Err(CommandError::MissingPosition);
    }
    let (startpos, sfen, moves_start) = if parts[0] == "startpos" {
        (true, None, 1)
    } else if parts[0] == "sfen" {
        let moves_pos = parts.iter().position(|&p| p == "moves").unwrap_or(parts.len());
        if moves_pos <= 1 {
            return Err(CommandError::IncompleteSfenFields);
        }
        (false, Some(parts[1..moves_pos].join(" ")), moves_pos)
    } else {
        return Err(CommandError::InvalidPositionKeyword);
    };

    let moves = if moves_start < parts.len() && parts[moves_start] == "moves" {
        parts[moves_start + 1..].iter().map(|&s| s.to_string()).collect()
    } else {
        Vec::new()
    };
    Ok(Command::Position { startpos, sfen, moves })
}

fn parse_go(parts: &[&str]) -> Result<Command> {
    let mut params = GoParams::default();
    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            "ponder" => params.ponder = true,
            "infinite" => params.infinite = true,
            "btime" => params.btime = Some(next_u64(parts, &mut i, "btime")?),
            "wtime" => params.wtime = Some(next_u64(parts, &mut i, "wtime")?),
            "byoyomi" => params.byoyomi = Some(next_u64(parts, &mut i, "byoyomi")?),
            "binc" => params.binc = Some(next_u64(parts, &mut i, "binc")?),
            "winc" => params.winc = Some(next_u64(parts, &mut i, "winc")?),
            "movetime" => params.movetime = Some(next_u64(parts, &mut i, "movetime")?),
            "nodes" => params.nodes = Some(next_u64(parts, &mut i, "nodes")?),
            "depth" => {
                i += 1;
                let v = parts.get(i).ok_or(CommandError::MissingGoValue { keyword: "depth" })?;
                params.depth = Some(
                    v.parse()
                        .map_err(|_| CommandError::InvalidGoValue { keyword: "depth", value: v.to_string() })?,
                );
            }
            "movestogo" => {
                i += 1;
                let v = parts.get(i).ok_or(CommandError::MissingGoValue { keyword: "movestogo" })?;
                params.moves_to_go = Some(
                    v.parse()
                        .map_err(|_| CommandError::InvalidGoValue { keyword: "movestogo", value: v.to_string() })?,
                );
            }
            "mate" => {
                i += 1;
                let v = parts.get(i).ok_or(CommandError::MissingGoValue { keyword: "mate" })?;
                params.mate = Some(if *v == "infinite" {
                    MateLimit::Infinite
                } else {
                    MateLimit::Millis(
                        v.parse()
                            .map_err(|_| CommandError::InvalidGoValue { keyword: "mate", value: v.to_string() })?,
                    )
                });
            }
            "searchmoves" => {
                i += 1;
                while i < parts.len() && !is_go_keyword(parts[i]) {
                    params.searchmoves.push(parts[i].to_string());
                    i += 1;
                }
                continue;
            }
            "ignoremoves" => {
                i += 1;
                while i < parts.len() && !is_go_keyword(parts[i]) {
                    params.ignoremoves.push(parts[i].to_string());
                    i += 1;
                }
                continue;
            }
            other => warn!("Unsupported Command: go {other}"),
        }
        i += 1;
    }
    if !params.searchmoves.is_empty() && !params.ignoremoves.is_empty() {
        return Err(CommandError::ConflictingMoveRestriction);
    }
    Ok(Command::Go(params))
}

fn next_u64(parts: &[&str], i: &mut usize, keyword: &'static str) -> Result<u64> {
    *i += 1;
    let v = parts.get(*i).ok_or(CommandError::MissingGoValue { keyword })?;
    v.parse().map_err(|_| CommandError::InvalidGoValue { keyword, value: v.to_string() })
}

const GO_KEYWORDS: &[&str] = &[
    "ponder", "infinite", "btime", "wtime", "byoyomi", "binc", "winc", "movetime", "nodes", "depth",
    "movestogo", "mate", "searchmoves", "ignoremoves",
];

fn is_go_keyword(token: &str) -> bool {
    GO_KEYWORDS.contains(&token)
}

fn parse_gameover(parts: &[&str]) -> Result<Command> {
    let result = match parts.first().copied() {
        Some("win") => GameResult::Win,
        Some("lose") => GameResult::Lose,
        Some("draw") => GameResult::Draw,
        other => return Err(CommandError::InvalidGameOverResult(format!("{other:?}"))),
    };
    Ok(Command::GameOver(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands_round_trip() {
        assert_eq!(parse_command("usi").unwrap(), Command::Usi);
        assert_eq!(parse_command("isready").unwrap(), Command::IsReady);
        assert_eq!(parse_command("usinewgame").unwrap(), Command::UsiNewGame);
        assert_eq!(parse_command("stop").unwrap(), Command::Stop);
        assert_eq!(parse_command("ponderhit").unwrap(), Command::PonderHit);
        assert_eq!(parse_command("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn setoption_splits_name_and_value() {
        let Command::SetOption { name, value } =
            parse_command("setoption name USI_Hash value 512").unwrap()
        else {
            panic!("expected SetOption")
        };
        assert_eq!(name, "USI_Hash");
        assert_eq!(value, Some("512".to_string()));
    }

    #[test]
    fn position_with_moves_parses_move_list() {
        let Command::Position { startpos, sfen, moves } =
            parse_command("position startpos moves 7g7f 3c3d").unwrap()
        else {
            panic!("expected Position")
        };
        assert!(startpos);
        assert!(sfen.is_none());
        assert_eq!(moves, vec!["7g7f", "3c3d"]);
    }

    #[test]
    fn go_collects_byoyomi_time_controls() {
        let Command::Go(params) = parse_command("go btime 60000 wtime 50000 byoyomi 10000").unwrap() else {
            panic!("expected Go")
        };
        assert_eq!(params.btime, Some(60_000));
        assert_eq!(params.byoyomi, Some(10_000));
    }

    #[test]
    fn go_searchmoves_stops_at_the_next_keyword() {
        let Command::Go(params) = parse_command("go searchmoves 7g7f 2g2f depth 5").unwrap() else {
            panic!("expected Go")
        };
        assert_eq!(params.searchmoves, vec!["7g7f", "2g2f"]);
        assert_eq!(params.depth, Some(5));
    }

    #[test]
    fn go_mate_infinite_parses() {
        let Command::Go(params) = parse_command("go mate infinite").unwrap() else {
            panic!("expected Go")
        };
        assert_eq!(params.mate, Some(MateLimit::Infinite));
    }

    #[test]
    fn combining_searchmoves_and_ignoremoves_is_rejected() {
        assert!(parse_command("go searchmoves 7g7f ignoremoves 2g2f").is_err());
    }

    #[test]
    fn unknown_command_is_an_error_not_a_panic() {
        assert_eq!(parse_command("").unwrap_err(), CommandError::Empty);
        assert_eq!(parse_command("frobnicate").unwrap_err(), CommandError::Unsupported("frobnicate".to_string()));
    }

    #[test]
    fn invalid_go_value_names_the_offending_keyword() {
        let err = parse_command("go depth abc").unwrap_err();
        assert_eq!(err, CommandError::InvalidGoValue { keyword: "depth", value: "abc".to_string() });
    }
}
