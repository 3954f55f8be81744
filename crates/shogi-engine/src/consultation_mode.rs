//! 合議制（投票アンサンブル）コーディネータモード
//!
//! 同じ局面を`--workers`体のピアに独立探索させ(`go infinite`固定)、多数決で
//! 1手を選ぶ。ピアは`--engine-path`(省略時は自分自身)を`--mode single`相当で
//! 子プロセス起動したもの。賛成票の割合は`info string votes ...`として
//! 勝者が変わるたびに報告する。

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shogi_consultation::Coordinator;
use shogi_core::search::signals::SearchSignals;
use shogi_core::search::time_manager::TimePolicy;
use shogi_core::Position;
use shogi_protocol::{parse_move, EngineOptions, GoParams, Response};

use crate::state::resolve_time_policy;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct ConsultationEngine {
    options: EngineOptions,
    position: Position,
    engine_path: PathBuf,
    num_voting_workers: usize,
}

impl ConsultationEngine {
    pub fn new(engine_path: Option<PathBuf>, num_voting_workers: usize) -> ConsultationEngine {
        let engine_path = engine_path
            .or_else(|| std::env::current_exe().ok())
            .unwrap_or_else(|| PathBuf::from("shogi-engine"));
        ConsultationEngine {
            options: EngineOptions::default(),
            position: Position::new(),
            engine_path,
            num_voting_workers: num_voting_workers.max(1),
        }
    }

    pub fn isready(&mut self) {
        println!("readyok");
        flush();
    }

    pub fn setoption(&mut self, name: &str, value: Option<&str>) {
        if let Err(err) = self.options.apply(name, value) {
            println!("info string {err}");
            flush();
        }
    }

    pub fn usinewgame(&mut self) {}

    pub fn set_position(&mut self, startpos: bool, sfen: Option<&str>, moves: &[String]) {
        if startpos {
            self.position.set_hirate();
        } else if let Some(sfen) = sfen {
            if let Err(err) = self.position.set_sfen(sfen) {
                println!("info string invalid sfen: {err}");
                flush();
                return;
            }
        }
        for token in moves {
            match parse_move(token).ok().and_then(|mv| self.position.to_move(mv)) {
                Some(mv) => self.position.do_move(mv),
                None => {
                    println!("info string ignoring illegal move in position command: {token}");
                    flush();
                    break;
                }
            }
        }
    }

    pub fn go(&mut self, params: &GoParams, signals: &Arc<SearchSignals>) {
        let position_cmd = format!("position sfen {}", self.position.to_sfen());
        let mut coordinator = match Coordinator::spawn(&position_cmd, &self.engine_path, self.num_voting_workers) {
            Ok(c) => c,
            Err(err) => {
                println!("info string failed to start consultation peers: {err}");
                flush();
                println!("{}", Response::BestMoveResign);
                flush();
                return;
            }
        };

        let policy = resolve_time_policy(params, &self.options, self.position.side_to_move());
        let deadline = deadline_for(policy);
        let mut winner_line: Option<String> = None;

        loop {
            if signals.should_stop() || deadline.is_some_and(|d| Instant::now() >= d) {
                let _ = coordinator.stop_all();
                break;
            }
            match coordinator.poll(POLL_INTERVAL) {
                Ok(Some((breakdown, winner))) => {
                    println!("{breakdown}");
                    flush();
                    println!("{winner}");
                    flush();
                    winner_line = Some(winner);
                }
                Ok(None) => {}
                Err(err) => {
                    println!("info string consultation coordinator error: {err}");
                    flush();
                    break;
                }
            }
        }

        let response = winner_line
            .as_deref()
            .and_then(extract_pv_move)
            .map(|mv| Response::BestMove { mv, ponder: None })
            .unwrap_or(Response::BestMoveResign);
        println!("{response}");
        flush();
    }
}

fn deadline_for(policy: TimePolicy) -> Option<Instant> {
    match policy {
        TimePolicy::Infinite => None,
        other => Some(Instant::now() + Duration::from_millis(other.allotment(1).target_ms)),
    }
}

/// `info score cp ... pv <move>`形式の勝者info行から先頭の指し手だけを取り出す
fn extract_pv_move(line: &str) -> Option<shogi_core::Move> {
    let idx = line.find("pv ")?;
    let token = line[idx + 3..].split_whitespace().next()?;
    parse_move(token).ok()
}

fn flush() {
    std::io::stdout().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_pv_move_reads_the_first_move_after_pv() {
        let mv = extract_pv_move("info score cp 35 pv 7g7f 3c3d").unwrap();
        assert_eq!(shogi_protocol::format_move(mv), "7g7f");
    }

    #[test]
    fn extract_pv_move_is_none_without_a_pv_token() {
        assert!(extract_pv_move("info string votes 7g7f:3").is_none());
    }
}
