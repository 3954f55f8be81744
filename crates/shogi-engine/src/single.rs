//! 単一プロセスのLazy-SMP探索エンジン
//!
//! クラスタ/合議制のリーフ・ピアも`--mode single`(デフォルト)でそのまま
//! 起動されるため、この実装がそれらの末端で実際に指し手を読む部分になる。

use std::io::Write as _;
use std::sync::Arc;
use std::time::Instant;

use shogi_core::eval::{Evaluator, MaterialEvaluator};
use shogi_core::movegen::{mate_in_one, mate_in_three};
use shogi_core::search::signals::SearchSignals;
use shogi_core::search::thread_manager::ThreadManager;
use shogi_core::tt::TranspositionTable;
use shogi_core::Position;
use shogi_protocol::{EngineOptions, GoParams, MateLimit, Response, Score, ScoreBound, SearchInfo};

use crate::state::{resolve_allowed_moves, resolve_time_policy, try_allocate_tt};

pub struct SingleEngine {
    options: EngineOptions,
    position: Position,
    tt: Arc<TranspositionTable>,
    evaluator: Arc<dyn Evaluator>,
}

impl Default for SingleEngine {
    fn default() -> SingleEngine {
        SingleEngine::new()
    }
}

impl SingleEngine {
    pub fn new() -> SingleEngine {
        let options = EngineOptions::default();
        let tt = Arc::new(try_allocate_tt(options.usi_hash_mb as usize));
        SingleEngine { options, position: Position::new(), tt, evaluator: Arc::new(MaterialEvaluator) }
    }

    pub fn isready(&mut self) {
        self.tt.clear();
        println!("readyok");
        flush();
    }

    pub fn setoption(&mut self, name: &str, value: Option<&str>) {
        match self.options.apply(name, value) {
            Ok(()) => {
                if name == "USI_Hash" {
                    self.tt = Arc::new(try_allocate_tt(self.options.usi_hash_mb as usize));
                }
            }
            Err(err) => {
                println!("info string {err}");
                flush();
            }
        }
    }

    pub fn usinewgame(&mut self) {
        self.tt.clear();
    }

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
            match shogi_protocol::parse_move(token).ok().and_then(|mv| self.position.to_move(mv)) {
                Some(mv) => self.position.do_move(mv),
                None => {
                    println!("info string ignoring illegal move in position command: {token}");
                    flush();
                    break;
                }
            }
        }
    }

    pub fn threads(&self) -> usize {
        self.options.threads.max(1) as usize
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// `signals`は呼び出し側(`main`)が保持し、`stop`/`ponderhit`はそちらから
    /// 別スレッドで届く。ここではひたすら`ThreadManager::search`をブロッキング
    /// 呼び出しして、反復深化が進むたびに`info`を、終了後に`bestmove`を出す。
    pub fn go(&mut self, params: &GoParams, signals: &Arc<SearchSignals>) {
        if let Some(limit) = params.mate {
            self.go_mate(limit);
            return;
        }

        let allowed = resolve_allowed_moves(&self.position, &params.searchmoves, &params.ignoremoves);
        let policy = resolve_time_policy(params, &self.options, self.position.side_to_move());
        signals.set_pondering(params.ponder);

        let manager = ThreadManager::new(Arc::clone(&self.tt), Arc::clone(&self.evaluator), self.threads());
        let hashfull_tt = Arc::clone(&self.tt);
        let start = Instant::now();

        let result = manager.search(&self.position, policy, Arc::clone(signals), allowed.as_deref(), |root_moves, depth, nodes| {
            let Some(best) = root_moves.best() else { return };
            let elapsed_ms = start.elapsed().as_millis().max(1) as u64;
            let info = SearchInfo {
                depth: Some(depth.max(0) as u32),
                seldepth: Some(best.sel_depth.max(0) as u32),
                time_ms: Some(elapsed_ms),
                nodes: Some(nodes),
                score: Some(Score::from_value(best.score)),
                bound: Some(ScoreBound::Exact),
                nps: Some(nodes.saturating_mul(1000) / elapsed_ms),
                hashfull: Some(hashfull_tt.hashfull()),
                pv: best.pv.clone(),
                ..SearchInfo::default()
            };
            println!("{}", Response::Info(info));
            flush();
        });

        let response = if result.best_move.is_none() {
            Response::BestMoveResign
        } else {
            Response::BestMove { mv: result.best_move, ponder: result.ponder_move }
        };
        println!("{response}");
        flush();
    }

    /// `go mate`: §6の応答文法に`checkmate`型はないので、見つかった詰み手を
    /// そのまま`bestmove`として返す(見つからなければ`resign`)。
    fn go_mate(&mut self, limit: MateLimit) {
        let _ = limit;
        let mut pos = self.position.clone();
        let mv = mate_in_one(&mut pos).or_else(|| mate_in_three(&mut pos));
        let response = match mv {
            Some(mv) => Response::BestMove { mv, ponder: None },
            None => Response::BestMoveResign,
        };
        println!("{response}");
        flush();
    }
}

fn flush() {
    std::io::stdout().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_from_the_starting_position_reports_a_legal_best_move() {
        let mut engine = SingleEngine::new();
        let params = GoParams { movetime: Some(300), ..Default::default() };
        let signals = SearchSignals::new();
        engine.go(&params, &signals);
    }

    #[test]
    fn go_mate_on_the_starting_position_resigns() {
        let mut engine = SingleEngine::new();
        let params = GoParams { mate: Some(MateLimit::Infinite), ..Default::default() };
        let signals = SearchSignals::new();
        engine.go(&params, &signals);
    }
}
