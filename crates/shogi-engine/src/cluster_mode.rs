//! ツリー分割クラスタコーディネータモード
//!
//! ルート局面を300msだけ単スレッドでプレサーチし、そのMultiPV上位手を
//! 元にミニマックス木を組み立てて、葉ごとに`--engine-path`(省略時は自分自身)
//! を`--mode single`相当の子プロセスとして起動する。子からの`info`行は
//! 根まで伝播されたものだけを上流へ中継する。

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shogi_cluster::{Coordinator, PresearchResult, PvLine, WeightTable};
use shogi_core::eval::{Evaluator, MaterialEvaluator};
use shogi_core::movegen::legal_moves;
use shogi_core::search::signals::SearchSignals;
use shogi_core::search::thread_manager::ThreadManager;
use shogi_core::search::time_manager::TimePolicy;
use shogi_core::tt::TranspositionTable;
use shogi_core::Position;
use shogi_protocol::{EngineOptions, GoParams, Response};

use crate::state::{resolve_time_policy, try_allocate_tt};

/// プレサーチに割り当てる固定思考時間。木構築の材料を集めるだけなので
/// 短く、`go`全体の持ち時間からは独立している。
const PRESEARCH_MOVETIME_MS: u64 = 300;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct ClusterEngine {
    options: EngineOptions,
    position: Position,
    engine_path: PathBuf,
    weights: WeightTable,
}

impl ClusterEngine {
    pub fn new(engine_path: Option<PathBuf>) -> ClusterEngine {
        let engine_path = engine_path
            .or_else(|| std::env::current_exe().ok())
            .unwrap_or_else(|| PathBuf::from("shogi-engine"));
        ClusterEngine { options: EngineOptions::default(), position: Position::new(), engine_path, weights: WeightTable::default() }
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

    pub fn go(&mut self, params: &GoParams, signals: &Arc<SearchSignals>) {
        let root_cmd = format!("position sfen {}", self.position.to_sfen());
        let evaluator: Arc<dyn Evaluator> = Arc::new(MaterialEvaluator);
        let (presearch, legal_moves) = run_presearch(&self.position, self.options.usi_hash_mb as usize, &evaluator);

        if legal_moves.is_empty() {
            println!("{}", Response::BestMoveResign);
            flush();
            return;
        }

        let mut coordinator = match Coordinator::spawn(&root_cmd, &legal_moves, &presearch, &self.engine_path, &self.weights) {
            Ok(c) => c,
            Err(err) => {
                println!("info string failed to start cluster workers: {err}");
                flush();
                println!("{}", Response::BestMoveResign);
                flush();
                return;
            }
        };

        let policy = resolve_time_policy(params, &self.options, self.position.side_to_move());
        let deadline = deadline_for(policy);

        loop {
            if signals.should_stop() || deadline.is_some_and(|d| Instant::now() >= d) {
                let _ = coordinator.stop_all();
                break;
            }
            match coordinator.poll(POLL_INTERVAL) {
                Ok(Some(line)) => {
                    println!("{line}");
                    flush();
                }
                Ok(None) => {}
                Err(err) => {
                    println!("info string cluster coordinator error: {err}");
                    flush();
                    break;
                }
            }
            if coordinator.leaf_count() == 0 {
                break;
            }
        }

        let response = match coordinator.best_move() {
            Some(mv) => Response::BestMove { mv, ponder: None },
            None => Response::BestMoveResign,
        };
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

/// ルート局面から固定時間・単スレッドでプレサーチし、MultiPV上位`min(legal, 7)`本の
/// 主変化とその局面の合法手一覧を返す。
fn run_presearch(position: &Position, tt_mb: usize, evaluator: &Arc<dyn Evaluator>) -> (PresearchResult, Vec<shogi_core::Move>) {
    let mut scratch = position.clone();
    let legal = legal_moves(&mut scratch);
    let cap = legal.len().min(7);

    let tt = Arc::new(try_allocate_tt(tt_mb));
    let manager = ThreadManager::new(tt, Arc::clone(evaluator), 1);
    let signals = SearchSignals::new();
    let mut lines: Vec<PvLine> = Vec::new();

    manager.search(position, TimePolicy::Fixed { movetime_ms: PRESEARCH_MOVETIME_MS }, signals, None, |root_moves, _, _| {
        lines = root_moves.multi_pv(cap).iter().map(|rm| PvLine { moves: rm.pv.clone(), score: rm.score }).collect();
    });

    (PresearchResult { lines }, legal)
}

fn flush() {
    std::io::stdout().flush().ok();
}
