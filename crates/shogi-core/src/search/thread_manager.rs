//! Lazy-SMPスレッドプール
//!
//! 全スレッドが同じ置換表を共有しながら、それぞれ独立に反復深化を走らせる。
//! 同期は取らず、置換表への書き込みを通じて間接的に情報を交換する
//! (Lazy SMP)。ヘルパースレッドは深さの開始点をずらすことで、
//! 全スレッドが毎回同じ手順を辿って同じ局所解に落ち込むのを防ぐ。

use std::sync::Arc;
use std::thread;

use crate::eval::Evaluator;
use crate::position::Position;
use crate::tt::TranspositionTable;
use crate::types::{Move, ONE_PLY};

use super::alpha_beta::SearchState;
use super::iterative_deepening::iterative_deepening;
use super::movepicker::root_candidate_moves;
use super::signals::SearchSignals;
use super::time_manager::{SearchStats, TimeManager, TimePolicy};
use super::types::RootMoves;
use super::SearchContext;

/// 1回の`go`コマンドに対する探索結果
pub struct SearchResult {
    pub best_move: Move,
    pub ponder_move: Option<Move>,
    pub score_cp: i32,
    pub depth_reached: i32,
    pub nodes: u64,
}

pub struct ThreadManager {
    tt: Arc<TranspositionTable>,
    evaluator: Arc<dyn Evaluator>,
    num_threads: usize,
}

impl ThreadManager {
    pub fn new(tt: Arc<TranspositionTable>, evaluator: Arc<dyn Evaluator>, num_threads: usize) -> ThreadManager {
        ThreadManager { tt, evaluator, num_threads: num_threads.max(1) }
    }

    /// `root`から`policy`の持ち時間で探索する。すべてのヘルパースレッドが
    /// 停止するまでブロックする。`on_iteration`はメインスレッド(thread 0)の
    /// 反復深化が1つ進むたびに呼ばれる。`signals`は呼び出し側が保持し、別
    /// スレッド(USI`stop`/`ponderhit`の受信側)から停止要求を送れるようにする。
    /// `allowed_root_moves`を与えると`go searchmoves`/分散探索の`ignoremoves`
    /// のようにルートでの候補手をその集合に絞り込む。
    pub fn search(
        &self,
        root: &Position,
        policy: TimePolicy,
        signals: Arc<SearchSignals>,
        allowed_root_moves: Option<&[Move]>,
        mut on_iteration: impl FnMut(&RootMoves, i32, u64) + Send,
    ) -> SearchResult {
        self.tt.new_search();
        signals.reset();
        let time_manager = TimeManager::start(policy, root.game_ply(), Arc::clone(&signals));

        thread::scope(|scope| {
            let time_manager_ref = &time_manager;
            let mut handles = Vec::with_capacity(self.num_threads - 1);
            for helper_id in 1..self.num_threads {
                let tt = Arc::clone(&self.tt);
                let evaluator = Arc::clone(&self.evaluator);
                let signals = Arc::clone(&signals);
                let mut pos = root.clone();
                handles.push(scope.spawn(move || {
                    let ctx = SearchContext { tt: tt.as_ref(), evaluator: evaluator.as_ref(), signals: signals.as_ref() };
                    let mut st = SearchState::default();
                    let mut root_moves = RootMoves::from_legal_moves(root_candidate_moves(&mut pos));
                    if let Some(allowed) = allowed_root_moves {
                        root_moves.restrict_to(allowed);
                    }
                    let mut stats = SearchStats::default();
                    // ヘルパースレッドは開始深さをばらけさせ、全スレッドが同じ順で
                    // 同じ局面を読んで同じ結論に収束するのを避ける
                    let start_depth = ONE_PLY + (helper_id % 4) as i32 * ONE_PLY;
                    iterative_deepening(
                        &ctx,
                        &mut st,
                        &mut pos,
                        &mut root_moves,
                        time_manager_ref,
                        &mut stats,
                        start_depth,
                        |_, _, _| {},
                    );
                }));
            }

            let ctx = SearchContext { tt: self.tt.as_ref(), evaluator: self.evaluator.as_ref(), signals: signals.as_ref() };
            let mut st = SearchState::default();
            let mut pos = root.clone();
            let mut root_moves = RootMoves::from_legal_moves(root_candidate_moves(&mut pos));
            if let Some(allowed) = allowed_root_moves {
                root_moves.restrict_to(allowed);
            }
            let mut stats = SearchStats::default();

            iterative_deepening(
                &ctx,
                &mut st,
                &mut pos,
                &mut root_moves,
                &time_manager,
                &mut stats,
                ONE_PLY,
                |rm, depth, nodes| on_iteration(rm, depth, nodes),
            );

            time_manager.stop();
            for handle in handles {
                let _ = handle.join();
            }

            let best = root_moves.best();
            let best_move = best.map(|rm| rm.mv()).unwrap_or(Move::NONE);
            let ponder_move = best.and_then(|rm| rm.pv.get(1).copied());
            let score_cp = best.map(|rm| rm.score.to_cp()).unwrap_or(0);
            let depth_reached = stats.iterations_finished as i32;
            let nodes = signals.nodes_searched();

            SearchResult { best_move, ponder_move, score_cp, depth_reached, nodes }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MaterialEvaluator;

    #[test]
    fn single_thread_search_from_hirate_picks_a_legal_move() {
        let tt = Arc::new(TranspositionTable::new(1));
        let evaluator: Arc<dyn Evaluator> = Arc::new(MaterialEvaluator);
        let manager = ThreadManager::new(tt, evaluator, 1);
        let pos = Position::new();

        let mut iterations = 0;
        let result =
            manager.search(&pos, TimePolicy::Fixed { movetime_ms: 300 }, SearchSignals::new(), None, |_, _, _| {
                iterations += 1;
            });

        assert!(!result.best_move.is_none());
        assert!(iterations > 0);
    }

    #[test]
    fn multiple_threads_agree_on_a_legal_best_move() {
        let tt = Arc::new(TranspositionTable::new(1));
        let evaluator: Arc<dyn Evaluator> = Arc::new(MaterialEvaluator);
        let manager = ThreadManager::new(tt, evaluator, 3);
        let pos = Position::new();

        let result =
            manager.search(&pos, TimePolicy::Fixed { movetime_ms: 300 }, SearchSignals::new(), None, |_, _, _| {});
        assert!(!result.best_move.is_none());
    }

    #[test]
    fn allowed_root_moves_restricts_the_final_choice() {
        let tt = Arc::new(TranspositionTable::new(1));
        let evaluator: Arc<dyn Evaluator> = Arc::new(MaterialEvaluator);
        let manager = ThreadManager::new(tt, evaluator, 1);
        let pos = Position::new();
        let mut scratch = pos.clone();
        let legal = root_candidate_moves(&mut scratch);
        let allowed = [legal[0]];

        let result = manager.search(
            &pos,
            TimePolicy::Fixed { movetime_ms: 300 },
            SearchSignals::new(),
            Some(&allowed),
            |_, _, _| {},
        );
        assert_eq!(result.best_move, allowed[0]);
    }
}
