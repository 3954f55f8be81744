//! 反復深化(Iterative Deepening)とAspiration Window
//!
//! 深さ1から順に`alpha_beta`を呼び直す。2回目以降は前回のスコアを中心に
//! 狭い窓(aspiration window)で探索し、fail high/lowしたときだけ窓を
//! 指数的に広げて再探索する。窓が狭いほど枝刈りが効いて速いが、
//! 不安定な局面では再探索コストがかさむ。

use crate::position::Position;
use crate::types::{Depth, Move, Value, MAX_PLY, ONE_PLY};

use super::alpha_beta::{alpha_beta, SearchState};
use super::time_manager::{SearchStats, TimeManager};
use super::types::{RootMoves, PV_NODE};
use super::SearchContext;

/// Aspiration windowの初期幅。浅い深さではこれより広く全幅で探索する。
const INITIAL_WINDOW: i32 = 18;
const ASPIRATION_MIN_DEPTH: Depth = 5 * ONE_PLY;

/// 反復深化の1回の`go`コマンドぶんを駆動する。`root_moves`は呼び出し前に
/// `RootMoves::from_legal_moves`などで初期化しておくこと。
///
/// `on_iteration`は深さが1つ完了するたびに呼ばれ、USIの`info`行を組み立てる
/// 側の責任に委ねる(このモジュールはUSIプロトコルを知らない)。
pub fn iterative_deepening(
    ctx: &SearchContext<'_>,
    st: &mut SearchState,
    pos: &mut Position,
    root_moves: &mut RootMoves,
    time_manager: &TimeManager,
    stats: &mut SearchStats,
    start_depth: Depth,
    mut on_iteration: impl FnMut(&RootMoves, Depth, u64),
) {
    if root_moves.is_empty() {
        return;
    }

    let mut best_move_changes = 0u32;
    let mut previous_best = root_moves.best().map(|rm| rm.mv());

    let mut depth: Depth = start_depth.max(ONE_PLY);
    while (depth / ONE_PLY) as usize <= MAX_PLY && !ctx.signals.should_stop() {
        let mut alpha = -Value::INFINITE;
        let mut beta = Value::INFINITE;
        let mut window = INITIAL_WINDOW;

        if depth >= ASPIRATION_MIN_DEPTH {
            if let Some(best) = root_moves.best() {
                let prev = best.previous_score;
                if prev.raw().abs() < Value::MATE_IN_MAX_PLY.raw() {
                    alpha = (prev.raw() - window).into();
                    beta = (prev.raw() + window).into();
                }
            }
        }

        let score = loop {
            let score = alpha_beta::<PV_NODE>(ctx, st, pos, depth, alpha, beta, 0);
            if ctx.signals.should_stop() {
                break score;
            }
            if score.raw() <= alpha.raw() {
                beta = ((alpha.raw() + beta.raw()) / 2).into();
                alpha = (score.raw() - window).into();
                window += window / 2;
                time_manager.enter_panic_mode(stats);
            } else if score.raw() >= beta.raw() {
                beta = (score.raw() + window).into();
                window += window / 2;
            } else {
                break score;
            }
        };

        if ctx.signals.should_stop() {
            break;
        }

        if let Some(root) = root_moves.find_mut(pv_first_move(ctx, pos).unwrap_or(Move::NONE)) {
            root.previous_score = root.score;
            root.score = score;
            root.pv = extract_pv(ctx, pos, MAX_PLY);
            root.nodes = ctx.signals.nodes_searched();
        }
        root_moves.sort_by_score();

        let current_best = root_moves.best().map(|rm| rm.mv());
        if current_best != previous_best {
            best_move_changes += 1;
            previous_best = current_best;
        }
        stats.iterations_finished += 1;
        stats.pv_instability = 1.0 + best_move_changes as f64 * 0.5;

        on_iteration(root_moves, depth, ctx.signals.nodes_searched());

        if stats.pv_instability > 1.5 {
            time_manager.enter_panic_mode(stats);
        }
        if !time_manager.enough_time_for_next_iteration() {
            break;
        }
        if let Some(best) = root_moves.best() {
            if best.score.is_mate_score() && (depth / ONE_PLY) as i32 > best.score.mate_ply() {
                break;
            }
        }

        depth += ONE_PLY;
    }
}

/// ルート局面でTTに記録されている最善手を読む(aspiration windowの結果を
/// `RootMoves`に紐付けるための補助)
fn pv_first_move(ctx: &SearchContext<'_>, pos: &Position) -> Option<Move> {
    let probe = ctx.tt.probe(pos.key());
    if !probe.found {
        return None;
    }
    pos.to_move(probe.data.mv)
}

/// TTを根から辿ってPVを再構成する。局面を一時的に進めるが、終了時には
/// 必ず元のplyまで`undo_move`する。
fn extract_pv(ctx: &SearchContext<'_>, pos: &mut Position, max_len: usize) -> Vec<Move> {
    let mut pv = Vec::with_capacity(max_len);
    let mut undone = 0;
    for _ in 0..max_len {
        let probe = ctx.tt.probe(pos.key());
        if !probe.found {
            break;
        }
        let Some(mv) = pos.to_move(probe.data.mv) else { break };
        if pv.contains(&mv) {
            break;
        }
        pos.do_move(mv);
        undone += 1;
        pv.push(mv);
    }
    for _ in 0..undone {
        pos.undo_move();
    }
    pv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MaterialEvaluator;
    use crate::search::movepicker::root_candidate_moves;
    use crate::search::signals::SearchSignals;
    use crate::search::time_manager::TimePolicy;
    use crate::tt::TranspositionTable;
    use std::sync::Arc;

    #[test]
    fn shallow_search_from_hirate_returns_a_legal_move() {
        let mut pos = Position::new();
        let tt = TranspositionTable::new(1);
        let evaluator = MaterialEvaluator;
        let signals = SearchSignals::new();
        let ctx = SearchContext { tt: &tt, evaluator: &evaluator, signals: signals.as_ref() };
        let mut st = SearchState::default();
        let mut root_moves = RootMoves::from_legal_moves(root_candidate_moves(&mut pos));
        let time_manager = TimeManager::start(TimePolicy::Fixed { movetime_ms: 500 }, 1, Arc::clone(&signals));
        let mut stats = SearchStats::default();

        let mut depth_reached = 0;
        iterative_deepening(&ctx, &mut st, &mut pos, &mut root_moves, &time_manager, &mut stats, ONE_PLY, |_, depth, _| {
            depth_reached = depth;
            if depth >= 2 * ONE_PLY {
                signals.request_stop();
            }
        });

        assert!(depth_reached >= ONE_PLY);
        assert!(root_moves.best().is_some());
    }
}
