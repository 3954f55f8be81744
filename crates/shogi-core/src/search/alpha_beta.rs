//! PVS(Principal Variation Search)を核にしたメインの探索関数
//!
//! `NT`(ノード種別)をconst genericで渡すことで、PVノードとNonPVノードで
//! 枝刈りの積極性を変える。ルートノードは`iterative_deepening`が直接扱うので
//! ここでは扱わない。

use crate::movegen::{mate_in_three, see};
use crate::position::Position;
use crate::types::{Bound, Depth, Move, Value, DEPTH_QS, MAX_PLY, ONE_PLY};

use super::history::HistoryTables;
use super::movepicker::{MovePicker, QMoveKind, QMovePicker};
use super::pruning;
use super::types::{is_pv_node, SearchStack, NON_PV_NODE, PV_NODE};
use super::SearchContext;

/// 1本の探索スレッドが保持する可変状態(ヒストリ・スタック)。
/// 複数スレッドで共有してはいけないので、スレッドごとに1つ作る。
pub struct SearchState {
    pub history: HistoryTables,
    pub stack: SearchStack,
}

impl Default for SearchState {
    fn default() -> Self {
        SearchState { history: HistoryTables::default(), stack: SearchStack::default() }
    }
}

pub fn alpha_beta<const NT: u8>(
    ctx: &SearchContext<'_>,
    st: &mut SearchState,
    pos: &mut Position,
    depth: Depth,
    mut alpha: Value,
    mut beta: Value,
    ply: i32,
) -> Value {
    let is_pv = is_pv_node(NT);

    if depth <= 0 {
        return super::qsearch::qsearch(ctx, pos, &st.history, DEPTH_QS, alpha, beta, ply);
    }

    ctx.signals.count_node();

    if ctx.signals.should_stop() || ply >= MAX_PLY as i32 {
        return Value::ZERO;
    }

    // Mate distance pruning: これ以上深く読んでも、既知のmate距離を更新できないなら打ち切る
    if !is_pv || ply > 0 {
        alpha = alpha.raw().max(Value::mated_in(ply).raw()).into();
        beta = beta.raw().min(Value::mate_in(ply + 1).raw()).into();
        if alpha.raw() >= beta.raw() {
            return alpha;
        }
    }

    let in_check = pos.in_check();
    let excluded_move = st.stack.at(ply).excluded_move;

    let tt_key = if excluded_move.is_none() { pos.key() } else { pos.exclusion_key() };
    let probe = ctx.tt.probe(tt_key);
    let tt_value = if probe.found { probe.data.value.from_tt(ply) } else { Value::NONE };

    if !is_pv
        && probe.found
        && probe.data.depth >= depth
        && probe.data.bound.allows_cutoff(tt_value.raw() >= beta.raw())
    {
        return tt_value;
    }

    // 静的評価値は置換表にそのまま保存されている(距離に依存しないので`from_tt`は不要)
    let static_eval = if in_check {
        Value::NONE
    } else if !excluded_move.is_none() {
        st.stack.at(ply).static_eval
    } else if probe.found && probe.data.static_eval != Value::NONE {
        probe.data.static_eval
    } else {
        ctx.evaluator.evaluate(pos)
    };
    st.stack.at_mut(ply).static_eval = static_eval;

    let improving = !in_check
        && ply >= 2
        && st.stack.peek_back(ply, 2).map(|e| e.static_eval).unwrap_or(Value::NONE) != Value::NONE
        && static_eval.raw() > st.stack.peek_back(ply, 2).unwrap().static_eval.raw();

    // Mate-in-3 probe: この局面でまだ試していなければ、3手詰めを愚直に確認しておく
    let already_probed_mate3 = probe.found && probe.data.mate3_already_tried;
    if !is_pv && !in_check && excluded_move.is_none() && !already_probed_mate3 {
        if mate_in_three(pos).is_some() {
            let score = Value::mate_in(ply + 3);
            ctx.tt.store(pos.key(), score.to_tt(ply), is_pv, Bound::Exact, depth, Move::NONE, static_eval, true);
            return score;
        }
        // 見つからなくても、試したこと自体は記録する(結果以外のフィールドは既存の値を保つ)
        let (kept_value, kept_bound, kept_depth, kept_mv) = if probe.found {
            (probe.data.value, probe.data.bound, probe.data.depth, probe.data.mv)
        } else {
            (Value::NONE, Bound::None, 0, Move::NONE)
        };
        ctx.tt.store(pos.key(), kept_value, is_pv, kept_bound, kept_depth, kept_mv, static_eval, true);
    }

    let mut tt_move = if excluded_move.is_none() && probe.found {
        pos.to_move(probe.data.mv).unwrap_or(Move::NONE)
    } else {
        Move::NONE
    };

    if !is_pv && !in_check && excluded_move.is_none() {
        if pruning::can_razor(depth, static_eval, alpha) {
            let score =
                super::qsearch::qsearch(ctx, pos, &st.history, DEPTH_QS, alpha, alpha + Value::new(1), ply);
            if score.raw() <= alpha.raw() {
                return score;
            }
        }

        if pruning::can_futility_prune(depth, static_eval, beta, improving) {
            return static_eval;
        }

        let has_non_pawn_material = has_non_pawn_material(pos);
        if pruning::can_try_null_move(depth, static_eval, beta, in_check, has_non_pawn_material)
            && !pos.last_move_was_null()
        {
            let r = pruning::null_move_reduction(depth);
            pos.do_null_move();
            st.stack.at_mut(ply).current_move = Move::NULL;
            let null_score =
                -alpha_beta::<NON_PV_NODE>(ctx, st, pos, depth - r - ONE_PLY, -beta, -beta + Value::new(1), ply + 1);
            pos.undo_null_move();
            if ctx.signals.should_stop() {
                return Value::ZERO;
            }
            if null_score.raw() >= beta.raw() && !null_score.is_mate_score() {
                return null_score;
            }
        }

        // ProbCut: 浅い静止探索+縮小した通常探索の両方でbeta近辺を大きく超えるなら打ち切る
        if depth >= 5 * ONE_PLY && !beta.is_mate_score() {
            let threshold = beta.raw() + pruning::probcut_margin();
            let raised_beta = Value::new(threshold + 1);
            let mut probcut_picker = QMovePicker::new(pos, QMoveKind::ProbCut(threshold), tt_move, &st.history);
            while let Some(mv) = probcut_picker.next_move() {
                pos.do_move(mv);
                let mut score = -super::qsearch::qsearch(
                    ctx,
                    pos,
                    &st.history,
                    DEPTH_QS,
                    -raised_beta,
                    -raised_beta + Value::new(1),
                    ply + 1,
                );
                if score.raw() >= raised_beta.raw() {
                    score = -alpha_beta::<NON_PV_NODE>(
                        ctx,
                        st,
                        pos,
                        depth - pruning::probcut_reduction(),
                        -raised_beta,
                        -raised_beta + Value::new(1),
                        ply + 1,
                    );
                }
                pos.undo_move();
                if ctx.signals.should_stop() {
                    return Value::ZERO;
                }
                if score.raw() >= raised_beta.raw() {
                    return score;
                }
            }
        }
    }

    // Internal Iterative Deepening: ハッシュ手がないまま深く読もうとしているなら、
    // 先に浅く探索してTTに手を作ってから本番に入る
    if excluded_move.is_none() && tt_move.is_none() {
        let min_depth = if is_pv { 5 * ONE_PLY } else { 8 * ONE_PLY };
        if depth >= min_depth {
            let r = pruning::iid_reduction(depth, is_pv);
            alpha_beta::<NT>(ctx, st, pos, depth - r, alpha, beta, ply);
            if ctx.signals.should_stop() {
                return Value::ZERO;
            }
            let iid_probe = ctx.tt.probe(pos.key());
            tt_move = if iid_probe.found { pos.to_move(iid_probe.data.mv).unwrap_or(Move::NONE) } else { Move::NONE };
        }
    }

    let killers = st.stack.at(ply).killers;
    let prev = st
        .stack
        .peek_back(ply, 1)
        .filter(|e| !e.current_move.is_none() && !e.current_move.is_null())
        .map(|e| (e.moved_piece, e.current_move.to()));
    let grandparent = st
        .stack
        .peek_back(ply, 2)
        .filter(|e| !e.current_move.is_none() && !e.current_move.is_null())
        .map(|e| (e.moved_piece, e.current_move.to()));
    let mut picker = MovePicker::new(tt_move, killers, prev, grandparent, depth);
    if pruning::can_futility_prune(depth, static_eval, beta, improving) {
        picker.set_skip_quiets(true);
    }

    let mut best_score = -Value::INFINITE;
    let mut best_move = Move::NONE;
    let mut move_count = 0u32;
    let mut quiets_tried: Vec<Move> = Vec::with_capacity(16);
    let mut captures_tried: Vec<Move> = Vec::with_capacity(8);
    let original_alpha = alpha;

    while let Some(mv) = picker.next_move(pos, &st.history) {
        if mv == excluded_move {
            continue;
        }
        move_count += 1;

        let gives_check = pos.gives_check(mv);
        let is_quiet = pos.is_quiet(mv);
        let moved_piece = pos.moved_piece(mv);

        // 浅い枝刈り: 残り深さが浅いノードでは、有望でない静かな手を読む前に捨てる
        if !is_pv && !in_check && is_quiet && !best_score.is_loss() {
            if move_count >= pruning::futility_move_count(depth, improving) {
                picker.set_skip_quiets(true);
                continue;
            }
            let predicted = pruning::predicted_depth(depth, ONE_PLY);
            let gain = st.history.gains.get(mv);
            if predicted < 7 * ONE_PLY
                && static_eval.raw() + pruning::futility_margin(predicted, improving) + gain <= alpha.raw()
            {
                continue;
            }
            if depth < 4 * ONE_PLY && see(pos, mv) < 0 {
                continue;
            }
        }

        let mut extension: Depth = if gives_check { ONE_PLY / 2 } else { 0 };

        // Singular extension: ハッシュ手だけが突出して良いなら、他の手を読み飛ばさず深追いする
        if !in_check
            && mv == tt_move
            && excluded_move.is_none()
            && !st.stack.at(ply).in_singular_search
            && depth >= 8 * ONE_PLY
            && probe.found
            && probe.data.bound == Bound::Lower
            && tt_value != Value::NONE
            && (probe.data.depth - depth).abs() <= 3 * ONE_PLY
        {
            let singular_beta = tt_value - Value::new(50);
            let singular_depth = (depth / 2).max(ONE_PLY);
            st.stack.at_mut(ply).excluded_move = mv;
            st.stack.at_mut(ply).in_singular_search = true;
            let se_score = alpha_beta::<NON_PV_NODE>(
                ctx,
                st,
                pos,
                singular_depth,
                singular_beta - Value::new(1),
                singular_beta,
                ply,
            );
            st.stack.at_mut(ply).excluded_move = Move::NONE;
            st.stack.at_mut(ply).in_singular_search = false;
            if ctx.signals.should_stop() {
                return Value::ZERO;
            }
            if se_score.raw() < singular_beta.raw() {
                extension = extension.max(ONE_PLY / 2);
            }
        }

        pos.do_move(mv);
        st.stack.at_mut(ply).current_move = mv;
        st.stack.at_mut(ply).moved_piece = moved_piece;
        st.stack.at_mut(ply).move_count = move_count;

        let next_depth = depth - ONE_PLY + extension;

        let r = if is_quiet {
            if depth >= 8 * ONE_PLY {
                pruning::probability_reduction(depth, picker.last_move_probability(), is_pv)
            } else {
                pruning::late_move_reduction(depth, move_count, improving, is_pv)
            }
        } else {
            0
        };

        let mut score;
        if move_count == 1 {
            score = -alpha_beta::<PV_NODE>(ctx, st, pos, next_depth, -beta, -alpha, ply + 1);
        } else {
            let reduced_depth = (next_depth - r).max(ONE_PLY);
            score = -alpha_beta::<NON_PV_NODE>(ctx, st, pos, reduced_depth, -alpha - Value::new(1), -alpha, ply + 1);
            if score.raw() > alpha.raw() && r > 0 {
                score = -alpha_beta::<NON_PV_NODE>(ctx, st, pos, next_depth, -alpha - Value::new(1), -alpha, ply + 1);
            }
            if is_pv && score.raw() > alpha.raw() && score.raw() < beta.raw() {
                score = -alpha_beta::<PV_NODE>(ctx, st, pos, next_depth, -beta, -alpha, ply + 1);
            }
        }
        pos.undo_move();

        if ctx.signals.should_stop() {
            return Value::ZERO;
        }

        if is_quiet {
            quiets_tried.push(mv);
            let future_static = st.stack.at(ply + 2).static_eval;
            st.history.update_gain(mv, static_eval, future_static);
        } else {
            captures_tried.push(mv);
        }

        if score.raw() > best_score.raw() {
            best_score = score;
            if score.raw() > alpha.raw() {
                best_move = mv;
                alpha = score;
                if score.raw() >= beta.raw() {
                    st.stack.at_mut(ply).cutoff_count += 1;
                    break;
                }
            }
        }
    }

    if move_count == 0 {
        if !excluded_move.is_none() {
            return alpha;
        }
        let score = if in_check { Value::mated_in(ply) } else { Value::DRAW };
        ctx.tt.store(pos.key(), score.to_tt(ply), is_pv, Bound::Exact, depth, Move::NONE, static_eval, already_probed_mate3);
        return score;
    }

    if best_score.raw() >= beta.raw() && excluded_move.is_none() {
        let color = pos.side_to_move();
        if pos.is_quiet(best_move) {
            let prev_ctx = st.stack.peek_back(ply, 1).map(|e| (e.moved_piece, e.current_move.to()));
            let grandparent_ctx = st.stack.peek_back(ply, 2).map(|e| (e.moved_piece, e.current_move.to()));
            st.history.update_quiet_stats(
                color,
                best_move,
                prev_ctx,
                grandparent_ctx,
                &quiets_tried,
                depth / ONE_PLY,
            );
            st.stack.at_mut(ply).killers.push(best_move);
        } else {
            st.history.update_capture_stats(color, best_move, &captures_tried, depth / ONE_PLY);
        }
    }

    if excluded_move.is_none() {
        let bound = if best_score.raw() >= beta.raw() {
            Bound::Lower
        } else if is_pv && best_score.raw() > original_alpha.raw() {
            Bound::Exact
        } else {
            Bound::Upper
        };
        ctx.tt.store(
            pos.key(),
            best_score.to_tt(ply),
            is_pv,
            bound,
            depth,
            best_move,
            static_eval,
            already_probed_mate3,
        );
    }

    best_score
}

fn has_non_pawn_material(pos: &Position) -> bool {
    use crate::types::{PieceType, Square};
    let us = pos.side_to_move();
    for idx in 0..Square::NUM {
        let piece = pos.piece_on(Square::from_index(idx));
        if !piece.is_none() && piece.color() == us {
            match piece.piece_type().unpromote() {
                PieceType::Pawn | PieceType::King => {}
                _ => return true,
            }
        }
    }
    for &pt in PieceType::DROPPABLE.iter() {
        if pt != PieceType::Pawn && pos.hand_count(us, pt) > 0 {
            return true;
        }
    }
    false
}
