//! 静止探索(Quiescence Search)
//!
//! 通常探索の葉で単純に評価値を返すと、駒の取り合いの途中で止まって評価が
//! 暴れる(horizon effect)。qsearchは駒取りと王手だけを読み進め、局面が
//! 「もう取り合いが続かない」ところまで沈めてから評価する。`depth`はqsearch内部の
//! 深さで、入口は`DEPTH_QS`(0)、1段沈むごとに`ONE_PLY`ずつ減る。入口では王手も
//! 候補に数えるが、1段沈んだ後は駒取り・成りのみ、さらに深いノードでは直前の
//! 取り返しだけに絞る(`QMoveKind`参照)。
use crate::movegen::{mate_in_three, see};
use crate::position::Position;
use crate::types::{Depth, Move, PieceType, Value, DEPTH_QS, MAX_PLY, ONE_PLY};

use super::history::HistoryTables;
use super::movepicker::{QMoveKind, QMovePicker};
use super::SearchContext;

pub fn qsearch(
    ctx: &SearchContext<'_>,
    pos: &mut Position,
    history: &HistoryTables,
    depth: Depth,
    mut alpha: Value,
    beta: Value,
    ply: i32,
) -> Value {
    ctx.signals.count_node();

    if ply >= MAX_PLY as i32 {
        return if pos.in_check() { Value::ZERO } else { ctx.evaluator.evaluate(pos) };
    }

    let in_check = pos.in_check();
    let mut best = if in_check {
        -Value::INFINITE
    } else {
        let stand_pat = ctx.evaluator.evaluate(pos);
        if stand_pat.raw() >= beta.raw() {
            return stand_pat;
        }
        if stand_pat.raw() > alpha.raw() {
            alpha = stand_pat;
        }
        stand_pat
    };

    let probe = ctx.tt.probe(pos.key());
    let tt_move = if probe.found { pos.to_move(probe.data.mv).unwrap_or(Move::NONE) } else { Move::NONE };
    if probe.found {
        let tt_value = probe.data.value.from_tt(ply);
        if probe.data.bound.allows_cutoff(tt_value.raw() >= beta.raw()) {
            return tt_value;
        }
    }

    let kind = if in_check {
        QMoveKind::Evasion
    } else if depth >= DEPTH_QS {
        QMoveKind::WithChecks
    } else if depth == DEPTH_QS - ONE_PLY {
        QMoveKind::NoChecks
    } else {
        match pos.last_move() {
            Some(mv) if !mv.is_null() => QMoveKind::RecaptureOnly(mv.to()),
            _ => QMoveKind::NoChecks,
        }
    };

    let mut picker = QMovePicker::new(pos, kind, tt_move, history);
    let mut any_move = false;

    while let Some(mv) = picker.next_move() {
        any_move = true;
        // 駒取りでなければ、取り返しても得にならない手は読まない(デルタ枝刈り)
        if !in_check && pos.is_capture(mv) && see(pos, mv) < 0 {
            continue;
        }
        pos.do_move(mv);
        let score = -qsearch(ctx, pos, history, depth - ONE_PLY, -beta, -alpha, ply + 1);
        pos.undo_move();

        if ctx.signals.should_stop() {
            return Value::ZERO;
        }

        if score.raw() > best.raw() {
            best = score;
            if score.raw() > alpha.raw() {
                alpha = score;
                if score.raw() >= beta.raw() {
                    break;
                }
            }
        }
    }

    if in_check && !any_move {
        let pawn_drop_mate = pos
            .last_move()
            .map(|mv| mv.is_drop() && mv.drop_piece_type() == PieceType::Pawn)
            .unwrap_or(false);
        // 打ち歩詰めは合法手生成が弾き切れていない禁じ手なので、相手の反則負けとして扱う
        return if pawn_drop_mate { -Value::FOUL } else { Value::mated_in(ply) };
    }

    // 王手されていない静止探索の葉では、見落とした3手詰めがないか愚直に確認する
    if !in_check && mate_in_three(pos).is_some() {
        return Value::mate_in(ply + 3);
    }

    best
}
