//! 疑似合法手生成と合法手フィルタ
//!
//! 生成は盤上の移動と持ち駒の打ち込みの2系統。自玉の安全確認は行わない
//! （`legal_moves`が実際に指して王手がかかるかどうかでふるい落とす）。

use super::attacks::generate_attacks;
use crate::position::Position;
use crate::types::{Color, Move, PieceType, Square};

/// 先手から見た昇格ゾーン(0,1,2段目)。後手は`8-rank`で同じ判定を使う。
fn in_promotion_zone(color: Color, rank: i32) -> bool {
    match color {
        Color::Black => rank <= 2,
        Color::White => rank >= 6,
    }
}

/// そのマスに着地すると、以後一度も動けなくなる駒かどうか（不成を禁じる側の判定）
fn must_promote(piece_type: PieceType, color: Color, to_rank: i32) -> bool {
    let last_rank = match color {
        Color::Black => 0,
        Color::White => 8,
    };
    let second_last = match color {
        Color::Black => 1,
        Color::White => 7,
    };
    match piece_type {
        PieceType::Pawn | PieceType::Lance => to_rank == last_rank,
        PieceType::Knight => to_rank == last_rank || to_rank == second_last,
        _ => false,
    }
}

pub fn pseudo_legal_moves(pos: &Position) -> Vec<Move> {
    let mut moves = Vec::with_capacity(96);
    let us = pos.side_to_move();
    generate_board_moves(pos, us, &mut moves);
    generate_drops(pos, us, &mut moves);
    moves
}

fn generate_board_moves(pos: &Position, us: Color, out: &mut Vec<Move>) {
    for idx in 0..Square::NUM {
        let from = Square::from_index(idx);
        let piece = pos.piece_on(from);
        if piece.is_none() || piece.color() != us {
            continue;
        }
        let piece_type = piece.piece_type();
        let mut candidates = Vec::with_capacity(8);
        generate_attacks(pos, us, piece_type, from, |to| candidates.push(to));
        for to in candidates {
            let occupant = pos.piece_on(to);
            if !occupant.is_none() && occupant.color() == us {
                continue;
            }
            let from_in_zone = in_promotion_zone(us, from.rank());
            let to_in_zone = in_promotion_zone(us, to.rank());
            let can_promote = piece_type.can_promote() && (from_in_zone || to_in_zone);
            let forced = can_promote && must_promote(piece_type, us, to.rank());
            if can_promote {
                out.push(Move::new_normal(from, to, true));
            }
            if !forced {
                out.push(Move::new_normal(from, to, false));
            }
        }
    }
}

fn generate_drops(pos: &Position, us: Color, out: &mut Vec<Move>) {
    for &piece_type in PieceType::DROPPABLE.iter() {
        if pos.hand_count(us, piece_type) == 0 {
            continue;
        }
        for idx in 0..Square::NUM {
            let to = Square::from_index(idx);
            if !pos.piece_on(to).is_none() {
                continue;
            }
            if !drop_square_is_legal(pos, us, piece_type, to) {
                continue;
            }
            out.push(Move::new_drop(piece_type, to));
        }
    }
}

fn drop_square_is_legal(pos: &Position, us: Color, piece_type: PieceType, to: Square) -> bool {
    if must_promote(piece_type, us, to.rank()) {
        // 歩・香の最終段、桂の最終2段には打てない(打ってもその後動けないため)
        return false;
    }
    if piece_type == PieceType::Pawn {
        // 二歩: 同じ筋に自分の不成の歩がすでにいてはいけない
        for rank in 0..9 {
            let sq = Square::new(to.file(), rank);
            let p = pos.piece_on(sq);
            if !p.is_none() && p.color() == us && p.piece_type() == PieceType::Pawn {
                return false;
            }
        }
        if would_be_drop_pawn_mate(pos, us, to) {
            return false;
        }
    }
    true
}

/// 打ち歩詰め判定: この歩打ちが相手にとって詰みになるなら禁じ手
fn would_be_drop_pawn_mate(pos: &Position, us: Color, to: Square) -> bool {
    let them = !us;
    let their_king = pos.king_square(them);
    if to.file() != their_king.file() || (to.rank() - their_king.rank()).abs() != 1 {
        return false;
    }
    // 先手の歩は相手玉より一段"奥"(段が小さい方)から王手する
    let attacks_correctly = match us {
        Color::Black => to.rank() + 1 == their_king.rank(),
        Color::White => to.rank() - 1 == their_king.rank(),
    };
    if !attacks_correctly {
        return false;
    }
    let mut sim = pos.clone();
    sim.do_move(Move::new_drop(PieceType::Pawn, to));
    debug_assert_eq!(sim.side_to_move(), them);
    sim.in_check() && legal_moves(&mut sim).is_empty()
}

/// `mv`が現在局面に対して疑似合法かどうか（置換表の手の健全性検証用）
pub fn is_pseudo_legal(pos: &Position, mv: Move) -> bool {
    let us = pos.side_to_move();
    if mv.is_drop() {
        let pt = mv.drop_piece_type();
        if pos.hand_count(us, pt) == 0 || !pos.piece_on(mv.to()).is_none() {
            return false;
        }
        drop_square_is_legal(pos, us, pt, mv.to())
    } else {
        let piece = pos.piece_on(mv.from());
        if piece.is_none() || piece.color() != us {
            return false;
        }
        let target = pos.piece_on(mv.to());
        if !target.is_none() && target.color() == us {
            return false;
        }
        let mut reachable = false;
        generate_attacks(pos, us, piece.piece_type(), mv.from(), |to| {
            if to == mv.to() {
                reachable = true;
            }
        });
        if !reachable {
            return false;
        }
        if mv.is_promotion() && !piece.piece_type().can_promote() {
            return false;
        }
        let from_in_zone = in_promotion_zone(us, mv.from().rank());
        let to_in_zone = in_promotion_zone(us, mv.to().rank());
        if mv.is_promotion() && !(from_in_zone || to_in_zone) {
            return false;
        }
        if !mv.is_promotion() && must_promote(piece.piece_type(), us, mv.to().rank()) {
            return false;
        }
        true
    }
}

/// 自玉に王手がかかる手を除いた合法手のリスト
pub fn legal_moves(pos: &mut Position) -> Vec<Move> {
    let mover = pos.side_to_move();
    let mut out = Vec::with_capacity(64);
    for mv in pseudo_legal_moves(pos) {
        pos.do_move(mv);
        if !pos.is_attacked(pos.king_square(mover), !mover) {
            out.push(mv);
        }
        pos.undo_move();
    }
    out
}
