//! Static Exchange Evaluation (SEE)
//!
//! 1マスを巡る取り合いを、安い駒から順に成約していくものと仮定して評価する。
//! 本実装は盤を実際には動かさず、両陣営の「再利きしうる駒の価値」を
//! 安い順に取り出すシミュレーションで済ませる簡易版。

use crate::position::Position;
use crate::types::{Color, Move, PieceType, Square};

use super::attacks::generate_attacks;

fn piece_value(piece_type: PieceType) -> i32 {
    piece_type.material_value()
}

/// `to`に利いている`color`側の駒のうち、最も価値が低いものの(価値, 駒種, 元のマス)を返す。
fn least_valuable_attacker(
    pos: &Position,
    occupied_except: &[Square],
    to: Square,
    color: Color,
) -> Option<(i32, PieceType, Square)> {
    let mut best: Option<(i32, PieceType, Square)> = None;
    for idx in 0..crate::types::Square::NUM {
        let from = Square::from_index(idx);
        if occupied_except.contains(&from) {
            continue;
        }
        let piece = pos.piece_on(from);
        if piece.is_none() || piece.color() != color {
            continue;
        }
        let mut reaches = false;
        generate_attacks(pos, color, piece.piece_type(), from, |sq| {
            if sq == to {
                reaches = true;
            }
        });
        if !reaches {
            continue;
        }
        let value = piece_value(piece.piece_type());
        if best.map(|(v, _, _)| value < v).unwrap_or(true) {
            best = Some((value, piece.piece_type(), from));
        }
    }
    best
}

/// `mv`(手番側が`to`で駒を取る手)を起点に、一連の取り合いを手番側視点の損得で返す。
/// 正の値ほど手番側が得をする。盤面は読み取り専用で変更しない。
pub fn see(pos: &Position, mv: Move) -> i32 {
    let to = mv.to();
    let us = pos.side_to_move();
    let mut gain = [0i32; 32];
    let mut depth = 0usize;

    let mut occupied_except: Vec<Square> = Vec::with_capacity(8);
    let moving_piece = pos.moved_piece(mv);
    let mut next_value = piece_value(moving_piece.piece_type());

    gain[0] = if mv.is_drop() { 0 } else { piece_value(pos.captured_piece(mv).piece_type()) };
    if !mv.is_drop() {
        occupied_except.push(mv.from());
    }

    let mut side = !us;
    loop {
        depth += 1;
        gain[depth] = next_value - gain[depth - 1];
        if gain[depth].max(-gain[depth - 1]) < 0 && depth > 1 {
            // これ以上取り返しても損にしかならないなら打ち切る(枝刈り)
            break;
        }
        match least_valuable_attacker(pos, &occupied_except, to, side) {
            Some((value, _piece_type, from)) => {
                next_value = value;
                occupied_except.push(from);
                side = !side;
                if depth + 1 >= gain.len() {
                    break;
                }
            }
            None => break,
        }
    }

    while depth > 0 {
        gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
        depth -= 1;
    }
    gain[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn undefended_capture_is_pure_gain() {
        let mut pos = Position::new();
        pos.set_sfen("9/9/9/9/3rR4/9/9/9/9 b - 1").unwrap();
        let mv = Move::new_normal(Square::new(4, 4), Square::new(3, 4), false);
        assert!(see(&pos, mv) > 0);
    }

    #[test]
    fn defended_capture_with_bigger_piece_is_a_loss() {
        let mut pos = Position::new();
        // 角で歩を取るが、歩のすぐ後ろに歩が利いていて取り返される
        pos.set_sfen("9/9/9/9/2pB5/3p5/9/9/9 b - 1").unwrap();
        let mv = Move::new_normal(Square::new(3, 4), Square::new(2, 4), false);
        assert!(see(&pos, mv) < 0);
    }
}
