//! Zobristハッシュテーブル
//!
//! 盤上の駒・手駒の枚数・手番をXORで合成して局面フィンガープリントを作る。
//! 乱数は固定シードで生成するため、同一プロセス内では常に同じ値を返す
//! （プロセスをまたいだキーの一致は保証しない）。

use std::sync::LazyLock;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::types::{Color, Piece, PieceType, Square};

/// 手駒の最大想定枚数（歩が最大18枚になりうる）+1
const MAX_HAND_COUNT: usize = 19;

struct ZobristTables {
    /// [piece.index()][square.index()]
    psq: [[u64; Square::NUM]; Piece::NUM],
    /// [color][droppable_index][count]
    hand: [[[u64; MAX_HAND_COUNT]; 7]; Color::NUM],
    side: u64,
}

static ZOBRIST: LazyLock<ZobristTables> = LazyLock::new(|| {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5347_4F47_49_5348);
    let mut psq = [[0u64; Square::NUM]; Piece::NUM];
    for row in psq.iter_mut() {
        for v in row.iter_mut() {
            *v = rng.next_u64();
        }
    }
    let mut hand = [[[0u64; MAX_HAND_COUNT]; 7]; Color::NUM];
    for color_table in hand.iter_mut() {
        for kind_table in color_table.iter_mut() {
            for v in kind_table.iter_mut() {
                *v = rng.next_u64();
            }
        }
    }
    ZobristTables { psq, hand, side: rng.next_u64() }
});

#[inline]
pub fn zobrist_psq(piece: Piece, sq: Square) -> u64 {
    ZOBRIST.psq[piece.index()][sq.index()]
}

#[inline]
pub fn zobrist_hand(color: Color, piece_type: PieceType, count: u8) -> u64 {
    let idx = PieceType::DROPPABLE
        .iter()
        .position(|&pt| pt == piece_type)
        .expect("only droppable piece types are kept in hand");
    let count = (count as usize).min(MAX_HAND_COUNT - 1);
    ZOBRIST.hand[color.index()][idx][count]
}

#[inline]
pub fn zobrist_side() -> u64 {
    ZOBRIST.side
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psq_values_are_deterministic_across_calls() {
        let sq = Square::new(3, 3);
        let piece = Piece::new(Color::Black, PieceType::Gold);
        assert_eq!(zobrist_psq(piece, sq), zobrist_psq(piece, sq));
    }

    #[test]
    fn distinct_squares_get_distinct_keys_with_overwhelming_probability() {
        let piece = Piece::new(Color::White, PieceType::Pawn);
        let a = zobrist_psq(piece, Square::new(0, 0));
        let b = zobrist_psq(piece, Square::new(0, 1));
        assert_ne!(a, b);
    }
}
