//! 指し手（Move）
//!
//! 16bitに詰め込んだコンパクトな表現。盤上の移動と駒打ちの両方を表せる。
//!
//! ```text
//! bit  0- 6: 移動先 (Square, 0..81)
//! bit  7-13: 移動元 (Square, 0..81)。駒打ちのときは打つ駒種のインデックス(0..7)
//! bit     14: 成りフラグ
//! bit     15: 駒打ちフラグ
//! ```
//!
//! `Move`自身は移動元/移動先/成り/駒打ちのみを保持する。移動した駒や取った駒は
//! 局面依存の情報なので、`Position::moved_piece` / `Position::captured_piece` から
//! 引く。置換表から読んだ`Move`は、使用前に必ず`Position::to_move`で現在局面に
//! 対して疑似合法かどうかを検証すること（torn readを想定した安全策）。

use super::{PieceType, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

const TO_MASK: u16 = 0x7F;
const FROM_SHIFT: u16 = 7;
const FROM_MASK: u16 = 0x7F << FROM_SHIFT;
const PROMOTE_BIT: u16 = 1 << 14;
const DROP_BIT: u16 = 1 << 15;
/// 駒打ちフラグが立っているときに移動元フィールドに入りうる最大値(0..7)を超える番兵
const NULL_DROP_INDEX: u16 = 0x7F;

impl Move {
    /// 無効な指し手を表す番兵値
    pub const NONE: Move = Move(0);

    /// パス（null move）。合法手生成からは絶対に出てこない符号を予約して表現する。
    pub const NULL: Move = Move(DROP_BIT | (NULL_DROP_INDEX << FROM_SHIFT));

    #[inline]
    pub fn new_normal(from: Square, to: Square, promote: bool) -> Move {
        let mut bits = (to.index() as u16 & TO_MASK) | ((from.index() as u16) << FROM_SHIFT);
        if promote {
            bits |= PROMOTE_BIT;
        }
        Move(bits)
    }

    #[inline]
    pub fn new_drop(piece_type: PieceType, to: Square) -> Move {
        let drop_idx = PieceType::DROPPABLE
            .iter()
            .position(|&pt| pt == piece_type)
            .expect("drop piece must be one of the seven droppable piece types") as u16;
        Move(DROP_BIT | (to.index() as u16 & TO_MASK) | (drop_idx << FROM_SHIFT))
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[inline]
    pub const fn is_drop(self) -> bool {
        self.0 & DROP_BIT != 0 && self.0 != Self::NULL.0
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.0 & PROMOTE_BIT != 0
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::from_index((self.0 & TO_MASK) as usize)
    }

    /// 移動元。駒打ちの場合は呼び出さないこと（`drop_piece_type`を使う）。
    #[inline]
    pub const fn from(self) -> Square {
        debug_assert!(!self.is_drop());
        Square::from_index(((self.0 & FROM_MASK) >> FROM_SHIFT) as usize)
    }

    /// 駒打ちの場合の打つ駒種
    #[inline]
    pub fn drop_piece_type(self) -> PieceType {
        debug_assert!(self.is_drop());
        let idx = ((self.0 & FROM_MASK) >> FROM_SHIFT) as usize;
        PieceType::DROPPABLE[idx]
    }

    /// 16bit生値
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// 置換表などから読み戻した16bit生値を`Move`に戻す。健全性は呼び出し側の責任。
    #[inline]
    pub const fn from_raw(raw: u16) -> Move {
        Move(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    #[test]
    fn normal_move_round_trips_fields() {
        let from = Square::new(2, 6);
        let to = Square::new(2, 5);
        let mv = Move::new_normal(from, to, true);
        assert_eq!(mv.from(), from);
        assert_eq!(mv.to(), to);
        assert!(mv.is_promotion());
        assert!(!mv.is_drop());
    }

    #[test]
    fn drop_move_round_trips_piece_type() {
        let to = Square::new(4, 4);
        let mv = Move::new_drop(PieceType::Silver, to);
        assert!(mv.is_drop());
        assert_eq!(mv.drop_piece_type(), PieceType::Silver);
        assert_eq!(mv.to(), to);
    }

    #[test]
    fn none_and_null_are_distinct_sentinels() {
        assert!(Move::NONE.is_none());
        assert!(!Move::NULL.is_none());
        assert!(Move::NULL.is_null());
        assert!(!Move::NULL.is_drop());
        assert_ne!(Move::NONE, Move::NULL);
    }

    #[test]
    fn color_is_irrelevant_to_move_encoding() {
        // Moveそのものは手番を持たない(Positionが文脈を与える)。
        let _ = Color::Black;
        let mv = Move::new_normal(Square::new(0, 0), Square::new(0, 1), false);
        assert_eq!(mv.to(), Square::new(0, 1));
    }
}
