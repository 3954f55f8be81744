//! 駒種（PieceType）と駒（Piece）

use super::Color;

/// 駒種（成り駒を含む、手番なし）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 0,
    Lance = 1,
    Knight = 2,
    Silver = 3,
    Gold = 4,
    Bishop = 5,
    Rook = 6,
    King = 7,
    ProPawn = 8,
    ProLance = 9,
    ProKnight = 10,
    ProSilver = 11,
    Horse = 12,
    Dragon = 13,
}

impl PieceType {
    pub const NUM: usize = 14;

    /// 手駒として打てる駒種（歩・香・桂・銀・金・角・飛の7種）
    pub const DROPPABLE: [PieceType; 7] = [
        PieceType::Pawn,
        PieceType::Lance,
        PieceType::Knight,
        PieceType::Silver,
        PieceType::Gold,
        PieceType::Bishop,
        PieceType::Rook,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(i: usize) -> PieceType {
        const TABLE: [PieceType; PieceType::NUM] = [
            PieceType::Pawn,
            PieceType::Lance,
            PieceType::Knight,
            PieceType::Silver,
            PieceType::Gold,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::King,
            PieceType::ProPawn,
            PieceType::ProLance,
            PieceType::ProKnight,
            PieceType::ProSilver,
            PieceType::Horse,
            PieceType::Dragon,
        ];
        TABLE[i]
    }

    /// 成れる駒かどうか
    #[inline]
    pub const fn can_promote(self) -> bool {
        matches!(
            self,
            PieceType::Pawn
                | PieceType::Lance
                | PieceType::Knight
                | PieceType::Silver
                | PieceType::Bishop
                | PieceType::Rook
        )
    }

    /// 成り後の駒種（成れない駒はそのまま返す）
    #[inline]
    pub const fn promote(self) -> Option<PieceType> {
        match self {
            PieceType::Pawn => Some(PieceType::ProPawn),
            PieceType::Lance => Some(PieceType::ProLance),
            PieceType::Knight => Some(PieceType::ProKnight),
            PieceType::Silver => Some(PieceType::ProSilver),
            PieceType::Bishop => Some(PieceType::Horse),
            PieceType::Rook => Some(PieceType::Dragon),
            _ => None,
        }
    }

    /// 生駒（手駒に戻すときの駒種）。すでに生駒ならそのまま。
    #[inline]
    pub const fn unpromote(self) -> PieceType {
        match self {
            PieceType::ProPawn => PieceType::Pawn,
            PieceType::ProLance => PieceType::Lance,
            PieceType::ProKnight => PieceType::Knight,
            PieceType::ProSilver => PieceType::Silver,
            PieceType::Horse => PieceType::Bishop,
            PieceType::Dragon => PieceType::Rook,
            other => other,
        }
    }

    #[inline]
    pub const fn is_promoted(self) -> bool {
        matches!(
            self,
            PieceType::ProPawn
                | PieceType::ProLance
                | PieceType::ProKnight
                | PieceType::ProSilver
                | PieceType::Horse
                | PieceType::Dragon
        )
    }

    /// 駒の内部評価値（歩=90を基準とする簡易マテリアル表）
    pub const fn material_value(self) -> i32 {
        match self {
            PieceType::Pawn => 90,
            PieceType::Lance => 315,
            PieceType::Knight => 345,
            PieceType::Silver => 540,
            PieceType::Gold => 600,
            PieceType::Bishop => 855,
            PieceType::Rook => 990,
            PieceType::King => 0,
            PieceType::ProPawn => 540,
            PieceType::ProLance => 540,
            PieceType::ProKnight => 540,
            PieceType::ProSilver => 540,
            PieceType::Horse => 1035,
            PieceType::Dragon => 1155,
        }
    }

    pub fn from_usi_char(c: char) -> Option<PieceType> {
        match c.to_ascii_uppercase() {
            'P' => Some(PieceType::Pawn),
            'L' => Some(PieceType::Lance),
            'N' => Some(PieceType::Knight),
            'S' => Some(PieceType::Silver),
            'G' => Some(PieceType::Gold),
            'B' => Some(PieceType::Bishop),
            'R' => Some(PieceType::Rook),
            'K' => Some(PieceType::King),
            _ => None,
        }
    }

    pub fn to_usi_char(self) -> char {
        match self.unpromote() {
            PieceType::Pawn => 'P',
            PieceType::Lance => 'L',
            PieceType::Knight => 'N',
            PieceType::Silver => 'S',
            PieceType::Gold => 'G',
            PieceType::Bishop => 'B',
            PieceType::Rook => 'R',
            PieceType::King => 'K',
            _ => unreachable!("unpromote() never yields a promoted piece type"),
        }
    }
}

/// 駒（手番 + 駒種）。`Piece::NONE` は空マス/駒なしを表す番兵値。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// 手番なし/空マスを表す番兵値
    pub const NONE: Piece = Piece(2 * PieceType::NUM as u8);
    pub const NUM: usize = 2 * PieceType::NUM + 1;

    #[inline]
    pub const fn new(color: Color, piece_type: PieceType) -> Piece {
        Piece(color.index() as u8 * PieceType::NUM as u8 + piece_type.index() as u8)
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    #[inline]
    pub const fn color(self) -> Color {
        debug_assert!(!self.is_none());
        if (self.0 as usize) < PieceType::NUM {
            Color::Black
        } else {
            Color::White
        }
    }

    #[inline]
    pub const fn piece_type(self) -> PieceType {
        debug_assert!(!self.is_none());
        PieceType::from_index(self.0 as usize % PieceType::NUM)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn promote(self) -> Option<Piece> {
        if self.is_none() {
            return None;
        }
        self.piece_type().promote().map(|pt| Piece::new(self.color(), pt))
    }

    #[inline]
    pub fn unpromote(self) -> Piece {
        if self.is_none() {
            return self;
        }
        Piece::new(self.color(), self.piece_type().unpromote())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_roundtrips_color_and_type() {
        let p = Piece::new(Color::White, PieceType::Bishop);
        assert_eq!(p.color(), Color::White);
        assert_eq!(p.piece_type(), PieceType::Bishop);
    }

    #[test]
    fn promote_unpromote_roundtrip() {
        let p = Piece::new(Color::Black, PieceType::Rook);
        let promoted = p.promote().unwrap();
        assert_eq!(promoted.piece_type(), PieceType::Dragon);
        assert_eq!(promoted.unpromote().piece_type(), PieceType::Rook);
    }

    #[test]
    fn king_and_gold_do_not_promote() {
        assert!(PieceType::King.promote().is_none());
        assert!(PieceType::Gold.promote().is_none());
    }

    #[test]
    fn none_is_distinct_from_every_real_piece() {
        for color in [Color::Black, Color::White] {
            for i in 0..PieceType::NUM {
                let p = Piece::new(color, PieceType::from_index(i));
                assert_ne!(p, Piece::NONE);
            }
        }
    }
}
