//! 局面表現
//!
//! 盤面配列・手駒・手番・Zobristキーを保持し、`do_move` / `undo_move` で
//! 手の実行・巻き戻しを行う。盤面配列と手駒・Zobristキーは常に整合するように
//! `Position`のメソッドを通じてのみ更新する。

use super::zobrist::{zobrist_hand, zobrist_psq, zobrist_side};
use crate::types::{Color, Move, Piece, PieceType, Square};

/// Singular Extensionの除外プローブを通常探索と別キャッシュするためのXOR定数
const EXCLUSION_KEY_XOR: u64 = 0x9E37_79B9_7F4A_7C15;
/// Null Moveの一手パス探索を別キャッシュするためのXOR定数(手番ごとに異なる値)
const NULL_KEY_XOR: [u64; Color::NUM] = [0xC2B2_AE3D_27D4_EB4F, 0x1656_67B1_9E37_79F9];

#[derive(Debug, Clone, Copy)]
struct UndoInfo {
    mv: Move,
    captured: Piece,
    prev_key: u64,
    is_null: bool,
}

#[derive(Debug, Clone)]
pub struct Position {
    board: [Piece; Square::NUM],
    hands: [[u8; 7]; Color::NUM],
    side_to_move: Color,
    /// ゲーム開始からの手数(1手=1手番の指し手)
    ply: u32,
    key: u64,
    king_square: [Square; Color::NUM],
    history: Vec<UndoInfo>,
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    pub fn new() -> Position {
        let mut pos = Position {
            board: [Piece::NONE; Square::NUM],
            hands: [[0; 7]; Color::NUM],
            side_to_move: Color::Black,
            ply: 0,
            key: 0,
            king_square: [Square::new(4, 8), Square::new(4, 0)],
            history: Vec::new(),
        };
        pos.set_hirate();
        pos
    }

    // -------------------------------------------------------------------
    // 参照アクセサ
    // -------------------------------------------------------------------

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn piece_on(&self, sq: Square) -> Piece {
        self.board[sq.index()]
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.king_square[color.index()]
    }

    #[inline]
    pub fn hand_count(&self, color: Color, piece_type: PieceType) -> u8 {
        let idx = Self::droppable_index(piece_type);
        self.hands[color.index()][idx]
    }

    #[inline]
    pub fn game_ply(&self) -> u32 {
        self.ply
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Singular Extension検証用の除外キー
    #[inline]
    pub fn exclusion_key(&self) -> u64 {
        self.key ^ EXCLUSION_KEY_XOR
    }

    /// Null Move探索用のキー
    #[inline]
    pub fn null_move_key(&self) -> u64 {
        self.key ^ NULL_KEY_XOR[self.side_to_move.index()]
    }

    #[inline]
    fn droppable_index(piece_type: PieceType) -> usize {
        PieceType::DROPPABLE
            .iter()
            .position(|&pt| pt == piece_type)
            .expect("only droppable piece types are kept in hand")
    }

    // -------------------------------------------------------------------
    // 手の実行・巻き戻し
    // -------------------------------------------------------------------

    fn put_piece(&mut self, sq: Square, piece: Piece) {
        debug_assert!(self.board[sq.index()].is_none());
        self.board[sq.index()] = piece;
        self.key ^= zobrist_psq(piece, sq);
        if piece.piece_type() == PieceType::King {
            self.king_square[piece.color().index()] = sq;
        }
    }

    fn remove_piece(&mut self, sq: Square) -> Piece {
        let piece = self.board[sq.index()];
        debug_assert!(!piece.is_none());
        self.board[sq.index()] = Piece::NONE;
        self.key ^= zobrist_psq(piece, sq);
        piece
    }

    fn add_to_hand(&mut self, color: Color, piece_type: PieceType) {
        let idx = Self::droppable_index(piece_type);
        let count = &mut self.hands[color.index()][idx];
        self.key ^= zobrist_hand(color, piece_type, *count);
        *count += 1;
        self.key ^= zobrist_hand(color, piece_type, *count);
    }

    fn remove_from_hand(&mut self, color: Color, piece_type: PieceType) {
        let idx = Self::droppable_index(piece_type);
        let count = &mut self.hands[color.index()][idx];
        debug_assert!(*count > 0);
        self.key ^= zobrist_hand(color, piece_type, *count);
        *count -= 1;
        self.key ^= zobrist_hand(color, piece_type, *count);
    }

    /// 手を指す。呼び出し側は疑似合法であることを保証すること。
    pub fn do_move(&mut self, mv: Move) {
        let us = self.side_to_move;
        let prev_key = self.key;

        let captured = if mv.is_drop() {
            let pt = mv.drop_piece_type();
            self.remove_from_hand(us, pt);
            self.put_piece(mv.to(), Piece::new(us, pt));
            Piece::NONE
        } else {
            let moving = self.remove_piece(mv.from());
            let captured = if !self.board[mv.to().index()].is_none() {
                let cap = self.remove_piece(mv.to());
                self.add_to_hand(us, cap.piece_type().unpromote());
                cap
            } else {
                Piece::NONE
            };
            let final_piece = if mv.is_promotion() {
                moving.promote().expect("promotion move must target a promotable piece")
            } else {
                moving
            };
            self.put_piece(mv.to(), final_piece);
            captured
        };

        self.history.push(UndoInfo { mv, captured, prev_key, is_null: false });
        self.side_to_move = !us;
        self.key ^= zobrist_side();
        self.ply += 1;
    }

    pub fn undo_move(&mut self) {
        let undo = self.history.pop().expect("undo_move called with empty history");
        self.ply -= 1;
        self.side_to_move = !self.side_to_move;
        let us = self.side_to_move;
        let mv = undo.mv;

        if mv.is_drop() {
            let piece = self.remove_piece(mv.to());
            self.add_to_hand(us, piece.piece_type());
        } else {
            let moved = self.remove_piece(mv.to());
            let original = if mv.is_promotion() { moved.unpromote() } else { moved };
            self.put_piece(mv.from(), original);
            if !undo.captured.is_none() {
                self.remove_from_hand(us, undo.captured.piece_type().unpromote());
                self.put_piece(mv.to(), undo.captured);
            }
        }
        self.key = undo.prev_key;
    }

    /// パス（null move）。手番だけを反転する。
    pub fn do_null_move(&mut self) {
        let prev_key = self.key;
        self.history.push(UndoInfo { mv: Move::NULL, captured: Piece::NONE, prev_key, is_null: true });
        self.side_to_move = !self.side_to_move;
        self.key ^= zobrist_side();
        self.ply += 1;
    }

    pub fn undo_null_move(&mut self) {
        let undo = self.history.pop().expect("undo_null_move called with empty history");
        debug_assert!(undo.is_null);
        self.ply -= 1;
        self.side_to_move = !self.side_to_move;
        self.key = undo.prev_key;
    }

    /// 直近の手がnull moveかどうか（`ss-1`を覗く用途）
    pub fn last_move_was_null(&self) -> bool {
        self.history.last().map(|u| u.is_null).unwrap_or(false)
    }

    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|u| u.mv)
    }

    // -------------------------------------------------------------------
    // 指し手に対する問い合わせ
    // -------------------------------------------------------------------

    pub fn moved_piece(&self, mv: Move) -> Piece {
        if mv.is_drop() {
            Piece::new(self.side_to_move, mv.drop_piece_type())
        } else {
            self.piece_on(mv.from())
        }
    }

    pub fn captured_piece(&self, mv: Move) -> Piece {
        if mv.is_drop() {
            Piece::NONE
        } else {
            self.piece_on(mv.to())
        }
    }

    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        !self.captured_piece(mv).is_none()
    }

    /// 駒取りでも成りでもない手（オーダリング上の"quiet"手）
    #[inline]
    pub fn is_quiet(&self, mv: Move) -> bool {
        !self.is_capture(mv) && !mv.is_promotion()
    }

    /// 置換表から読んだ指し手が、現在局面に対して疑似合法かどうかを検証する。
    /// torn read(並行書き込み中の破損読み取り)対策として、使用前に必ず呼ぶこと。
    pub fn to_move(&self, mv: Move) -> Option<Move> {
        if mv.is_none() || mv.is_null() {
            return None;
        }
        if crate::movegen::is_pseudo_legal(self, mv) {
            Some(mv)
        } else {
            None
        }
    }

    /// 手番側の玉が王手されているか
    #[inline]
    pub fn in_check(&self) -> bool {
        self.is_attacked(self.king_square(self.side_to_move), !self.side_to_move)
    }

    /// `sq`に`by_color`の駒の利きがあるか
    #[inline]
    pub fn is_attacked(&self, sq: Square, by_color: Color) -> bool {
        crate::movegen::attacks::is_attacked(self, sq, by_color)
    }

    /// `mv`を指した結果、相手玉に王手がかかるか（簡易判定・空き王手は扱わない）
    pub fn gives_check(&self, mv: Move) -> bool {
        let us = self.side_to_move;
        let them = !us;
        let moved = self.moved_piece(mv);
        let piece_type = if mv.is_promotion() {
            moved.piece_type().promote().unwrap_or(moved.piece_type())
        } else {
            moved.piece_type()
        };
        let their_king = self.king_square(them);
        let mut attacks_king = false;
        crate::movegen::attacks::generate_attacks(self, us, piece_type, mv.to(), |to| {
            if to == their_king {
                attacks_king = true;
            }
        });
        attacks_king
    }

    /// 歩のヒストリ参照用インデックス。歩の配置だけから求める簡易ハッシュ。
    pub fn pawn_history_index(&self) -> usize {
        let mut h: u64 = 0;
        for color in [Color::Black, Color::White] {
            for pt in [PieceType::Pawn, PieceType::ProPawn] {
                let piece = Piece::new(color, pt);
                for file in 0..9 {
                    for rank in 0..9 {
                        let sq = Square::new(file, rank);
                        if self.piece_on(sq) == piece {
                            h ^= zobrist_psq(piece, sq);
                        }
                    }
                }
            }
        }
        (h as usize) % super::super::search::history::PAWN_HISTORY_SIZE
    }

    /// SFENパース結果から盤面全体を作り直す。キーも最初から積み直す。
    pub(super) fn load_raw(
        &mut self,
        board: [Piece; Square::NUM],
        hands: [[u8; 7]; Color::NUM],
        side_to_move: Color,
        ply: u32,
    ) {
        self.board = [Piece::NONE; Square::NUM];
        self.hands = [[0; 7]; Color::NUM];
        self.key = 0;
        self.history.clear();
        self.ply = ply;
        self.side_to_move = Color::Black;

        for sq_idx in 0..Square::NUM {
            let piece = board[sq_idx];
            if !piece.is_none() {
                self.put_piece(Square::from_index(sq_idx), piece);
            }
        }
        for color in [Color::Black, Color::White] {
            for &pt in PieceType::DROPPABLE.iter() {
                let idx = Self::droppable_index(pt);
                let count = hands[color.index()][idx];
                for _ in 0..count {
                    self.add_to_hand(color, pt);
                }
            }
        }
        if side_to_move == Color::White {
            self.side_to_move = Color::White;
            self.key ^= zobrist_side();
        }
    }

    pub(crate) fn king_square_mut_for_test(&mut self, color: Color, sq: Square) {
        self.board[self.king_square[color.index()].index()] = Piece::NONE;
        self.board[sq.index()] = Piece::new(color, PieceType::King);
        self.king_square[color.index()] = sq;
    }
}
