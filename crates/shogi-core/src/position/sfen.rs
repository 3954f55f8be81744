//! SFEN（局面文字列表現）の読み書き
//!
//! `sfen board side_to_move hand move_number` の4フィールド形式。
//! 盤面は9段×9筋をスラッシュ区切りで1段ずつ、a段(1段目)からi段(9段目)の順に並べる。

use std::fmt;

use thiserror::Error;

use super::pos::Position;
use crate::types::{Color, Piece, PieceType, Square};

pub const SFEN_HIRATE: &str =
    "lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SfenError {
    #[error("sfen string is missing a field: {0}")]
    MissingField(&'static str),
    #[error("unexpected character '{0}' in board field")]
    BadBoardChar(char),
    #[error("board field describes {0} squares, expected 81")]
    WrongSquareCount(usize),
    #[error("invalid side-to-move field: {0}")]
    BadSideToMove(String),
    #[error("invalid hand field character '{0}'")]
    BadHandChar(char),
    #[error("invalid move number field: {0}")]
    BadMoveNumber(String),
}

impl Position {
    pub fn set_hirate(&mut self) {
        self.set_sfen(SFEN_HIRATE).expect("SFEN_HIRATE must be well-formed");
    }

    pub fn set_sfen(&mut self, sfen: &str) -> Result<(), SfenError> {
        let mut fields = sfen.split_whitespace();
        let board_field = fields.next().ok_or(SfenError::MissingField("board"))?;
        let side_field = fields.next().ok_or(SfenError::MissingField("side to move"))?;
        let hand_field = fields.next().ok_or(SfenError::MissingField("hand"))?;
        let move_field = fields.next().unwrap_or("1");

        let mut board = [Piece::NONE; Square::NUM];
        let mut rank = 0usize;
        let mut file = 0usize;
        let mut squares_seen = 0usize;
        let mut chars = board_field.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '/' => {
                    rank += 1;
                    file = 0;
                }
                '1'..='9' => {
                    file += c.to_digit(10).unwrap() as usize;
                }
                '+' => {
                    let base = chars.next().ok_or(SfenError::BadBoardChar('+'))?;
                    let (color, pt) = piece_from_usi_char(base)?;
                    let promoted = pt.promote().ok_or(SfenError::BadBoardChar(base))?;
                    place(&mut board, file, rank, color, promoted)?;
                    squares_seen += 1;
                    file += 1;
                }
                c => {
                    let (color, pt) = piece_from_usi_char(c)?;
                    place(&mut board, file, rank, color, pt)?;
                    squares_seen += 1;
                    file += 1;
                }
            }
        }
        if squares_seen + count_empty(board_field) != 81 {
            return Err(SfenError::WrongSquareCount(squares_seen));
        }

        let side_to_move = match side_field {
            "b" => Color::Black,
            "w" => Color::White,
            other => return Err(SfenError::BadSideToMove(other.to_string())),
        };

        let mut hands = [[0u8; 7]; Color::NUM];
        if hand_field != "-" {
            let mut count = 0u32;
            for c in hand_field.chars() {
                if let Some(d) = c.to_digit(10) {
                    count = count * 10 + d;
                    continue;
                }
                let (color, pt) = piece_from_usi_char(c)?;
                let idx = PieceType::DROPPABLE
                    .iter()
                    .position(|&dp| dp == pt)
                    .ok_or(SfenError::BadHandChar(c))?;
                hands[color.index()][idx] = if count == 0 { 1 } else { count as u8 };
                count = 0;
            }
        }

        let ply: u32 = move_field
            .parse::<u32>()
            .map_err(|_| SfenError::BadMoveNumber(move_field.to_string()))?
            .saturating_sub(1);

        self.load_raw(board, hands, side_to_move, ply);
        Ok(())
    }

    pub fn to_sfen(&self) -> String {
        let mut s = String::new();
        for rank in 0..9 {
            let mut empty_run = 0u32;
            for file in 0..9 {
                let sq = Square::new(file, rank);
                let piece = self.piece_on(sq);
                if piece.is_none() {
                    empty_run += 1;
                    continue;
                }
                if empty_run > 0 {
                    s.push_str(&empty_run.to_string());
                    empty_run = 0;
                }
                let pt = piece.piece_type();
                if pt.is_promoted() {
                    s.push('+');
                }
                let base = pt.to_usi_char();
                s.push(match piece.color() {
                    Color::Black => base.to_ascii_uppercase(),
                    Color::White => base.to_ascii_lowercase(),
                });
            }
            if empty_run > 0 {
                s.push_str(&empty_run.to_string());
            }
            if rank != 8 {
                s.push('/');
            }
        }
        s.push(' ');
        s.push(match self.side_to_move() {
            Color::Black => 'b',
            Color::White => 'w',
        });
        s.push(' ');
        let mut any_hand = false;
        for color in [Color::Black, Color::White] {
            for &pt in PieceType::DROPPABLE.iter().rev() {
                let n = self.hand_count(color, pt);
                if n == 0 {
                    continue;
                }
                any_hand = true;
                if n > 1 {
                    s.push_str(&n.to_string());
                }
                let base = pt.to_usi_char();
                s.push(match color {
                    Color::Black => base.to_ascii_uppercase(),
                    Color::White => base.to_ascii_lowercase(),
                });
            }
        }
        if !any_hand {
            s.push('-');
        }
        s.push(' ');
        s.push_str(&(self.game_ply() + 1).to_string());
        s
    }
}

fn count_empty(board_field: &str) -> usize {
    board_field.chars().filter_map(|c| c.to_digit(10)).sum::<u32>() as usize
}

fn place(
    board: &mut [Piece; Square::NUM],
    file: usize,
    rank: usize,
    color: Color,
    pt: PieceType,
) -> Result<(), SfenError> {
    if file >= 9 || rank >= 9 {
        return Err(SfenError::WrongSquareCount(file + rank * 9));
    }
    board[Square::new(file as i32, rank as i32).index()] = Piece::new(color, pt);
    Ok(())
}

fn piece_from_usi_char(c: char) -> Result<(Color, PieceType), SfenError> {
    let color = if c.is_ascii_uppercase() { Color::Black } else { Color::White };
    let pt = PieceType::from_usi_char(c.to_ascii_uppercase()).ok_or(SfenError::BadBoardChar(c))?;
    Ok((color, pt))
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sfen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hirate_round_trips_through_sfen() {
        let mut pos = Position::new();
        assert_eq!(pos.to_sfen(), SFEN_HIRATE);
        pos.set_sfen(&pos.to_sfen().clone()).unwrap();
        assert_eq!(pos.to_sfen(), SFEN_HIRATE);
    }

    #[test]
    fn hand_field_parses_counts_and_kinds() {
        let mut pos = Position::new();
        pos.set_sfen("9/9/9/9/9/9/9/9/9 b 2P3R 1").unwrap();
        assert_eq!(pos.hand_count(Color::Black, PieceType::Pawn), 2);
        assert_eq!(pos.hand_count(Color::Black, PieceType::Rook), 3);
    }

    #[test]
    fn malformed_side_field_is_rejected() {
        let mut pos = Position::new();
        let err = pos.set_sfen("9/9/9/9/9/9/9/9/9 x - 1").unwrap_err();
        assert_eq!(err, SfenError::BadSideToMove("x".to_string()));
    }
}
