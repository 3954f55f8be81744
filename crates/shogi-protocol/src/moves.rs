//! USI指し手表記のパース/整形
//!
//! 盤上の移動は`7g7f`（成りなら末尾に`+`)、駒打ちは`P*5e`の形式。
//! `shogi_core::Move`自体は手番や合法性を知らないので、ここでの変換は
//! 純粋に構文レベルにとどまる。疑似合法性の検証は`Position::to_move`の
//! 責任。

use anyhow::{anyhow, Result};
use shogi_core::{Move, PieceType, Square};

pub fn format_move(mv: Move) -> String {
    if mv.is_null() {
        return "pass".to_string();
    }
    if mv.is_drop() {
        return format!("{}*{}", mv.drop_piece_type().to_usi_char(), mv.to().to_usi());
    }
    let mut s = format!("{}{}", mv.from().to_usi(), mv.to().to_usi());
    if mv.is_promotion() {
        s.push('+');
    }
    s
}

pub fn parse_move(text: &str) -> Result<Move> {
    if text == "pass" {
        return Ok(Move::NULL);
    }
    let bytes: Vec<char> = text.chars().collect();
    if bytes.len() >= 3 && bytes[1] == '*' {
        let piece = PieceType::from_usi_char(bytes[0])
            .ok_or_else(|| anyhow!("invalid drop piece in move '{text}'"))?;
        if !PieceType::DROPPABLE.contains(&piece) {
            return Err(anyhow!("piece type {:?} cannot be dropped", piece));
        }
        let to = Square::from_usi(&text[2..4]).ok_or_else(|| anyhow!("invalid drop square in move '{text}'"))?;
        return Ok(Move::new_drop(piece, to));
    }

    if bytes.len() < 4 {
        return Err(anyhow!("move '{text}' is too short"));
    }
    let from = Square::from_usi(&text[0..2]).ok_or_else(|| anyhow!("invalid from-square in move '{text}'"))?;
    let to = Square::from_usi(&text[2..4]).ok_or_else(|| anyhow!("invalid to-square in move '{text}'"))?;
    let promote = bytes.get(4) == Some(&'+');
    Ok(Move::new_normal(from, to, promote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_move_round_trips() {
        let mv = parse_move("7g7f").unwrap();
        assert_eq!(format_move(mv), "7g7f");
    }

    #[test]
    fn promotion_move_round_trips() {
        let mv = parse_move("2b8h+").unwrap();
        assert!(mv.is_promotion());
        assert_eq!(format_move(mv), "2b8h+");
    }

    #[test]
    fn drop_move_round_trips() {
        let mv = parse_move("P*5e").unwrap();
        assert!(mv.is_drop());
        assert_eq!(format_move(mv), "P*5e");
    }

    #[test]
    fn king_cannot_be_dropped() {
        assert!(parse_move("K*5e").is_err());
    }

    #[test]
    fn malformed_move_is_rejected() {
        assert!(parse_move("xx").is_err());
        assert!(parse_move("").is_err());
    }

    #[test]
    fn pass_round_trips_to_the_null_move() {
        let mv = parse_move("pass").unwrap();
        assert!(mv.is_null());
        assert_eq!(format_move(mv), "pass");
    }
}
