//! 詰み判定・短手数詰め探索
//!
//! 探索本体のNon-goalに挙げた評価関数同様、詰将棋ソルバーも本実装のスコープ外だが
//! 置換表の`MATE`スコアやルートの即詰み表示のために、1手・3手詰めだけを
//! 愚直な全探索で判定する小さな補助を用意する。

use crate::position::Position;
use crate::types::Color;

use super::generator::legal_moves;

/// `color`手番で合法手が存在せず、王手がかかっている(詰み)かどうか
pub fn is_checkmate(pos: &mut Position, color: Color) -> bool {
    debug_assert_eq!(pos.side_to_move(), color);
    pos.in_check() && legal_moves(pos).is_empty()
}

/// `color`手番でステイルメイト的な状況(王手されていないのに指し手がない)かどうか。
/// 将棋のルールでは通常起こらないが、駒が極端に少ないテスト局面向けに用意する。
pub fn has_no_legal_move(pos: &mut Position) -> bool {
    legal_moves(pos).is_empty()
}

/// 手番側が1手で相手玉を詰ませられるか。詰みがあれば`Some(その手)`を返す。
pub fn mate_in_one(pos: &mut Position) -> Option<crate::types::Move> {
    let us = pos.side_to_move();
    let them = !us;
    for mv in legal_moves(pos) {
        pos.do_move(mv);
        let mates = pos.in_check() && legal_moves(pos).is_empty();
        pos.undo_move();
        if mates {
            debug_assert_eq!(pos.side_to_move(), us);
            let _ = them;
            return Some(mv);
        }
    }
    None
}

/// 手番側が3手(自分→相手の応手全てに対し→自分)で必ず詰ませられる手を探す。
/// 相手の応手のうち一つでも詰みを逃れるものがあれば、その1手は不採用とする。
pub fn mate_in_three(pos: &mut Position) -> Option<crate::types::Move> {
    for mv in legal_moves(pos) {
        pos.do_move(mv);
        let escapes = legal_moves(pos);
        let opponent_is_mated_now = pos.in_check() && escapes.is_empty();
        let forced = if opponent_is_mated_now {
            true
        } else if !pos.in_check() {
            // 王手ではない中合い/放置手は3手詰めの定義上不成立とみなす
            false
        } else {
            escapes.iter().all(|&reply| {
                pos.do_move(reply);
                let still_mates = mate_in_one(pos).is_some();
                pos.undo_move();
                still_mates
            })
        };
        pos.undo_move();
        if forced {
            return Some(mv);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn bare_king_with_adjacent_gold_wall_is_mated() {
        let mut pos = Position::new();
        // 後手玉(1一)の周りを金3枚と先手飛車で完全に押さえ、詰みの局面を作る
        pos.set_sfen("k1R6/1GG6/9/9/9/9/9/9/9 w - 1").unwrap();
        assert!(is_checkmate(&mut pos, Color::White));
    }

    #[test]
    fn king_with_an_escape_square_is_not_mated() {
        let mut pos = Position::new();
        pos.set_sfen("k8/1R7/9/9/9/9/9/9/9 w - 1").unwrap();
        assert!(!is_checkmate(&mut pos, Color::White));
    }
}
