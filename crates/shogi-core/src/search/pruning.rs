//! 枝刈りの判定式
//!
//! 各関数は「この条件なら枝刈りしてよい」という真偽値またはマージン値だけを
//! 返す。実際に探索を打ち切る/スキップするかどうかはalpha_betaの呼び出し側が決める。

use crate::types::{Depth, Value, ONE_PLY};

/// Futility Pruning: 残り深さが浅く、静的評価がbetaを十分上回っているなら
/// 静かな手を読む価値がないと判断するためのマージン
pub fn futility_margin(depth: Depth, improving: bool) -> i32 {
    let plies = (depth / ONE_PLY).max(1);
    let base = 120 * plies;
    if improving {
        base - 40
    } else {
        base
    }
}

pub fn can_futility_prune(depth: Depth, static_eval: Value, beta: Value, improving: bool) -> bool {
    depth < 8 * ONE_PLY
        && !static_eval.is_mate_score()
        && static_eval.raw() - futility_margin(depth, improving) >= beta.raw()
}

/// Razoring: 静的評価がalphaを大きく下回るなら、浅い静止探索だけで早期に見切る
pub fn razoring_margin(depth: Depth) -> i32 {
    200 + 180 * (depth / ONE_PLY).max(1)
}

pub fn can_razor(depth: Depth, static_eval: Value, alpha: Value) -> bool {
    depth < 4 * ONE_PLY && static_eval.raw() + razoring_margin(depth) <= alpha.raw()
}

/// Null Move Pruning: 手番を渡しても局面が悪化しないだろうと見なせる前提条件
pub fn can_try_null_move(depth: Depth, static_eval: Value, beta: Value, in_check: bool, has_non_pawn_material: bool) -> bool {
    !in_check
        && has_non_pawn_material
        && depth >= 3 * ONE_PLY
        && static_eval.raw() >= beta.raw()
        && !static_eval.is_mate_score()
}

/// Null Moveの探索深さ短縮幅
pub fn null_move_reduction(depth: Depth) -> Depth {
    (3 * ONE_PLY) + depth / 4
}

/// Late Move Reduction: 後方の静かな手ほど浅く読む
pub fn late_move_reduction(depth: Depth, move_count: u32, improving: bool, is_pv: bool) -> Depth {
    if depth < 3 * ONE_PLY || move_count < 4 {
        return 0;
    }
    let mut r = ((depth as f64).sqrt() + (move_count as f64).sqrt()) as Depth;
    if is_pv {
        r -= ONE_PLY;
    }
    if !improving {
        r += HALF_PLY_BONUS;
    }
    r.clamp(0, depth - ONE_PLY)
}

const HALF_PLY_BONUS: Depth = crate::types::HALF_PLY;

/// ProbCut: 深い静止探索と浅い通常探索の矛盾を避けるためのベータ引き上げ幅
pub fn probcut_margin() -> i32 {
    200
}

/// ProbCutの探索深さ短縮幅
pub fn probcut_reduction() -> Depth {
    4 * ONE_PLY
}

/// Internal Iterative Deepening: ハッシュ手がないノードでTTを埋めるための先行探索の深さ短縮幅
pub fn iid_reduction(depth: Depth, is_pv: bool) -> Depth {
    2 * ONE_PLY + if is_pv { 0 } else { depth / 4 }
}

/// Futility move-count pruning: 手数がこの値に達したら残りの静かな手は読まない
pub fn futility_move_count(depth: Depth, improving: bool) -> u32 {
    let plies = (depth / ONE_PLY).max(1) as u32;
    let base = 3 + plies * plies;
    if improving {
        base
    } else {
        base / 2
    }
}

/// 手を1つ読み飛ばしたと仮定したときの予測深さ(浅い枝刈りの判定に使う)
pub fn predicted_depth(depth: Depth, reduction: Depth) -> Depth {
    (depth - reduction).max(0)
}

/// 確率に基づく縮小(学習された続手確率が高いほど縮小しない)。深い読みでのみ使う。
pub fn probability_reduction(depth: Depth, probability: f64, is_pv: bool) -> Depth {
    let pv_factor = if is_pv { 0.4 } else { 0.8 };
    let raw_plies = pv_factor * (-probability.clamp(1e-6, 1.0).log2()) - 1.0;
    let max_plies = if is_pv { 4.5 } else { 6.0 };
    let plies = raw_plies.clamp(0.0, max_plies);
    (((plies * ONE_PLY as f64).round()) as Depth).clamp(0, (depth - ONE_PLY).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_searches_never_get_futility_pruned() {
        assert!(!can_futility_prune(9 * ONE_PLY, Value::new(10_000), Value::ZERO, false));
    }

    #[test]
    fn overwhelming_static_eval_allows_futility_pruning() {
        assert!(can_futility_prune(ONE_PLY, Value::new(5000), Value::ZERO, false));
    }

    #[test]
    fn late_move_reduction_grows_with_move_count() {
        let early = late_move_reduction(6 * ONE_PLY, 4, true, false);
        let late = late_move_reduction(6 * ONE_PLY, 40, true, false);
        assert!(late >= early);
    }

    #[test]
    fn shallow_depth_never_reduces() {
        assert_eq!(late_move_reduction(2 * ONE_PLY, 40, true, false), 0);
    }

    #[test]
    fn futility_move_count_grows_with_depth_and_improving() {
        let shallow = futility_move_count(2 * ONE_PLY, true);
        let deep = futility_move_count(8 * ONE_PLY, true);
        assert!(deep > shallow);
        assert!(futility_move_count(4 * ONE_PLY, false) < futility_move_count(4 * ONE_PLY, true));
    }

    #[test]
    fn probability_reduction_is_zero_for_near_certain_moves() {
        assert_eq!(probability_reduction(10 * ONE_PLY, 0.99, false), 0);
    }

    #[test]
    fn probability_reduction_grows_for_unlikely_moves() {
        let r = probability_reduction(10 * ONE_PLY, 0.01, false);
        assert!(r > 0);
        assert!(r <= 10 * ONE_PLY);
    }

    #[test]
    fn iid_reduction_is_larger_for_non_pv() {
        assert!(iid_reduction(8 * ONE_PLY, false) > iid_reduction(8 * ONE_PLY, true));
    }
}
