//! 木の更新規則
//!
//! リーフが`info`行を報告するたびに(a)そのリーフのパス長でPV/深さ/詰み
//! 距離を補正し、(b)根に向かって子の最大値(符号反転つき)を伝播する。
//! キャッチオールの子は実際には指し手を進めていない(ルートと同じ局面)
//! ので符号反転しない。

use shogi_core::{Move, Value};

use crate::node::{NodeId, Tree};

#[derive(Debug, Clone)]
pub struct LeafReport {
    pub depth: u32,
    pub seldepth: u32,
    /// リーフ局面の手番視点の評価値(詰みならそのリーフからの手数)
    pub score: Value,
    /// リーフ局面以降のPV(パスに続く部分のみ)
    pub pv: Vec<Move>,
    pub nodes: u64,
    pub nps: u64,
}

/// ワーカーから届いた`info`行をリーフに反映する。根からの距離ぶん
/// 深さ・セル深さ・詰みスコアを補正する。
pub fn apply_leaf_report(tree: &mut Tree, leaf: NodeId, report: LeafReport) {
    let path_len = tree.get(leaf).path.len() as i32;
    let node = tree.get_mut(leaf);
    node.info.score = Some(report.score.from_tt(path_len));
    node.info.pv = node.path.iter().copied().chain(report.pv).collect();
    node.info.depth = report.depth + path_len as u32;
    node.info.seldepth = report.seldepth + path_len as u32;
    node.info.nodes = report.nodes;
    node.info.nps = report.nps;
}

/// `node`を根に伝播する。葉から呼ぶか、木全体を根から再帰的に辿って呼ぶ。
pub fn propagate(tree: &mut Tree, node_id: NodeId) {
    let children = tree.get(node_id).children.clone();
    if children.is_empty() {
        return;
    }
    for &child in &children {
        propagate(tree, child);
    }

    let node_path_len = tree.get(node_id).path.len();
    let mut best: Option<(Value, NodeId)> = None;
    for &child in &children {
        let child_node = tree.get(child);
        let Some(child_score) = child_node.info.score else { continue };
        let flip = child_node.path.len() > node_path_len;
        let score_here = if flip { -child_score } else { child_score };
        if best.is_none_or(|(b, _)| score_here > b) {
            best = Some((score_here, child));
        }
    }
    let Some((score, best_child)) = best else { return };

    let seldepth = children.iter().map(|&c| tree.get(c).info.seldepth).max().unwrap_or(0);
    let nodes: u64 = children.iter().map(|&c| tree.get(c).info.nodes).sum();
    let nps: u64 = children.iter().map(|&c| tree.get(c).info.nps).sum();
    let depth = tree.get(best_child).info.depth;
    let pv = tree.get(best_child).info.pv.clone();

    let node = tree.get_mut(node_id);
    node.info.score = Some(score);
    node.info.pv = pv;
    node.info.depth = depth;
    node.info.seldepth = seldepth;
    node.info.nodes = nodes;
    node.info.nps = nps;
}

/// 根の状態が前回emitしたものから変わったか(新しい深さ/最善手/スコア)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootSnapshot {
    depth: u32,
    best_move: Option<Move>,
    score_raw: Option<i32>,
}

impl RootSnapshot {
    pub fn from_tree(tree: &Tree) -> RootSnapshot {
        let root = tree.get(tree.root());
        RootSnapshot {
            depth: root.info.depth,
            best_move: root.info.pv.first().copied(),
            score_raw: root.info.score.map(|v| v.raw()),
        }
    }

    pub fn changed_since(&self, previous: &RootSnapshot) -> bool {
        self != previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presearch::{PresearchResult, PvLine};
    use crate::tree::{build_tree, DEFAULT_TOP_N_CAP};
    use shogi_core::Square;

    fn mv(from: (i32, i32), to: (i32, i32)) -> Move {
        Move::new_normal(Square::new(from.0, from.1), Square::new(to.0, to.1), false)
    }

    fn two_move_tree() -> (Tree, Vec<NodeId>) {
        let legal_moves = vec![mv((2, 6), (2, 5)), mv((6, 6), (6, 5))];
        let presearch = PresearchResult {
            lines: vec![
                PvLine { moves: vec![mv((2, 6), (2, 5))], score: Value::new(50) },
                PvLine { moves: vec![mv((6, 6), (6, 5))], score: Value::new(10) },
            ],
        };
        let tree = build_tree(&legal_moves, &presearch, DEFAULT_TOP_N_CAP);
        let leaves = tree.leaves();
        (tree, leaves)
    }

    #[test]
    fn catch_all_child_is_not_sign_flipped() {
        let (mut tree, leaves) = two_move_tree();
        // catch-all leaf (depth1_rank None) reports a positive score from root's own frame
        let catch_all = leaves.iter().copied().find(|&id| tree.get(id).is_catch_all).unwrap();
        apply_leaf_report(
            &mut tree,
            catch_all,
            LeafReport { depth: 3, seldepth: 4, score: Value::new(999), pv: vec![], nodes: 10, nps: 10 },
        );
        for &leaf in &leaves {
            if leaf != catch_all {
                apply_leaf_report(
                    &mut tree,
                    leaf,
                    LeafReport { depth: 3, seldepth: 4, score: Value::new(1), pv: vec![], nodes: 1, nps: 1 },
                );
            }
        }
        let root = tree.root();
        propagate(&mut tree, root);
        // root's best should be the catch-all's un-flipped 999, not -999
        assert_eq!(tree.get(tree.root()).info.score.unwrap().raw(), 999);
    }

    #[test]
    fn specific_child_score_is_sign_flipped_on_the_way_up() {
        let (mut tree, leaves) = two_move_tree();
        for &leaf in &leaves {
            let score = if tree.get(leaf).is_catch_all { Value::new(-1000) } else { Value::new(30) };
            apply_leaf_report(
                &mut tree,
                leaf,
                LeafReport { depth: 1, seldepth: 1, score, pv: vec![], nodes: 1, nps: 1 },
            );
        }
        let root = tree.root();
        propagate(&mut tree, root);
        // a real move's leaf score of 30 (opponent's perspective) becomes -30 for root
        assert_eq!(tree.get(tree.root()).info.score.unwrap().raw(), -30);
    }

    #[test]
    fn root_snapshot_detects_a_best_move_change() {
        let before = RootSnapshot::default();
        let after = RootSnapshot { depth: 1, best_move: Some(Move::NULL), score_raw: Some(0) };
        assert!(after.changed_since(&before));
        assert!(!after.changed_since(&after.clone()));
    }
}
