//! ミニマックス木の構築
//!
//! プレサーチの上位`N = min(legal_count, top_n_cap)`本の主変化だけから
//! 3段の分岐を組み立てる。`top_n_cap`はデフォルト8
//! (`min(8, legal_count) + 1`個のdepth-1子がキャッチオールを含めて
//! できるように — 2〜7位という筋書きの表現とは別に、実測される木の
//! 形はこの上限で決まる)。

use shogi_core::Move;

use crate::node::{NodeId, Tree};
use crate::presearch::PresearchResult;

pub const DEFAULT_TOP_N_CAP: usize = 8;

pub fn build_tree(legal_moves: &[Move], presearch: &PresearchResult, top_n_cap: usize) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    let n = presearch.top_move_count().min(top_n_cap).min(legal_moves.len());

    let mut top_moves = Vec::with_capacity(n);
    let mut depth1_children = Vec::with_capacity(n);
    for rank in 0..n {
        let line = presearch.line(rank).expect("rank within top_move_count");
        let top_move = line.moves[0];
        top_moves.push(top_move);
        let child = tree.add_child(root, vec![top_move], Vec::new(), Some(rank), false);
        depth1_children.push(child);
    }
    tree.add_child(root, Vec::new(), top_moves.clone(), None, true);

    let mut best_of_best: Option<NodeId> = None;
    for rank in 0..n {
        let line = presearch.line(rank).expect("rank within top_move_count");
        if line.moves.len() < 2 {
            continue;
        }
        let top_move = line.moves[0];
        let reply = line.moves[1];
        let parent = depth1_children[rank];
        let specific = tree.add_child(parent, vec![top_move, reply], Vec::new(), Some(rank), false);
        tree.add_child(parent, vec![top_move], vec![reply], Some(rank), true);
        if rank == 0 {
            best_of_best = Some(specific);
        }
    }

    if let Some(node_id) = best_of_best {
        let line = presearch.line(0).expect("rank 0 exists when best_of_best is set");
        if line.moves.len() >= 3 {
            let path = tree.get(node_id).path.clone();
            let third = line.moves[2];
            let mut deeper = path.clone();
            deeper.push(third);
            tree.add_child(node_id, deeper, Vec::new(), Some(0), false);
            tree.add_child(node_id, path, vec![third], Some(0), true);
        }
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presearch::PvLine;
    use shogi_core::{Square, Value};

    fn mv(from: (i32, i32), to: (i32, i32)) -> Move {
        Move::new_normal(Square::new(from.0, from.1), Square::new(to.0, to.1), false)
    }

    fn presearch_with_n_lines(n: usize) -> PresearchResult {
        let lines = (0..n)
            .map(|i| PvLine {
                moves: vec![mv((i as i32 % 9, 6), (i as i32 % 9, 5)), mv((4, 2), (4, 3)), mv((3, 6), (3, 5))],
                score: Value::new(100 - i as i32),
            })
            .collect();
        PresearchResult { lines }
    }

    #[test]
    fn twenty_legal_moves_yields_eight_plus_one_depth_one_children() {
        let legal_moves: Vec<Move> =
            (0..20).map(|i| mv((i % 9, 6), (i % 9, 5))).collect();
        let presearch = presearch_with_n_lines(8);
        let tree = build_tree(&legal_moves, &presearch, DEFAULT_TOP_N_CAP);

        let depth1_children = tree.get(tree.root()).children.clone();
        assert_eq!(depth1_children.len(), 9);
        let catch_all_count = depth1_children.iter().filter(|&&id| tree.get(id).is_catch_all).count();
        assert_eq!(catch_all_count, 1);
    }

    #[test]
    fn depth1_children_first_moves_plus_catch_all_ignore_list_cover_legal_moves() {
        let legal_moves: Vec<Move> = (0..20).map(|i| mv((i % 9, 6), (i % 9, 5))).collect();
        let presearch = presearch_with_n_lines(8);
        let tree = build_tree(&legal_moves, &presearch, DEFAULT_TOP_N_CAP);

        let depth1_children = tree.get(tree.root()).children.clone();
        let mut covered: Vec<Move> = Vec::new();
        for id in depth1_children {
            let node = tree.get(id);
            if node.is_catch_all {
                covered.extend(node.ignore_list.iter().copied());
            } else {
                covered.extend(node.path.iter().copied());
            }
        }
        for m in &legal_moves {
            assert!(covered.contains(m), "move {m:?} missing from depth-1 coverage");
        }
    }

    #[test]
    fn best_of_best_subtree_gets_a_third_split() {
        let legal_moves: Vec<Move> = (0..3).map(|i| mv((i % 9, 6), (i % 9, 5))).collect();
        let presearch = presearch_with_n_lines(3);
        let tree = build_tree(&legal_moves, &presearch, DEFAULT_TOP_N_CAP);

        // rank0 depth-1 child -> its specific depth-2 child -> should itself have 2 children
        let rank0 = tree.get(tree.root()).children[0];
        let rank0_specific = tree.get(rank0).children.iter().find(|&&id| !tree.get(id).is_catch_all).copied().unwrap();
        assert_eq!(tree.get(rank0_specific).children.len(), 2);
    }

    #[test]
    fn fewer_legal_moves_than_cap_shrinks_the_split() {
        let legal_moves: Vec<Move> = (0..3).map(|i| mv((i % 9, 6), (i % 9, 5))).collect();
        let presearch = presearch_with_n_lines(3);
        let tree = build_tree(&legal_moves, &presearch, DEFAULT_TOP_N_CAP);
        assert_eq!(tree.get(tree.root()).children.len(), 4);
    }
}
