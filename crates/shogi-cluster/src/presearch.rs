//! プレサーチ結果
//!
//! ツリー構築は「ルートのMultiPV上位N本」の主変化だけから行う。各PVの
//! 2手目・3手目が、相手の最善応手/自分の2手目最善候補として木の下層の
//! 分岐点に使われる。

use shogi_core::{Move, Value};

#[derive(Debug, Clone)]
pub struct PvLine {
    pub moves: Vec<Move>,
    pub score: Value,
}

#[derive(Debug, Clone, Default)]
pub struct PresearchResult {
    /// スコア降順。`len() == min(legal_count, 7)`。
    pub lines: Vec<PvLine>,
}

impl PresearchResult {
    pub fn top_move_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, rank: usize) -> Option<&PvLine> {
        self.lines.get(rank)
    }
}
