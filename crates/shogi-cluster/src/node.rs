//! ミニマックス木のノードアリーナ
//!
//! 親が子を所有し、子は親への逆参照を持つ循環構造は、整数ハンドルで
//! 間接化したアリーナとして表現する。`parent`は所有しない参照。

use shogi_core::{Move, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// ノードに紐付いた探索状況。リーフは担当ワーカーからの`info`行で、
/// 内側のノードは子からの伝播で更新される。
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub depth: u32,
    pub seldepth: u32,
    pub score: Option<Value>,
    pub pv: Vec<Move>,
    pub nodes: u64,
    pub nps: u64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// ルートからこのノードまでの指し手列
    pub path: Vec<Move>,
    /// キャッチオールノードが無視すべき候補手。リーフ以外では空。
    pub ignore_list: Vec<Move>,
    /// depth-1祖先でのランク。キャッチオール系統は`None`。
    pub depth1_rank: Option<usize>,
    pub is_catch_all: bool,
    pub info: NodeInfo,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new() -> Tree {
        let root = Node {
            parent: None,
            children: Vec::new(),
            path: Vec::new(),
            ignore_list: Vec::new(),
            depth1_rank: None,
            is_catch_all: false,
            info: NodeInfo::default(),
        };
        Tree { nodes: vec![root], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn add_child(
        &mut self,
        parent: NodeId,
        path: Vec<Move>,
        ignore_list: Vec<Move>,
        depth1_rank: Option<usize>,
        is_catch_all: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            path,
            ignore_list,
            depth1_rank,
            is_catch_all,
            info: NodeInfo::default(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn leaves(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).filter(|&id| self.get(id).is_leaf()).collect()
    }
}

impl Default for Tree {
    fn default() -> Tree {
        Tree::new()
    }
}
