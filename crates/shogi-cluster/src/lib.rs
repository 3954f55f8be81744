//! ツリー分割クラスタコーディネータ
//!
//! ルート局面のプレサーチ結果から、リーフごとに1子プロセスを割り当てる
//! ミニマックス木を組み立て、各リーフの`info`行を根へ伝播する。木構築と
//! 伝播規則は純粋なデータ操作で、プロセス起動/入出力(`worker`/
//! `coordinator`)と分離してテストできる。

pub mod coordinator;
pub mod error;
pub mod node;
pub mod presearch;
pub mod tree;
pub mod update;
pub mod weight;
pub mod worker;

pub use coordinator::Coordinator;
pub use error::ClusterError;
pub use node::{Node, NodeId, NodeInfo, Tree};
pub use presearch::{PresearchResult, PvLine};
pub use tree::{build_tree, DEFAULT_TOP_N_CAP};
pub use update::{apply_leaf_report, propagate, LeafReport, RootSnapshot};
pub use weight::WeightTable;
pub use worker::{spawn_worker, WorkerConfig, WorkerEvent, WorkerHandle, DEAD_WORKER_TIMEOUT};
