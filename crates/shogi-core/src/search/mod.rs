//! 探索モジュール
//!
//! - `signals`: 停止フラグ・ノードカウンタ
//! - `history`: 指し手オーダリング用のテーブル群
//! - `movepicker`: 段階的指し手生成
//! - `pruning`: 枝刈り判定式
//! - `qsearch`: 静止探索
//! - `alpha_beta`: PVSメイン探索
//! - `types`: ルートムーブ・探索スタック
//! - `time_manager`: 持ち時間管理
//! - `thread_manager`: Lazy-SMPスレッドプール
//! - `iterative_deepening`: 反復深化・Aspiration Window

pub mod alpha_beta;
pub mod history;
pub mod iterative_deepening;
pub mod movepicker;
pub mod pruning;
pub mod qsearch;
pub mod signals;
pub mod thread_manager;
pub mod time_manager;
pub mod types;

use crate::eval::Evaluator;
use crate::tt::TranspositionTable;

use signals::SearchSignals;

/// 探索中ずっと不変な共有参照だけをまとめた文脈。スレッドごとの可変状態
/// (`alpha_beta::SearchState`)とは別に持つことで、複数スレッドから安全に共有できる。
pub struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub evaluator: &'a dyn Evaluator,
    pub signals: &'a SearchSignals,
}
