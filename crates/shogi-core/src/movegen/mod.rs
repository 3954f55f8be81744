//! 指し手生成モジュール
//!
//! - `attacks`: 駒種ごとの利き計算（盤上移動・王手判定の両方で使う）
//! - `generator`: 疑似合法手生成と合法手フィルタ
//! - `see`: Static Exchange Evaluation
//! - `mate`: 詰み判定・短手数詰め探索（探索本体のNon-goal外の補助機能）

pub mod attacks;
mod generator;
mod mate;
mod see;

pub use generator::{is_pseudo_legal, legal_moves, pseudo_legal_moves};
pub use mate::{has_no_legal_move, is_checkmate, mate_in_one, mate_in_three};
pub use see::see;
