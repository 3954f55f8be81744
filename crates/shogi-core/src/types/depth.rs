//! 探索深さ（Depth）
//!
//! 深さは半手（half-ply）単位の整数で表す。`ONE_PLY` が1手分、`HALF_PLY` が
//! 特殊延長（王手延長の半減、Singular Extensionの半手延長など）の単位になる。

pub type Depth = i32;

/// 探索スタック／root moveの最大手数。ルート直前に2つの番兵フレームを置くため、
/// スタック配列は `MAX_PLY + 2` の長さを持つ。
pub const MAX_PLY: usize = 128;

pub const HALF_PLY: Depth = 1;
pub const ONE_PLY: Depth = 2 * HALF_PLY;

/// 静止探索のエントリ深さ
pub const DEPTH_QS: Depth = 0;

/// 置換表に「深さ未探索」として記録する番兵値
pub const DEPTH_UNSEARCHED: Depth = -ONE_PLY * 3;

/// 置換表に保存する深さの下限オフセット。通常探索はこれより浅い深さを保存しない。
pub const DEPTH_OFFSET: Depth = DEPTH_UNSEARCHED - HALF_PLY;
