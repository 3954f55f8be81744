//! USIプロトコルのコマンド解析・応答整形・指し手表記・オプション表
//!
//! 標準入出力の読み書きや非同期ライタースレッドはここでは扱わない。
//! このクレートは文字列と`shogi_core`の型との間の変換だけに責任を持つ。

pub mod command;
pub mod moves;
pub mod options;
pub mod response;

pub use command::{parse_command, Command, CommandError, GameResult, GoParams, MateLimit};
pub use moves::{format_move, parse_move};
pub use options::{EngineOptionKind, EngineOptions, OptionDecl, SpinRange};
pub use response::{parse_info_line, Response, Score, ScoreBound, SearchInfo};
