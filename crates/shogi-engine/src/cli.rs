//! プロセス起動時のコマンドライン引数
//!
//! USIコマンド自体はstdin経由で届くので、ここで扱うのはプロセスの
//! 起動モード選択とロギングレベルだけ。

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum Mode {
    /// 単一プロセスのLazy-SMP探索(クラスタ/合議制のリーフ・ピアもこのモードで起動される)
    #[default]
    Single,
    /// ツリー分割コーディネータ。`--engine-path`をリーフワーカーとして子プロセス起動する
    Cluster,
    /// 投票アンサンブルコーディネータ。`--engine-path`をピアとして子プロセス起動する
    Consultation,
}

#[derive(Parser, Debug)]
#[command(name = "shogi-engine", about = "USI shogi engine: single / cluster / consultation search")]
pub struct Cli {
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = Mode::Single)]
    pub mode: Mode,

    /// consultationモードの投票ワーカー数`W`。single/clusterモードでは無視される
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// cluster/consultationが子プロセスとして起動するエンジンのパス。省略時は自分自身
    #[arg(long)]
    pub engine_path: Option<PathBuf>,

    /// 初期局面から固定深さのベンチマーク探索を行って終了する
    #[arg(long)]
    pub bench: bool,

    #[arg(long, default_value_t = 13)]
    pub bench_depth: i32,
}
