//! ワーカー起動まわりの型付きエラー
//!
//! コーディネータの呼び出し元は基本`anyhow`で十分だが、ワーカーの起動
//! 失敗だけは原因(プロセス起動自体の失敗か、パイプが取れなかったか)を
//! 呼び出し側が区別できるようにしておく。`anyhow::Error`へは
//! `std::error::Error`経由でそのまま変換できる。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to spawn cluster worker at {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cluster worker did not expose a {0} pipe")]
    MissingPipe(&'static str),
}
