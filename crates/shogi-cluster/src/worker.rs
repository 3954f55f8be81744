//! リーフを担当するワーカープロセスの起動・入出力
//!
//! 1リーフ = 1子プロセス。標準出力はリーダースレッドで読み、リーフ番号で
//! タグ付けして1本のチャンネルにまとめる。コーディネータはそのチャンネル
//! を待つだけでよく、個々のプロセスをポーリングしなくて済む。

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, warn};

use crate::error::ClusterError;
use crate::node::NodeId;

pub const WORKER_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const WORKER_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// `stop`後にbestmoveが届かないワーカーを死んだものと見なすまでの猶予
pub const DEAD_WORKER_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub engine_path: PathBuf,
    pub threads: u32,
    pub hash_mb: u32,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Info { leaf: NodeId, line: String },
    BestMove { leaf: NodeId, line: String },
    Exited { leaf: NodeId },
}

pub struct WorkerHandle {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    pub leaf: NodeId,
}

pub fn spawn_worker(leaf: NodeId, cfg: &WorkerConfig, tx: Sender<WorkerEvent>) -> Result<WorkerHandle> {
    let mut child = Command::new(&cfg.engine_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| ClusterError::Spawn { path: cfg.engine_path.clone(), source })?;
    let stdin = child.stdin.take().ok_or(ClusterError::MissingPipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(ClusterError::MissingPipe("stdout"))?;

    std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let event = if line.starts_with("info") {
                WorkerEvent::Info { leaf, line }
            } else if line.starts_with("bestmove") {
                WorkerEvent::BestMove { leaf, line }
            } else {
                continue;
            };
            if tx.send(event).is_err() {
                break;
            }
        }
        let _ = tx.send(WorkerEvent::Exited { leaf });
    });

    let mut handle = WorkerHandle { child, stdin: BufWriter::new(stdin), leaf };
    handle.write_line("usi")?;
    handle.write_line(&format!("setoption name Threads value {}", cfg.threads))?;
    handle.write_line(&format!("setoption name USI_Hash value {}", cfg.hash_mb))?;
    handle.write_line("isready")?;
    Ok(handle)
}

impl WorkerHandle {
    pub fn write_line(&mut self, msg: &str) -> Result<()> {
        self.stdin.write_all(msg.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// `position ... moves ...`に続けて`go infinite [ignoremoves ...]`を送る
    pub fn start_leaf_search(&mut self, position_cmd: &str, ignoremoves: &[String]) -> Result<()> {
        self.write_line(position_cmd)?;
        if ignoremoves.is_empty() {
            self.write_line("go infinite")
        } else {
            self.write_line(&format!("go infinite ignoremoves {}", ignoremoves.join(" ")))
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.write_line("stop")
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.write_line("quit");
        let deadline = Instant::now() + WORKER_QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                debug!("cluster worker for leaf {:?} exited cleanly", self.leaf.index());
                return;
            }
            std::thread::sleep(WORKER_QUIT_POLL_INTERVAL);
        }
        warn!("cluster worker for leaf {:?} did not exit in time, killing", self.leaf.index());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
