//! ピアエンジンプロセスの起動・入出力
//!
//! `W+1`体のピアを立ち上げる。1体はマスターとして予約され、投票には
//! 加わらないが、全ワーカーが応答不能になった場合の保険として残る
//! (`master_worker_id() == num_workers`)。

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};

pub const WORKER_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const WORKER_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// `stop`後にbestmoveが届かないワーカーを死んだものと見なすまでの猶予
pub const DEAD_WORKER_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub engine_path: PathBuf,
    pub hash_mb: u32,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Info { worker_id: usize, line: String },
    BestMove { worker_id: usize, line: String },
    Exited { worker_id: usize },
}

pub struct WorkerHandle {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    pub worker_id: usize,
}

pub fn spawn_worker(worker_id: usize, cfg: &WorkerConfig, tx: Sender<WorkerEvent>) -> Result<WorkerHandle> {
    let mut child = Command::new(&cfg.engine_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn consultation peer at {}", cfg.engine_path.display()))?;
    let stdin = child.stdin.take().ok_or_else(|| anyhow!("peer has no stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| anyhow!("peer has no stdout"))?;

    std::thread::spawn(move || {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let event = if line.starts_with("info") {
                WorkerEvent::Info { worker_id, line }
            } else if line.starts_with("bestmove") {
                WorkerEvent::BestMove { worker_id, line }
            } else {
                continue;
            };
            if tx.send(event).is_err() {
                break;
            }
        }
        let _ = tx.send(WorkerEvent::Exited { worker_id });
    });

    let mut handle = WorkerHandle { child, stdin: BufWriter::new(stdin), worker_id };
    handle.write_line("usi")?;
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

    pub fn broadcast_search(&mut self, position_cmd: &str) -> Result<()> {
        self.write_line(position_cmd)?;
        self.write_line("go infinite")
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
                debug!("consultation peer {} exited cleanly", self.worker_id);
                return;
            }
            std::thread::sleep(WORKER_QUIT_POLL_INTERVAL);
        }
        warn!("consultation peer {} did not exit in time, killing", self.worker_id);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
