//! 合議制コーディネータ
//!
//! `W`体の投票ワーカーと1体の予約マスターを起動し、`position ... go
//! infinite`を全員に broadcast する。各ワーカーのbestmove/infoを集計し、
//! 勝者が変わるたびに票内訳の`info string`と選ばれたinfo行を1回ずつ
//! emitする。賛成票の割合を`SearchStats::agreement_rate`に書き戻し、
//! 時間管理が不一致時に延長できるようにする。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::warn;
use shogi_core::{Move, Value};
use shogi_protocol::{format_move, parse_info_line, Score};

use crate::vote::{tally_votes, Ballot, VoteResult};
use crate::worker::{spawn_worker, WorkerConfig, WorkerEvent, WorkerHandle, DEAD_WORKER_TIMEOUT};

pub struct Coordinator {
    workers: HashMap<usize, WorkerHandle>,
    rx: mpsc::Receiver<WorkerEvent>,
    num_voting_workers: usize,
    master_worker_id: usize,
    latest_info: HashMap<usize, (Move, Value)>,
    dead: HashMap<usize, bool>,
    last_winner: Option<Move>,
}

impl Coordinator {
    /// `num_voting_workers = W`; 実際には`W+1`体のプロセスを起動し、
    /// 末尾のIDを非投票のマスターとして予約する。
    pub fn spawn(position_cmd: &str, engine_path: &PathBuf, num_voting_workers: usize) -> Result<Coordinator> {
        let master_worker_id = num_voting_workers;
        let (tx, rx) = mpsc::channel();
        let mut workers = HashMap::new();
        for worker_id in 0..=master_worker_id {
            let cfg = WorkerConfig { engine_path: engine_path.clone(), hash_mb: 16 };
            let mut handle = spawn_worker(worker_id, &cfg, tx.clone())?;
            handle.broadcast_search(position_cmd)?;
            workers.insert(worker_id, handle);
        }
        Ok(Coordinator {
            workers,
            rx,
            num_voting_workers,
            master_worker_id,
            latest_info: HashMap::new(),
            dead: HashMap::new(),
            last_winner: None,
        })
    }

    pub fn master_worker_id(&self) -> usize {
        self.master_worker_id
    }

    /// 1件のワーカーイベントを処理する。勝者が変わったときだけ
    /// (票内訳の`info string`, 選ばれた`info`行)を返す。
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<(String, String)>> {
        match self.rx.recv_timeout(timeout) {
            Ok(WorkerEvent::Info { worker_id, line }) => {
                if self.dead.get(&worker_id).copied().unwrap_or(false) {
                    return Ok(None);
                }
                let Some(parsed) = parse_info_line(&line) else { return Ok(None) };
                let Some(mv) = parsed.pv.first().copied() else { return Ok(None) };
                let score = parsed.score.map(coordinator_score).unwrap_or(Value::ZERO);
                self.latest_info.insert(worker_id, (mv, score));
                Ok(self.maybe_emit())
            }
            Ok(WorkerEvent::BestMove { .. }) => Ok(None),
            Ok(WorkerEvent::Exited { worker_id }) => {
                warn!("consultation peer {worker_id} exited");
                self.dead.insert(worker_id, true);
                self.latest_info.remove(&worker_id);
                Ok(self.maybe_emit())
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn ballots(&self) -> Vec<Ballot> {
        self.latest_info.iter().map(|(&worker_id, &(mv, score))| Ballot { worker_id, mv, score }).collect()
    }

    fn maybe_emit(&mut self) -> Option<(String, String)> {
        let ballots = self.ballots();
        let result = tally_votes(&ballots, self.master_worker_id)?;
        if Some(result.winner) == self.last_winner {
            return None;
        }
        self.last_winner = Some(result.winner);
        Some((self.breakdown_line(&result), self.winner_info_line(&result)))
    }

    fn breakdown_line(&self, result: &VoteResult) -> String {
        let parts: Vec<String> =
            result.counts.iter().map(|(mv, weight, _)| format!("{}:{weight}", format_move(*mv))).collect();
        format!("info string votes {}", parts.join(" "))
    }

    fn winner_info_line(&self, result: &VoteResult) -> String {
        format!("info score cp {} pv {}", result.winning_score.to_cp(), format_move(result.winner))
    }

    /// 現在の賛成票の割合(`winning_votes / W`)。`SearchStats::agreement_rate`
    /// に書き戻す値。
    pub fn agreement_rate(&self) -> f64 {
        let ballots = self.ballots();
        let Some(result) = tally_votes(&ballots, self.master_worker_id) else { return -1.0 };
        if self.num_voting_workers == 0 {
            return -1.0;
        }
        result.winning_weight as f64 / self.num_voting_workers as f64
    }

    /// 全ワーカーに`stop`を送り、1秒以内にbestmoveが届かなかったものを
    /// 死んだワーカーとして票から除外する。
    pub fn stop_all(&mut self) -> Result<()> {
        for handle in self.workers.values_mut() {
            handle.stop()?;
        }
        let deadline = Instant::now() + DEAD_WORKER_TIMEOUT;
        let mut pending: Vec<usize> = self.workers.keys().copied().collect();
        while !pending.is_empty() && Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(WorkerEvent::BestMove { worker_id, .. }) => pending.retain(|&id| id != worker_id),
                Ok(WorkerEvent::Exited { worker_id }) => pending.retain(|&id| id != worker_id),
                _ => {}
            }
        }
        for worker_id in pending {
            warn!("consultation peer {worker_id} did not report bestmove within the dead-worker timeout");
            self.dead.insert(worker_id, true);
            self.latest_info.remove(&worker_id);
        }
        Ok(())
    }
}

fn coordinator_score(score: Score) -> Value {
    match score {
        Score::Cp(cp) => Value::from_cp(cp),
        Score::MateIn(ply) => Value::mate_in(ply),
        Score::MatedIn(ply) => Value::mated_in(ply),
    }
}
