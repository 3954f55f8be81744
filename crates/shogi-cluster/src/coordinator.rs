//! クラスタコーディネータ
//!
//! プレサーチ結果から木を組み、葉ごとにワーカープロセスを1つ起動する。
//! 全ワーカーの標準出力は1本のチャンネルに集約され、`info`行が届くたびに
//! 該当リーフを更新して根まで伝播し、根の状態が変わったときだけ上流へ
//! 1行emitする。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::warn;
use shogi_core::{Move, Value};
use shogi_protocol::{format_move, parse_info_line, Score};

use crate::node::Tree;
use crate::presearch::PresearchResult;
use crate::tree::{build_tree, DEFAULT_TOP_N_CAP};
use crate::update::{apply_leaf_report, propagate, LeafReport, RootSnapshot};
use crate::weight::WeightTable;
use crate::worker::{spawn_worker, WorkerConfig, WorkerEvent, WorkerHandle, DEAD_WORKER_TIMEOUT};

pub struct Coordinator {
    tree: Tree,
    workers: HashMap<usize, WorkerHandle>,
    rx: mpsc::Receiver<WorkerEvent>,
    dead: HashMap<usize, bool>,
    last_emitted: RootSnapshot,
}

fn score_to_value(score: Score) -> Value {
    match score {
        Score::Cp(cp) => Value::from_cp(cp),
        Score::MateIn(ply) => Value::mate_in(ply),
        Score::MatedIn(ply) => Value::mated_in(ply),
    }
}

fn position_command(root_sfen_cmd: &str, path: &[Move]) -> String {
    if path.is_empty() {
        root_sfen_cmd.to_string()
    } else {
        let moves: Vec<String> = path.iter().map(|&m| format_move(m)).collect();
        format!("{root_sfen_cmd} moves {}", moves.join(" "))
    }
}

impl Coordinator {
    /// `root_sfen_cmd`は`position startpos`または`position sfen ...`の形。
    pub fn spawn(
        root_sfen_cmd: &str,
        legal_moves: &[Move],
        presearch: &PresearchResult,
        engine_path: &PathBuf,
        weights: &WeightTable,
    ) -> Result<Coordinator> {
        let tree = build_tree(legal_moves, presearch, DEFAULT_TOP_N_CAP);
        let (tx, rx) = mpsc::channel();
        let mut workers = HashMap::new();

        for leaf in tree.leaves() {
            let node = tree.get(leaf);
            let cfg = WorkerConfig {
                engine_path: engine_path.clone(),
                threads: weights.threads_for_rank(node.depth1_rank),
                hash_mb: 16,
            };
            let mut handle = spawn_worker(leaf, &cfg, tx.clone())?;
            let position_cmd = position_command(root_sfen_cmd, &node.path);
            let ignore: Vec<String> = node.ignore_list.iter().map(|&m| format_move(m)).collect();
            handle.start_leaf_search(&position_cmd, &ignore)?;
            workers.insert(leaf.index(), handle);
        }

        Ok(Coordinator { tree, workers, rx, dead: HashMap::new(), last_emitted: RootSnapshot::default() })
    }

    /// ワーカーからの`info`行を1件処理する。根の状態が変わったときだけ
    /// `Some`で整形済みの`info`行を返す。
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<String>> {
        match self.rx.recv_timeout(timeout) {
            Ok(WorkerEvent::Info { leaf, line }) => {
                if self.dead.get(&leaf.index()).copied().unwrap_or(false) {
                    return Ok(None);
                }
                let Some(parsed) = parse_info_line(&line) else { return Ok(None) };
                let report = LeafReport {
                    depth: parsed.depth.unwrap_or(0),
                    seldepth: parsed.seldepth.unwrap_or(0),
                    score: parsed.score.map(score_to_value).unwrap_or(Value::ZERO),
                    pv: parsed.pv,
                    nodes: parsed.nodes.unwrap_or(0),
                    nps: parsed.nps.unwrap_or(0),
                };
                apply_leaf_report(&mut self.tree, leaf, report);
                let root = self.tree.root();
                propagate(&mut self.tree, root);
                let snapshot = RootSnapshot::from_tree(&self.tree);
                if snapshot.changed_since(&self.last_emitted) {
                    self.last_emitted = snapshot;
                    return Ok(self.root_info_line());
                }
                Ok(None)
            }
            Ok(WorkerEvent::BestMove { .. }) => Ok(None),
            Ok(WorkerEvent::Exited { leaf }) => {
                warn!("cluster worker for leaf {} exited", leaf.index());
                self.dead.insert(leaf.index(), true);
                Ok(None)
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn root_info_line(&self) -> Option<String> {
        let root = self.tree.get(self.tree.root());
        let score = root.info.score?;
        let pv: Vec<String> = root.info.pv.iter().map(|&m| format_move(m)).collect();
        Some(format!(
            "info depth {} seldepth {} score cp {} pv {}",
            root.info.depth,
            root.info.seldepth,
            score.to_cp(),
            pv.join(" ")
        ))
    }

    /// 全ワーカーに`stop`を送り、1秒以内に`bestmove`を返さなかったものを
    /// 切断済みとして扱う。
    pub fn stop_all(&mut self) -> Result<()> {
        for handle in self.workers.values_mut() {
            handle.stop()?;
        }
        let deadline = Instant::now() + DEAD_WORKER_TIMEOUT;
        let mut pending: Vec<usize> = self.workers.keys().copied().collect();
        while !pending.is_empty() && Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(WorkerEvent::BestMove { leaf, .. }) => pending.retain(|&id| id != leaf.index()),
                Ok(WorkerEvent::Exited { leaf }) => pending.retain(|&id| id != leaf.index()),
                _ => {}
            }
        }
        for leaf_id in pending {
            warn!("cluster worker for leaf {leaf_id} did not report bestmove within the dead-worker timeout");
            self.dead.insert(leaf_id, true);
        }
        Ok(())
    }

    pub fn best_move(&self) -> Option<Move> {
        self.tree.get(self.tree.root()).info.pv.first().copied()
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaves().len()
    }
}
