//! 置換表本体
//!
//! クラスタ単位で確保し、各クラスタは`CLUSTER_SIZE`個のエントリを線形に
//! 保持する。置換は「世代が古いほど・深さが浅いほど」優先して追い出す
//! 単純な方針。読み書きはロックを取らず`TTEntry`のXORトリックに任せる
//! (静的評価値・Mate-in-3フラグはXOR検証の対象外の補助語に持つ)。

use std::sync::atomic::{AtomicU8, Ordering};

use log::debug;

use crate::types::{Bound, Depth, Move, Value};

use super::entry::{TTData, TTEntry};
use super::CLUSTER_SIZE;

#[repr(align(64))]
struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
}

impl Default for Cluster {
    fn default() -> Self {
        Cluster { entries: std::array::from_fn(|_| TTEntry::default()) }
    }
}

/// `probe`の結果。`found`がfalseのときは`data`は意味を持たない（呼び出し側は
/// `data.value = Value::NONE`として扱う）。
#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub found: bool,
    pub data: TTData,
}

pub struct TranspositionTable {
    clusters: Box<[Cluster]>,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// `mb_size`メガバイト相当のクラスタ数を確保する
    pub fn new(mb_size: usize) -> TranspositionTable {
        let cluster_bytes = std::mem::size_of::<Cluster>().max(1);
        let num_clusters = ((mb_size * 1024 * 1024) / cluster_bytes).max(1).next_power_of_two();
        debug!("allocating transposition table: {num_clusters} clusters ({mb_size} MiB requested)");
        let mut clusters = Vec::with_capacity(num_clusters);
        clusters.resize_with(num_clusters, Cluster::default);
        TranspositionTable { clusters: clusters.into_boxed_slice(), generation: AtomicU8::new(0) }
    }

    pub fn resize(&mut self, mb_size: usize) {
        *self = TranspositionTable::new(mb_size);
    }

    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            for entry in cluster.entries.iter() {
                entry.write(0, &TTData {
                    value: Value::NONE,
                    static_eval: Value::NONE,
                    depth: 0,
                    bound: Bound::None,
                    mv: Move::NONE,
                    is_pv: false,
                    generation: 0,
                    mate3_already_tried: false,
                });
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// 新しい探索(`go`コマンド1回分)の開始時に世代を進める
    pub fn new_search(&self) {
        self.generation.fetch_add(super::GENERATION_DELTA, Ordering::Relaxed);
    }

    fn current_generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        // 乗算シフト法: クラスタ数が2の冪であることを利用した均等分散ハッシュ
        let num_clusters = self.clusters.len() as u64;
        ((key as u128 * num_clusters as u128) >> 64) as usize
    }

    pub fn probe(&self, key: u64) -> ProbeResult {
        let cluster = &self.clusters[self.cluster_index(key)];
        for entry in cluster.entries.iter() {
            if let Some(data) = entry.read(key) {
                return ProbeResult { found: true, data };
            }
        }
        ProbeResult {
            found: false,
            data: TTData {
                value: Value::NONE,
                static_eval: Value::NONE,
                depth: 0,
                bound: Bound::None,
                mv: Move::NONE,
                is_pv: false,
                generation: self.current_generation(),
                mate3_already_tried: false,
            },
        }
    }

    /// `ply`は置換表に格納する前にスコアを距離非依存にするための相対深さ(呼び出し側で`Value::to_tt`適用済みを渡す)。
    /// `static_eval`はそのノードの静的評価値（未計算なら`Value::NONE`）、`mate3_already_tried`は
    /// この局面でMate-in-3探索を試みたか（結果に関わらず）を表す。
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        static_eval: Value,
        mate3_already_tried: bool,
    ) {
        let generation = self.current_generation();
        let cluster = &self.clusters[self.cluster_index(key)];

        let mut replace_idx = 0usize;
        let mut replace_score = i32::MAX;
        for (idx, entry) in cluster.entries.iter().enumerate() {
            if entry.is_empty() {
                replace_idx = idx;
                break;
            }
            if entry.read(key).is_some() {
                replace_idx = idx;
                break;
            }
            // 深さが浅く、世代が古いエントリほど優先して上書きする
            let age_penalty = entry.relative_age(generation) as i32 * 2;
            let score = entry.raw_depth() - age_penalty;
            if score < replace_score {
                replace_score = score;
                replace_idx = idx;
            }
        }

        let existing = cluster.entries[replace_idx].read(key);
        let keep_move = if mv.is_none() { existing.map(|d| d.mv).unwrap_or(Move::NONE) } else { mv };
        // 既存エントリがMate-in-3を試行済みなら、上書きしてもその事実を失わない
        let mate3_already_tried = mate3_already_tried || existing.is_some_and(|d| d.mate3_already_tried);

        cluster.entries[replace_idx].write(
            key,
            &TTData { value, static_eval, depth, bound, mv: keep_move, is_pv, generation, mate3_already_tried },
        );
    }

    /// 使用率を1000分率で概算する（`info`コマンドの`hashfull`用）。先頭1000クラスタだけ調べる。
    pub fn hashfull(&self) -> u32 {
        let sample = self.clusters.len().min(1000);
        if sample == 0 {
            return 0;
        }
        let generation = self.current_generation();
        let mut filled = 0u32;
        for cluster in self.clusters.iter().take(sample) {
            for entry in cluster.entries.iter() {
                if !entry.is_empty() && entry.relative_age(generation) == 0 {
                    filled += 1;
                }
            }
        }
        filled * 1000 / (sample as u32 * CLUSTER_SIZE as u32)
    }

    pub fn len_clusters(&self) -> usize {
        self.clusters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_probe_round_trips() {
        let tt = TranspositionTable::new(1);
        let key = 0x1234_5678_9ABC_DEF0;
        tt.store(key, Value::new(55), true, Bound::Exact, 10, Move::NONE, Value::new(20), false);
        let result = tt.probe(key);
        assert!(result.found);
        assert_eq!(result.data.value, Value::new(55));
        assert_eq!(result.data.static_eval, Value::new(20));
        assert_eq!(result.data.depth, 10);
        assert!(!result.data.mate3_already_tried);
    }

    #[test]
    fn mate3_already_tried_survives_a_later_store_that_does_not_set_it() {
        let tt = TranspositionTable::new(1);
        let key = 0x42;
        tt.store(key, Value::new(10), false, Bound::Exact, 3, Move::NONE, Value::NONE, true);
        tt.store(key, Value::new(12), false, Bound::Lower, 4, Move::NONE, Value::new(5), false);
        let result = tt.probe(key);
        assert!(result.data.mate3_already_tried);
    }

    #[test]
    fn probing_an_absent_key_misses() {
        let tt = TranspositionTable::new(1);
        let result = tt.probe(0xFFFF_FFFF_FFFF_FFFF);
        assert!(!result.found);
    }

    #[test]
    fn new_search_bumps_generation_and_ages_old_entries() {
        let tt = TranspositionTable::new(1);
        let key = 42;
        tt.store(key, Value::ZERO, false, Bound::Lower, 3, Move::NONE, Value::NONE, false);
        tt.new_search();
        let hashfull_after = tt.hashfull();
        // 世代が進んだ直後は、古いエントリは「今の世代のもの」とは数えない
        assert_eq!(hashfull_after, 0);
    }
}
