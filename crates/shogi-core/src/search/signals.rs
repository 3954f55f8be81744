//! 探索の停止・中断シグナル
//!
//! `stop`/`ponderhit`コマンドやタイムアップは別スレッド(時間管理スレッド)から
//! 届くため、すべてアトミックフラグで表現する。探索本体は定期的に
//! `SearchSignals::should_stop`をポーリングする。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// ノードカウンタをチェックする間隔。これより小さい粒度でフラグを見ると
/// atomic loadのオーバーヘッドで探索速度が落ちる。
pub const NODE_CHECK_INTERVAL: u64 = 2048;

#[derive(Default)]
pub struct SearchSignals {
    stop: AtomicBool,
    ponder: AtomicBool,
    nodes: AtomicU64,
}

impl SearchSignals {
    pub fn new() -> Arc<SearchSignals> {
        Arc::new(SearchSignals::default())
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.stop.store(false, Ordering::Relaxed);
        self.ponder.store(false, Ordering::Relaxed);
        self.nodes.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_pondering(&self) -> bool {
        self.ponder.load(Ordering::Relaxed)
    }

    pub fn set_pondering(&self, value: bool) {
        self.ponder.store(value, Ordering::Relaxed);
    }

    /// ponderhit受信時: 思考モードを通常探索に切り替える
    pub fn ponderhit(&self) {
        self.ponder.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_node(&self) -> u64 {
        self.nodes.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn nodes_searched(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_round_trips() {
        let sig = SearchSignals::default();
        assert!(!sig.should_stop());
        sig.request_stop();
        assert!(sig.should_stop());
        sig.reset();
        assert!(!sig.should_stop());
    }

    #[test]
    fn node_counter_accumulates_across_threads() {
        let sig = Arc::new(SearchSignals::default());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let sig = Arc::clone(&sig);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    sig.count_node();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sig.nodes_searched(), 4000);
    }
}
