//! 時間管理
//!
//! USIの`go`コマンドで指定される持ち時間条件(フィッシャー/秒読み/切れ負け/固定時間)
//! ごとに目標思考時間を計算する`TimePolicy`と、バックグラウンドスレッドで
//! 経過時間を監視し必要なら停止シグナルを上げる`TimeManager`からなる。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::signals::SearchSignals;

/// 監視スレッドが経過時間をポーリングする周期
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// SPSAチューニングツールがJSON化して調整するための持ち時間方針。`go`の
/// 引数から組み立てるのが主経路だが、テスト/チューニングではこの型を直接
/// シリアライズして比較できるようにしておく。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TimePolicy {
    /// 1手ごとに固定の思考時間を使う(`go movetime`)
    Fixed { movetime_ms: u64 },
    /// フィッシャークロック(持ち時間 + 1手ごとの加算)
    Fischer { remaining_ms: u64, increment_ms: u64, moves_to_go: Option<u32> },
    /// 秒読み(持ち時間を使い切った後は秒読み時間だけで指す)
    Byoyomi { remaining_ms: u64, byoyomi_ms: u64 },
    /// 切れ負け(秒読みなし)
    SuddenDeath { remaining_ms: u64, moves_to_go: Option<u32> },
    /// 無制限(`go infinite`、止まるまで考え続ける)
    Infinite,
}

/// 反復深化の過程で観測する探索の不安定さの指標。パニックモード判定に使う。
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct SearchStats {
    pub iterations_finished: u32,
    /// 最善手が変わった回数に応じて1.0以上になる不安定性指標(未変化なら1.0)
    pub pv_instability: f64,
    /// 直近のSingular Extensionマージン(まだ実装していない指標は負値のまま)
    pub singular_margin: i32,
    /// 合議制での賛成票の割合。ツリー分割/単体探索では-1.0のまま(未使用)
    pub agreement_rate: f64,
    /// 最善手以下の読みにどれだけノードを割いたかの比。大きいほど時間に余裕がある。
    pub search_insufficiency: f64,
}

impl SearchStats {
    pub fn reset(&mut self) {
        *self = SearchStats::default();
    }
}

/// 1回の`go`コマンドぶんの最小/最大/目標思考時間(ミリ秒)
#[derive(Debug, Clone, Copy)]
pub struct TimeAllotment {
    pub minimum_ms: u64,
    pub maximum_ms: u64,
    pub target_ms: u64,
}

const NETWORK_DELAY_MS: u64 = 120;
const MINIMUM_THINKING_MS: u64 = 20;

impl TimePolicy {
    pub fn allotment(&self, ply_count: u32) -> TimeAllotment {
        match *self {
            TimePolicy::Fixed { movetime_ms } => {
                let t = movetime_ms.saturating_sub(NETWORK_DELAY_MS).max(MINIMUM_THINKING_MS);
                TimeAllotment { minimum_ms: t, maximum_ms: t, target_ms: t }
            }
            TimePolicy::Fischer { remaining_ms, increment_ms, moves_to_go } => {
                let moves_left = moves_to_go.unwrap_or(30).max(1) as u64;
                let base = remaining_ms / moves_left + increment_ms;
                let target = base.saturating_sub(NETWORK_DELAY_MS).max(MINIMUM_THINKING_MS);
                let maximum = (remaining_ms / 2).max(target);
                TimeAllotment { minimum_ms: target / 2, maximum_ms: maximum, target_ms: target }
            }
            TimePolicy::Byoyomi { remaining_ms, byoyomi_ms } => {
                let target = if remaining_ms > byoyomi_ms {
                    (remaining_ms / 20) + byoyomi_ms
                } else {
                    byoyomi_ms
                };
                let target = target.saturating_sub(NETWORK_DELAY_MS).max(MINIMUM_THINKING_MS);
                TimeAllotment { minimum_ms: target / 2, maximum_ms: remaining_ms + byoyomi_ms, target_ms: target }
            }
            TimePolicy::SuddenDeath { remaining_ms, moves_to_go } => {
                let moves_left = moves_to_go.unwrap_or(50).max(1) as u64;
                let target = (remaining_ms / moves_left).saturating_sub(NETWORK_DELAY_MS).max(MINIMUM_THINKING_MS);
                TimeAllotment { minimum_ms: target / 2, maximum_ms: remaining_ms / 3, target_ms: target }
            }
            TimePolicy::Infinite => {
                let _ = ply_count;
                TimeAllotment { minimum_ms: u64::MAX, maximum_ms: u64::MAX, target_ms: u64::MAX }
            }
        }
    }
}

/// バックグラウンド監視スレッドを起動する時間管理。`Drop`で自動的に監視を止める。
pub struct TimeManager {
    start: Instant,
    allotment: TimeAllotment,
    panic_mode: AtomicBool,
    extended_ms: Arc<AtomicU64>,
    watcher: Option<std::thread::JoinHandle<()>>,
    signals: Arc<SearchSignals>,
    stop_watcher: Arc<AtomicBool>,
}

impl TimeManager {
    pub fn start(policy: TimePolicy, ply_count: u32, signals: Arc<SearchSignals>) -> TimeManager {
        let allotment = policy.allotment(ply_count);
        let stop_watcher = Arc::new(AtomicBool::new(false));
        let start = Instant::now();
        let extended_ms = Arc::new(AtomicU64::new(0));

        let watcher = if allotment.maximum_ms != u64::MAX {
            let signals_clone = Arc::clone(&signals);
            let stop_flag = Arc::clone(&stop_watcher);
            let extended_clone = Arc::clone(&extended_ms);
            let hard_limit = allotment.maximum_ms;
            Some(std::thread::spawn(move || loop {
                if stop_flag.load(Ordering::Relaxed) {
                    return;
                }
                let elapsed = start.elapsed().as_millis() as u64;
                let extra = extended_clone.load(Ordering::Relaxed);
                if elapsed >= hard_limit.saturating_add(extra) {
                    signals_clone.request_stop();
                    return;
                }
                std::thread::sleep(POLL_INTERVAL);
            }))
        } else {
            None
        };

        TimeManager {
            start,
            allotment,
            panic_mode: AtomicBool::new(false),
            extended_ms,
            watcher,
            signals,
            stop_watcher,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// 目標時間を使い切ったが、反復深化の次の1手を始めるだけの時間は残っているか
    pub fn enough_time_for_next_iteration(&self) -> bool {
        let elapsed = self.elapsed_ms();
        let target = self.allotment.target_ms.saturating_add(self.extended_ms.load(Ordering::Relaxed));
        elapsed < target
    }

    /// fail-lowで最善手の評価が急落したときに目標時間を一時的に延長する(パニックモード)
    pub fn enter_panic_mode(&self, stats: &SearchStats) {
        self.panic_mode.store(true, Ordering::Relaxed);
        let extension = if stats.pv_instability > 1.0 {
            (self.allotment.target_ms / 2).min(self.allotment.maximum_ms.saturating_sub(self.allotment.target_ms))
        } else {
            self.allotment.target_ms / 4
        };
        self.extended_ms.fetch_add(extension, Ordering::Relaxed);
    }

    pub fn is_panic_mode(&self) -> bool {
        self.panic_mode.load(Ordering::Relaxed)
    }

    pub fn allotment(&self) -> TimeAllotment {
        self.allotment
    }

    pub fn stop(&self) {
        self.stop_watcher.store(true, Ordering::Relaxed);
        self.signals.request_stop();
    }
}

impl Drop for TimeManager {
    fn drop(&mut self) {
        self.stop_watcher.store(true, Ordering::Relaxed);
        if let Some(handle) = self.watcher.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_movetime_subtracts_network_delay() {
        let policy = TimePolicy::Fixed { movetime_ms: 1000 };
        let allotment = policy.allotment(1);
        assert_eq!(allotment.target_ms, 1000 - NETWORK_DELAY_MS);
    }

    #[test]
    fn fischer_time_divides_by_estimated_moves_remaining() {
        let policy = TimePolicy::Fischer { remaining_ms: 60_000, increment_ms: 0, moves_to_go: Some(30) };
        let allotment = policy.allotment(1);
        assert!(allotment.target_ms < 3000);
    }

    #[test]
    fn infinite_policy_never_triggers_the_hard_limit() {
        let signals = SearchSignals::new();
        let tm = TimeManager::start(TimePolicy::Infinite, 1, Arc::clone(&signals));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!signals.should_stop());
        tm.stop();
    }

    #[test]
    fn time_policy_round_trips_through_json() {
        let policy = TimePolicy::Fischer { remaining_ms: 60_000, increment_ms: 2_000, moves_to_go: Some(40) };
        let json = serde_json::to_string(&policy).unwrap();
        let back: TimePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.allotment(1).target_ms, policy.allotment(1).target_ms);
    }
}
