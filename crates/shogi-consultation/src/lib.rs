//! 合議制（投票アンサンブル）コーディネータ
//!
//! `W`体のピアエンジンに同じ局面を独立探索させ、重み付き多数決で1手を
//! 選ぶ。票の集計規則(`vote`)はプロセス起動/入出力(`worker`/
//! `coordinator`)から独立しておりテストできる。

pub mod coordinator;
pub mod vote;
pub mod worker;

pub use coordinator::Coordinator;
pub use vote::{tally_votes, vote_breakdown, Ballot, VoteResult};
pub use worker::{spawn_worker, WorkerConfig, WorkerEvent, WorkerHandle, DEAD_WORKER_TIMEOUT};
