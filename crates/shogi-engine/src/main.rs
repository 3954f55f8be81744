//! USIエンジンのエントリポイント
//!
//! コマンド受信はここで一本化する。stdinを読む受信スレッドと、実際に
//! コマンドを処理するディスパッチスレッドを分け、FIFOキュー経由で
//! つなぐ。`stop`/`ponderhit`/`quit`はキューを経由せず、受信スレッドから
//! 直接共有シグナルを書き換えることで`go`実行中でも即座に効く。

mod cli;
mod cluster_mode;
mod consultation_mode;
mod single;
mod state;

use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use clap::Parser;
use shogi_core::search::signals::SearchSignals;
use shogi_protocol::{parse_command, Command, EngineOptions, GoParams};

use cli::{Cli, Mode};
use cluster_mode::ClusterEngine;
use consultation_mode::ConsultationEngine;
use single::SingleEngine;

/// 現在処理中の`go`が使っているシグナル。`None`のときは受信スレッドの
/// `stop`/`ponderhit`は素通りする(実行中の探索がない)。
type CurrentSignals = Arc<Mutex<Option<Arc<SearchSignals>>>>;

enum Engine {
    Single(SingleEngine),
    Cluster(ClusterEngine),
    Consultation(ConsultationEngine),
}

impl Engine {
    fn isready(&mut self) {
        match self {
            Engine::Single(e) => e.isready(),
            Engine::Cluster(e) => e.isready(),
            Engine::Consultation(e) => e.isready(),
        }
    }

    fn setoption(&mut self, name: &str, value: Option<&str>) {
        match self {
            Engine::Single(e) => e.setoption(name, value),
            Engine::Cluster(e) => e.setoption(name, value),
            Engine::Consultation(e) => e.setoption(name, value),
        }
    }

    fn usinewgame(&mut self) {
        match self {
            Engine::Single(e) => e.usinewgame(),
            Engine::Cluster(e) => e.usinewgame(),
            Engine::Consultation(e) => e.usinewgame(),
        }
    }

    fn set_position(&mut self, startpos: bool, sfen: Option<&str>, moves: &[String]) {
        match self {
            Engine::Single(e) => e.set_position(startpos, sfen, moves),
            Engine::Cluster(e) => e.set_position(startpos, sfen, moves),
            Engine::Consultation(e) => e.set_position(startpos, sfen, moves),
        }
    }

    fn go(&mut self, params: &GoParams, signals: &Arc<SearchSignals>) {
        match self {
            Engine::Single(e) => e.go(params, signals),
            Engine::Cluster(e) => e.go(params, signals),
            Engine::Consultation(e) => e.go(params, signals),
        }
    }
}

fn print_usi_identity() {
    println!("id name shogi-engine 0.1.0");
    println!("id author rshogi-search contributors");
    for decl in EngineOptions::declarations() {
        println!("{decl}");
    }
    println!("usiok");
    flush();
}

fn flush() {
    io::stdout().flush().ok();
}

fn run_bench(cli: &Cli) {
    // ThreadManagerの`TimePolicy`には固定深さの変種がないため、`--bench-depth`は
    // movetimeへの近似変換で扱う。
    let mut engine = SingleEngine::new();
    let params = GoParams { movetime: Some((cli.bench_depth.max(1) as u64) * 200), ..Default::default() };
    let signals = SearchSignals::new();
    let start = Instant::now();
    engine.go(&params, &signals);
    log::info!("bench finished in {:?}", start.elapsed());
}

fn spawn_receiver(tx: mpsc::Sender<Command>, current_signals: CurrentSignals) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let command = match parse_command(line) {
                Ok(cmd) => cmd,
                Err(err) => {
                    println!("info string {err}");
                    flush();
                    continue;
                }
            };
            match command {
                Command::Stop => {
                    if let Some(signals) = current_signals.lock().unwrap().as_ref() {
                        signals.request_stop();
                    }
                }
                Command::PonderHit => {
                    if let Some(signals) = current_signals.lock().unwrap().as_ref() {
                        signals.ponderhit();
                    }
                }
                Command::Quit => {
                    if let Some(signals) = current_signals.lock().unwrap().as_ref() {
                        signals.request_stop();
                    }
                    let _ = tx.send(Command::Quit);
                    break;
                }
                other => {
                    if tx.send(other).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.clone()))
        .target(env_logger::Target::Stderr)
        .init();

    if cli.bench {
        run_bench(&cli);
        return Ok(());
    }

    let mut engine = match cli.mode {
        Mode::Single => Engine::Single(SingleEngine::new()),
        Mode::Cluster => Engine::Cluster(ClusterEngine::new(cli.engine_path.clone())),
        Mode::Consultation => Engine::Consultation(ConsultationEngine::new(cli.engine_path.clone(), cli.workers)),
    };

    let current_signals: CurrentSignals = Arc::new(Mutex::new(None));
    let (tx, rx) = mpsc::channel::<Command>();
    let receiver = spawn_receiver(tx, Arc::clone(&current_signals));

    for command in rx {
        match command {
            Command::Usi => print_usi_identity(),
            Command::IsReady => engine.isready(),
            Command::SetOption { name, value } => engine.setoption(&name, value.as_deref()),
            Command::UsiNewGame => engine.usinewgame(),
            Command::Position { startpos, sfen, moves } => engine.set_position(startpos, sfen.as_deref(), &moves),
            Command::Go(params) => {
                let signals = SearchSignals::new();
                *current_signals.lock().unwrap() = Some(Arc::clone(&signals));
                engine.go(&params, &signals);
                *current_signals.lock().unwrap() = None;
            }
            Command::GameOver(_) => {}
            Command::Quit => break,
            Command::Stop | Command::PonderHit => {}
        }
    }

    let _ = receiver.join();
    Ok(())
}
