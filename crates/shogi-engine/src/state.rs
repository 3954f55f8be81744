//! モード間で共有するロジック
//!
//! `go`パラメータから`TimePolicy`を組み立てる処理と、置換表の確保失敗時の
//! 縮小リトライは単体/クラスタ/合議制の3モードで共通なので、ここに1つだけ置く。

use std::collections::HashSet;

use log::warn;
use shogi_core::search::time_manager::TimePolicy;
use shogi_core::tt::TranspositionTable;
use shogi_core::{Color, Move, Position};
use shogi_protocol::{EngineOptions, GoParams};

/// `go`のパラメータと確定済みオプションから思考時間ポリシーを決める。
/// 秒読み/フィッシャー/切れ負けの各マージンは`EngineOptions`側で調整済みの値を使う。
pub fn resolve_time_policy(params: &GoParams, opts: &EngineOptions, side_to_move: Color) -> TimePolicy {
    if params.infinite || params.ponder {
        return TimePolicy::Infinite;
    }
    if let Some(movetime_ms) = params.movetime {
        return TimePolicy::Fixed { movetime_ms };
    }

    let (remaining, increment) = match side_to_move {
        Color::Black => (params.btime, params.binc),
        Color::White => (params.wtime, params.winc),
    };

    if let Some(byoyomi) = params.byoyomi {
        return TimePolicy::Byoyomi {
            remaining_ms: remaining.unwrap_or(0),
            byoyomi_ms: byoyomi.saturating_add(opts.byoyomi_margin_ms as u64),
        };
    }
    if let Some(remaining_ms) = remaining {
        if increment.unwrap_or(0) > 0 {
            return TimePolicy::Fischer {
                remaining_ms,
                increment_ms: increment.unwrap_or(0),
                moves_to_go: params.moves_to_go,
            };
        }
        return TimePolicy::SuddenDeath {
            remaining_ms: remaining_ms.saturating_sub(opts.sudden_death_margin_ms as u64),
            moves_to_go: params.moves_to_go,
        };
    }
    TimePolicy::Infinite
}

/// `go searchmoves`/`ignoremoves`からルートで許す手の集合を作る。どちらも
/// 指定がなければ`None`(制限なし)を返す。不正なトークンは`info string`で
/// 警告するだけで無視し、コマンド全体は失敗させない(§7の方針)。
pub fn resolve_allowed_moves(pos: &Position, searchmoves: &[String], ignoremoves: &[String]) -> Option<Vec<Move>> {
    let normalize = |token: &str| shogi_protocol::parse_move(token).ok().and_then(|mv| pos.to_move(mv));

    if !searchmoves.is_empty() {
        let mut allowed = Vec::new();
        for token in searchmoves {
            match normalize(token) {
                Some(mv) => allowed.push(mv),
                None => println!("info string ignoring invalid searchmoves entry: {token}"),
            }
        }
        return Some(allowed);
    }

    if !ignoremoves.is_empty() {
        let mut excluded = HashSet::new();
        for token in ignoremoves {
            match normalize(token) {
                Some(mv) => {
                    excluded.insert(mv);
                }
                None => println!("info string ignoring invalid ignoremoves entry: {token}"),
            }
        }
        let mut scratch = pos.clone();
        let legal = shogi_core::movegen::legal_moves(&mut scratch);
        return Some(legal.into_iter().filter(|mv| !excluded.contains(mv)).collect());
    }

    None
}

/// `mb_size`MiBの置換表を確保する。確保に失敗したら半分のサイズへ段階的に
/// 縮小しながら再試行し、1MiBでも失敗したらそのまま返す(§7)。
pub fn try_allocate_tt(mb_size: usize) -> TranspositionTable {
    let mut size = mb_size.max(1);
    loop {
        let attempt = std::panic::catch_unwind(|| TranspositionTable::new(size));
        match attempt {
            Ok(tt) => return tt,
            Err(_) if size > 1 => {
                let next = (size / 2).max(1);
                warn!("failed to allocate a {size} MiB transposition table, retrying with {next} MiB");
                size = next;
            }
            Err(_) => {
                warn!("failed to allocate even a 1 MiB transposition table; continuing with it regardless");
                return TranspositionTable::new(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shogi_core::search::signals::SearchSignals;

    #[test]
    fn infinite_and_ponder_go_never_hit_a_hard_limit() {
        let opts = EngineOptions::default();
        let params = GoParams { ponder: true, ..Default::default() };
        let policy = resolve_time_policy(&params, &opts, Color::Black);
        assert!(matches!(policy, TimePolicy::Infinite));
    }

    #[test]
    fn byoyomi_adds_the_configured_margin() {
        let mut opts = EngineOptions::default();
        opts.byoyomi_margin_ms = 50;
        let params = GoParams { btime: Some(1000), byoyomi: Some(10_000), ..Default::default() };
        let policy = resolve_time_policy(&params, &opts, Color::Black);
        let TimePolicy::Byoyomi { byoyomi_ms, .. } = policy else { panic!("expected byoyomi policy") };
        assert_eq!(byoyomi_ms, 10_050);
    }

    #[test]
    fn fischer_time_is_picked_when_increment_is_present() {
        let opts = EngineOptions::default();
        let params = GoParams { wtime: Some(30_000), winc: Some(5_000), ..Default::default() };
        let policy = resolve_time_policy(&params, &opts, Color::White);
        assert!(matches!(policy, TimePolicy::Fischer { .. }));
    }

    #[test]
    fn searchmoves_restricts_to_the_normalized_legal_subset() {
        let pos = Position::new();
        let allowed = resolve_allowed_moves(&pos, &["7g7f".to_string()], &[]).unwrap();
        assert_eq!(allowed.len(), 1);
    }

    #[test]
    fn ignoremoves_removes_just_the_named_moves_from_the_legal_set() {
        let pos = Position::new();
        let mut scratch = pos.clone();
        let legal_count = shogi_core::movegen::legal_moves(&mut scratch).len();
        let allowed = resolve_allowed_moves(&pos, &[], &["7g7f".to_string()]).unwrap();
        assert_eq!(allowed.len(), legal_count - 1);
    }

    #[test]
    fn no_move_restriction_keywords_means_no_restriction() {
        let pos = Position::new();
        assert!(resolve_allowed_moves(&pos, &[], &[]).is_none());
    }

    #[test]
    fn small_transposition_tables_allocate_without_panicking() {
        let _ = SearchSignals::new();
        let tt = try_allocate_tt(1);
        assert_eq!(tt.len_clusters().is_power_of_two(), true);
    }
}
