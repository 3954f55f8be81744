//! 重み付き多数決
//!
//! ワーカー(重み1)のbestmoveを集計し、マスター(重み0、全員死亡時の保険)
//! を除いて決定する。同じ指し手を選んだワーカーの票を合算し、
//! 「重みが同点、またはどちらかが勝ち確定スコアを報告している」場合は
//! スコアの高い方を、そうでなければ重みの高い方を選ぶ(楽観的タイブレーク
//! 付き多数決)。

use std::collections::HashMap;

use shogi_core::{Move, Value};

#[derive(Debug, Clone, Copy)]
pub struct Ballot {
    pub worker_id: usize,
    pub mv: Move,
    pub score: Value,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    weight: u32,
    best_score: Option<Value>,
    voters: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct VoteResult {
    pub winner: Move,
    pub winning_weight: u32,
    pub winning_score: Value,
    /// 指し手ごとの(重み, 最良スコア)。emitする`info string`の材料。
    pub counts: Vec<(Move, u32, Value)>,
}

/// `master_worker_id`の票は重み0(投票権なし)として扱う。
pub fn tally_votes(ballots: &[Ballot], master_worker_id: usize) -> Option<VoteResult> {
    let mut tallies: HashMap<Move, Tally> = HashMap::new();
    for ballot in ballots {
        let weight = if ballot.worker_id == master_worker_id { 0 } else { 1 };
        let entry = tallies.entry(ballot.mv).or_default();
        entry.weight += weight;
        entry.voters.push(ballot.worker_id);
        entry.best_score = Some(match entry.best_score {
            Some(existing) if existing >= ballot.score => existing,
            _ => ballot.score,
        });
    }

    let mut candidates: Vec<(Move, Tally)> = tallies.into_iter().collect();
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| b.1.weight.cmp(&a.1.weight));
    let mut best = candidates[0].clone();
    for candidate in candidates.into_iter().skip(1) {
        best = pick_winner(best, candidate);
    }

    let counts = vote_breakdown(ballots, master_worker_id);
    let (winner, tally) = best;
    Some(VoteResult {
        winner,
        winning_weight: tally.weight,
        winning_score: tally.best_score.unwrap_or(Value::ZERO),
        counts,
    })
}

fn pick_winner(a: (Move, Tally), b: (Move, Tally)) -> (Move, Tally) {
    let a_score = a.1.best_score.unwrap_or(Value::ZERO);
    let b_score = b.1.best_score.unwrap_or(Value::ZERO);
    let tie_on_weight = a.1.weight == b.1.weight;
    let either_winning = a_score.is_win() || b_score.is_win();
    if tie_on_weight || either_winning {
        if b_score > a_score {
            b
        } else {
            a
        }
    } else if b.1.weight > a.1.weight {
        b
    } else {
        a
    }
}

/// 全票の(指し手, 重み, 最良スコア)を表示順(重み降順)で返す。
/// `info string`の票内訳行の材料。
pub fn vote_breakdown(ballots: &[Ballot], master_worker_id: usize) -> Vec<(Move, u32, Value)> {
    let mut tallies: HashMap<Move, Tally> = HashMap::new();
    for ballot in ballots {
        let weight = if ballot.worker_id == master_worker_id { 0 } else { 1 };
        let entry = tallies.entry(ballot.mv).or_default();
        entry.weight += weight;
        entry.best_score = Some(match entry.best_score {
            Some(existing) if existing >= ballot.score => existing,
            _ => ballot.score,
        });
    }
    let mut rows: Vec<(Move, u32, Value)> =
        tallies.into_iter().map(|(mv, t)| (mv, t.weight, t.best_score.unwrap_or(Value::ZERO))).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use shogi_core::Square;

    fn mv(from: (i32, i32), to: (i32, i32)) -> Move {
        Move::new_normal(Square::new(from.0, from.1), Square::new(to.0, to.1), false)
    }

    #[test]
    fn plurality_winner_is_the_highest_weight_move() {
        let a = mv((2, 6), (2, 5));
        let b = mv((6, 6), (6, 5));
        let ballots = vec![
            Ballot { worker_id: 0, mv: a, score: Value::new(20) },
            Ballot { worker_id: 1, mv: a, score: Value::new(30) },
            Ballot { worker_id: 2, mv: b, score: Value::new(50) },
        ];
        let result = tally_votes(&ballots, 3).unwrap();
        assert_eq!(result.winner, a);
        assert_eq!(result.winning_weight, 2);
    }

    #[test]
    fn tie_on_weight_breaks_toward_the_higher_score() {
        let a = mv((2, 6), (2, 5));
        let b = mv((6, 6), (6, 5));
        let ballots = vec![
            Ballot { worker_id: 0, mv: a, score: Value::new(20) },
            Ballot { worker_id: 1, mv: b, score: Value::new(90) },
        ];
        let result = tally_votes(&ballots, 2).unwrap();
        assert_eq!(result.winner, b);
    }

    #[test]
    fn a_known_winning_score_overrides_plurality() {
        let a = mv((2, 6), (2, 5));
        let b = mv((6, 6), (6, 5));
        let ballots = vec![
            Ballot { worker_id: 0, mv: a, score: Value::new(10) },
            Ballot { worker_id: 1, mv: a, score: Value::new(10) },
            Ballot { worker_id: 2, mv: b, score: Value::mate_in(3) },
        ];
        let result = tally_votes(&ballots, 3).unwrap();
        assert_eq!(result.winner, b);
    }

    #[test]
    fn the_reserved_master_never_contributes_weight() {
        let a = mv((2, 6), (2, 5));
        let ballots = vec![Ballot { worker_id: 7, mv: a, score: Value::new(999) }];
        let result = tally_votes(&ballots, 7).unwrap();
        assert_eq!(result.winning_weight, 0);
    }

    #[test]
    fn no_ballots_yields_no_result() {
        assert!(tally_votes(&[], 0).is_none());
    }
}
