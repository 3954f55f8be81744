//! 段階的指し手生成(MovePicker)
//!
//! 全合法手を一度に生成してソートするのではなく、置換表手→良い駒取り→キラー/
//! カウンター/追随手→良い静かな手→残りの静かな手→悪い駒取りの順で、必要になった
//! 分だけ生成・整列する。`HistoryTables`への参照はフィールドとして持たず、
//! `next_move`の呼び出しごとに都度渡す。探索が再帰的に他のノードで別の
//! `HistoryTables`借用を必要とするため、`MovePicker`自身に借用を抱え込むと
//! 再帰呼び出しでborrow checkerと衝突するのを避ける。

use crate::movegen::{legal_moves, pseudo_legal_moves, see};
use crate::position::Position;
use crate::types::{Depth, Move, Piece, Square, ONE_PLY};

use super::history::{history_bonus, HistoryTables, KillerMoves};

/// 残りの静かな手を律儀にソートする代わりに生成順のまま返す(ソートの手間を
/// 省くための)しきい値。これより浅いノードでは並べ替えの価値が薄い。
const QUIETS_REMAINDER_SORT_MIN_DEPTH: Depth = 3 * ONE_PLY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    TtMove,
    GenerateCaptures,
    GoodCaptures,
    Killers,
    GenerateQuiets,
    GoodQuiets,
    QuietsRemainder,
    BadCaptures,
    Done,
}

struct Scored {
    mv: Move,
    score: i32,
}

fn push_if_eligible(pos: &Position, tt_move: Move, queue: &mut Vec<Move>, mv: Move) {
    if mv.is_none() || mv == tt_move || queue.contains(&mv) {
        return;
    }
    if pos.to_move(mv).is_some() && pos.is_quiet(mv) {
        queue.push(mv);
    }
}

/// 通常探索用のMovePicker。置換表手の健全性は呼び出し前に検証済みであることを前提とする。
pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: KillerMoves,
    /// 1手前に指された(駒, 移動先)。continuation/counter moveの参照キーに使う。
    prev: Option<(Piece, Square)>,
    /// 自分自身の2手前に指された(駒, 移動先)。follow-up moveの参照キーに使う。
    grandparent: Option<(Piece, Square)>,
    depth: Depth,
    good_captures: Vec<Scored>,
    bad_captures: Vec<Scored>,
    good_quiets: Vec<Scored>,
    quiets_remainder: Vec<Scored>,
    /// キラー2つ・カウンター手・追随手をまとめて1回だけ組み立てたもの
    killer_queue: Vec<Move>,
    cursor: usize,
    skip_quiets: bool,
    moves_yielded: usize,
}

impl MovePicker {
    pub fn new(
        tt_move: Move,
        killers: KillerMoves,
        prev: Option<(Piece, Square)>,
        grandparent: Option<(Piece, Square)>,
        depth: Depth,
    ) -> MovePicker {
        MovePicker {
            stage: Stage::TtMove,
            tt_move,
            killers,
            prev,
            grandparent,
            depth,
            good_captures: Vec::new(),
            bad_captures: Vec::new(),
            good_quiets: Vec::new(),
            quiets_remainder: Vec::new(),
            killer_queue: Vec::new(),
            cursor: 0,
            skip_quiets: false,
            moves_yielded: 0,
        }
    }

    /// 静かな手をこれ以上返さないようにする(futility pruningなどで使う)
    pub fn set_skip_quiets(&mut self, skip: bool) {
        self.skip_quiets = skip;
    }

    /// 直近に返した手の、大まかな「続く確率」の目安。深い読みでのLMR縮小幅に使う
    /// 簡易な近似で、学習された確率モデルの代わりにランク減衰で代用している。
    pub fn last_move_probability(&self) -> f64 {
        let rank = self.moves_yielded.saturating_sub(1);
        1.0 / (rank as f64 + 2.0)
    }

    pub fn next_move(&mut self, pos: &Position, history: &HistoryTables) -> Option<Move> {
        let mv = self.next_move_inner(pos, history);
        if mv.is_some() {
            self.moves_yielded += 1;
        }
        mv
    }

    fn next_move_inner(&mut self, pos: &Position, history: &HistoryTables) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = Stage::GenerateCaptures;
                    if !self.tt_move.is_none() {
                        return Some(self.tt_move);
                    }
                }
                Stage::GenerateCaptures => {
                    self.generate_captures(pos, history);
                    self.stage = Stage::GoodCaptures;
                    self.cursor = 0;
                }
                Stage::GoodCaptures => {
                    if let Some(mv) = Self::pop_best(&mut self.good_captures) {
                        if mv != self.tt_move {
                            return Some(mv);
                        }
                        continue;
                    }
                    self.build_killer_queue(pos, history);
                    self.stage = Stage::Killers;
                    self.cursor = 0;
                }
                Stage::Killers => {
                    if self.cursor < self.killer_queue.len() {
                        let mv = self.killer_queue[self.cursor];
                        self.cursor += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::GenerateQuiets;
                    self.cursor = 0;
                }
                Stage::GenerateQuiets => {
                    if self.skip_quiets {
                        self.stage = Stage::BadCaptures;
                        self.cursor = 0;
                        continue;
                    }
                    self.generate_quiets(pos, history);
                    self.stage = Stage::GoodQuiets;
                    self.cursor = 0;
                }
                Stage::GoodQuiets => {
                    if self.skip_quiets {
                        self.stage = Stage::BadCaptures;
                        self.cursor = 0;
                        continue;
                    }
                    if let Some(mv) = Self::pop_best(&mut self.good_quiets) {
                        if self.is_fresh_quiet(mv) {
                            return Some(mv);
                        }
                        continue;
                    }
                    self.stage = Stage::QuietsRemainder;
                    self.cursor = 0;
                }
                Stage::QuietsRemainder => {
                    if self.skip_quiets {
                        self.stage = Stage::BadCaptures;
                        self.cursor = 0;
                        continue;
                    }
                    let next = if self.depth >= QUIETS_REMAINDER_SORT_MIN_DEPTH {
                        Self::pop_best(&mut self.quiets_remainder)
                    } else if self.cursor < self.quiets_remainder.len() {
                        let mv = self.quiets_remainder[self.cursor].mv;
                        self.cursor += 1;
                        Some(mv)
                    } else {
                        None
                    };
                    if let Some(mv) = next {
                        if self.is_fresh_quiet(mv) {
                            return Some(mv);
                        }
                        continue;
                    }
                    self.stage = Stage::BadCaptures;
                    self.cursor = 0;
                }
                Stage::BadCaptures => {
                    if self.cursor < self.bad_captures.len() {
                        let mv = self.bad_captures[self.cursor].mv;
                        self.cursor += 1;
                        if mv != self.tt_move {
                            return Some(mv);
                        }
                        continue;
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return None,
            }
        }
    }

    fn is_fresh_quiet(&self, mv: Move) -> bool {
        mv != self.tt_move && !self.killers.contains(mv) && !self.killer_queue.contains(&mv)
    }

    fn build_killer_queue(&mut self, pos: &Position, history: &HistoryTables) {
        let tt_move = self.tt_move;
        let mut queue = Vec::with_capacity(6);
        for killer in self.killers.slots() {
            push_if_eligible(pos, tt_move, &mut queue, killer);
        }
        if let Some((piece, sq)) = self.prev {
            for mv in history.counter_moves.get(piece, sq) {
                push_if_eligible(pos, tt_move, &mut queue, mv);
            }
        }
        if let Some((piece, sq)) = self.grandparent {
            for mv in history.follow_up.get(piece, sq) {
                push_if_eligible(pos, tt_move, &mut queue, mv);
            }
        }
        self.killer_queue = queue;
    }

    fn generate_captures(&mut self, pos: &Position, history: &HistoryTables) {
        let us = pos.side_to_move();
        for mv in pseudo_legal_moves(pos) {
            if pos.to_move(mv).is_none() || pos.is_quiet(mv) {
                continue;
            }
            let see_value = see(pos, mv);
            let score = see_value * 64 + history.capture.get(us, mv);
            if see_value >= 0 {
                self.good_captures.push(Scored { mv, score });
            } else {
                self.bad_captures.push(Scored { mv, score });
            }
        }
    }

    fn generate_quiets(&mut self, pos: &Position, history: &HistoryTables) {
        let us = pos.side_to_move();
        for mv in pseudo_legal_moves(pos) {
            if pos.to_move(mv).is_none() || !pos.is_quiet(mv) {
                continue;
            }
            let mut score = history.main.get(us, mv);
            if let Some((piece, sq)) = self.prev {
                score += history.continuation.get(piece, sq);
            }
            if score > 0 {
                self.good_quiets.push(Scored { mv, score });
            } else {
                self.quiets_remainder.push(Scored { mv, score });
            }
        }
    }

    fn pop_best(list: &mut Vec<Scored>) -> Option<Move> {
        if list.is_empty() {
            return None;
        }
        let (best_idx, _) =
            list.iter().enumerate().max_by_key(|(_, s)| s.score).expect("checked non-empty");
        Some(list.swap_remove(best_idx).mv)
    }
}

/// Quiescence探索用のMovePicker: 呼び出し側の事情(王手中/チェックを数えるか/
/// 直前の取り返し専用/ProbCut検証用)によって候補の絞り方を変える。
#[derive(Clone, Copy)]
pub enum QMoveKind {
    /// 静止探索の入口: 駒取り・成り・王手を候補にする
    WithChecks,
    /// 深いquiescenceノード: 駒取り・成りのみ(王手は数えない)
    NoChecks,
    /// 直前の指し手の移動先への取り返しのみ
    RecaptureOnly(Square),
    /// 王手されている: 逃げ手をすべて候補にする(駒取り限定では合法手を取りこぼす)
    Evasion,
    /// ProbCut検証用: SEEが`threshold`を上回る駒取りのみ
    ProbCut(i32),
}

pub struct QMovePicker {
    effective_tt: Move,
    yielded_tt: bool,
    moves: Vec<Scored>,
    cursor: usize,
}

impl QMovePicker {
    pub fn new(pos: &Position, kind: QMoveKind, tt_move: Move, history: &HistoryTables) -> QMovePicker {
        let us = pos.side_to_move();

        let effective_tt = match kind {
            QMoveKind::RecaptureOnly(_) => Move::NONE,
            QMoveKind::ProbCut(threshold) => {
                if !tt_move.is_none() && pos.is_capture(tt_move) && see(pos, tt_move) > threshold {
                    tt_move
                } else {
                    Move::NONE
                }
            }
            QMoveKind::WithChecks | QMoveKind::NoChecks | QMoveKind::Evasion => tt_move,
        };
        let effective_tt = if !effective_tt.is_none() && pos.to_move(effective_tt).is_some() {
            effective_tt
        } else {
            Move::NONE
        };

        let mut moves = Vec::new();
        for mv in pseudo_legal_moves(pos) {
            if pos.to_move(mv).is_none() || mv == effective_tt {
                continue;
            }
            match kind {
                QMoveKind::WithChecks | QMoveKind::NoChecks => {
                    let with_checks = matches!(kind, QMoveKind::WithChecks);
                    let interesting = pos.is_capture(mv) || mv.is_promotion() || (with_checks && pos.gives_check(mv));
                    if !interesting {
                        continue;
                    }
                    let score = see(pos, mv) * 64 + history.capture.get(us, mv);
                    moves.push(Scored { mv, score });
                }
                QMoveKind::RecaptureOnly(target) => {
                    if !pos.is_capture(mv) || mv.to() != target {
                        continue;
                    }
                    let score = see(pos, mv) * 64 + history.capture.get(us, mv);
                    moves.push(Scored { mv, score });
                }
                QMoveKind::Evasion => {
                    let score = if pos.is_capture(mv) {
                        let see_value = see(pos, mv);
                        let capture_hist = history.capture.get(us, mv);
                        if see_value >= 0 {
                            2_000_000 + see_value * 64 + capture_hist
                        } else {
                            see_value * 64 + capture_hist
                        }
                    } else {
                        1_000_000 + history.main.get(us, mv)
                    };
                    moves.push(Scored { mv, score });
                }
                QMoveKind::ProbCut(threshold) => {
                    if !pos.is_capture(mv) {
                        continue;
                    }
                    let see_value = see(pos, mv);
                    if see_value <= threshold {
                        continue;
                    }
                    let score = see_value * 64 + history.capture.get(us, mv);
                    moves.push(Scored { mv, score });
                }
            }
        }
        QMovePicker { effective_tt, yielded_tt: effective_tt.is_none(), moves, cursor: 0 }
    }

    pub fn next_move(&mut self) -> Option<Move> {
        if !self.yielded_tt {
            self.yielded_tt = true;
            return Some(self.effective_tt);
        }
        if self.cursor >= self.moves.len() {
            return None;
        }
        let (best_idx, _) = self.moves[self.cursor..]
            .iter()
            .enumerate()
            .max_by_key(|(_, s)| s.score)
            .expect("cursor in bounds");
        let real_idx = self.cursor + best_idx;
        self.moves.swap(self.cursor, real_idx);
        let mv = self.moves[self.cursor].mv;
        self.cursor += 1;
        Some(mv)
    }
}

/// ルート局面限定の全合法手(`go searchmoves`フィルタ適用前の素の列挙)
pub fn root_candidate_moves(pos: &mut Position) -> Vec<Move> {
    legal_moves(pos)
}

pub fn tt_move_bonus(depth: i32) -> i32 {
    history_bonus(depth)
}
