//! 指し手オーダリング用のヒストリテーブル
//!
//! butterfly history・killer move・counter/follow-up move・continuation history・
//! 評価ゲインの6種類。history/continuationは飽和加算で`±HISTORY_MAX`に収め、
//! ゲインが大きいほど急速に伸びて小さいほどゆっくり減衰する(gravity)更新式を使う。

use crate::types::{Color, Move, Piece, Square, Value};

/// 歩の配置ハッシュを畳み込むバケット数
pub const PAWN_HISTORY_SIZE: usize = 4096;

/// ヒストリ値の絶対値上限
pub const HISTORY_MAX: i32 = 250;

fn clamp_history(v: i32) -> i32 {
    v.clamp(-HISTORY_MAX, HISTORY_MAX)
}

/// `bonus`方向にヒストリ値を寄せる(gravity式更新: 限界に近いほど動きにくい)
fn update_with_gravity(value: &mut i32, bonus: i32) {
    let bonus = bonus.clamp(-HISTORY_MAX, HISTORY_MAX);
    *value += bonus - *value * bonus.abs() / HISTORY_MAX;
    *value = clamp_history(*value);
}

/// 移動元には通常のマスに加え、駒打ち7種ぶんの仮想「マス」を割り当てる
const FROM_TO_SIZE: usize = (Square::NUM + 7) * Square::NUM;

/// 手番×移動元×移動先でインデックスするButterfly history(静かな手の良し悪し)
pub struct ButterflyHistory {
    table: Box<[[i32; FROM_TO_SIZE]; Color::NUM]>,
}

impl Default for ButterflyHistory {
    fn default() -> Self {
        ButterflyHistory { table: Box::new([[0; FROM_TO_SIZE]; Color::NUM]) }
    }
}

impl ButterflyHistory {
    fn index(mv: Move) -> usize {
        let from = if mv.is_drop() { Square::NUM + mv.drop_piece_type().index() } else { mv.from().index() };
        from * Square::NUM + mv.to().index()
    }

    pub fn get(&self, color: Color, mv: Move) -> i32 {
        self.table[color.index()][Self::index(mv)]
    }

    pub fn update(&mut self, color: Color, mv: Move, bonus: i32) {
        let idx = Self::index(mv);
        update_with_gravity(&mut self.table[color.index()][idx], bonus);
    }

    pub fn clear(&mut self) {
        *self = ButterflyHistory::default();
    }
}

/// 直前の指し手(駒, 移動先)に対する追随手としての良さを記録する
pub struct ContinuationHistory {
    table: Box<[[i32; Square::NUM]; Piece::NUM]>,
}

impl Default for ContinuationHistory {
    fn default() -> Self {
        ContinuationHistory { table: Box::new([[0; Square::NUM]; Piece::NUM]) }
    }
}

impl ContinuationHistory {
    pub fn get(&self, prev_piece: Piece, prev_to: Square) -> i32 {
        self.table[prev_piece.index()][prev_to.index()]
    }

    pub fn update(&mut self, prev_piece: Piece, prev_to: Square, bonus: i32) {
        update_with_gravity(&mut self.table[prev_piece.index()][prev_to.index()], bonus);
    }

    pub fn clear(&mut self) {
        *self = ContinuationHistory::default();
    }
}

/// 各plyで2手まで保持するキラームーブ
#[derive(Default, Clone, Copy)]
pub struct KillerMoves {
    moves: [Move; 2],
}

impl KillerMoves {
    pub fn slots(&self) -> [Move; 2] {
        self.moves
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.moves[0] == mv || self.moves[1] == mv
    }

    pub fn push(&mut self, mv: Move) {
        if self.moves[0] == mv {
            return;
        }
        self.moves[1] = self.moves[0];
        self.moves[0] = mv;
    }
}

/// (駒,移動先)をキーに直近2手を覚えておく共通実装。counter moveとfollow-up moveの
/// どちらも「フェイルハイを起こした局面をキーに、その手を最大2つ覚える」という
/// 同じ形をしているので下回りを共有する。
#[derive(Default, Clone, Copy)]
struct MoveSlots {
    moves: [Move; 2],
}

impl MoveSlots {
    fn slots(&self) -> [Move; 2] {
        self.moves
    }

    fn push(&mut self, mv: Move) {
        if self.moves[0] == mv {
            return;
        }
        self.moves[1] = self.moves[0];
        self.moves[0] = mv;
    }
}

#[derive(Default)]
struct PairedMoveTable {
    table: std::collections::HashMap<(Piece, Square), MoveSlots>,
}

impl PairedMoveTable {
    fn get(&self, piece: Piece, sq: Square) -> [Move; 2] {
        self.table.get(&(piece, sq)).copied().unwrap_or_default().slots()
    }

    fn push(&mut self, piece: Piece, sq: Square, mv: Move) {
        self.table.entry((piece, sq)).or_default().push(mv);
    }

    fn clear(&mut self) {
        self.table.clear();
    }
}

/// 相手の直前の指し手(駒, 移動先)に対する返し手として最良だった手(最大2つ)
#[derive(Default)]
pub struct CounterMoveHistory(PairedMoveTable);

impl CounterMoveHistory {
    pub fn get(&self, prev_piece: Piece, prev_to: Square) -> [Move; 2] {
        self.0.get(prev_piece, prev_to)
    }

    pub fn push(&mut self, prev_piece: Piece, prev_to: Square, mv: Move) {
        self.0.push(prev_piece, prev_to, mv);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// 自分自身の2手前の指し手(駒, 移動先)への追随手として最良だった手(最大2つ)
#[derive(Default)]
pub struct FollowUpHistory(PairedMoveTable);

impl FollowUpHistory {
    pub fn get(&self, piece: Piece, to: Square) -> [Move; 2] {
        self.0.get(piece, to)
    }

    pub fn push(&mut self, piece: Piece, to: Square, mv: Move) {
        self.0.push(piece, to, mv);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// 指し手(16bit生値)をキーに静的評価の改善幅を蓄積するゲインテーブル。
/// `value[m] = sum / (count + 1)`。カウントが`GAIN_COUNT_SATURATION`に達したら
/// サンプルを半減させてから積む(古い観測を指数的に忘れる)。
const GAIN_TABLE_SIZE: usize = 1 << 16;
const GAIN_COUNT_SATURATION: u32 = 256;

pub struct GainTable {
    entries: Box<[(i32, u32); GAIN_TABLE_SIZE]>,
}

impl Default for GainTable {
    fn default() -> Self {
        GainTable { entries: Box::new([(0, 0); GAIN_TABLE_SIZE]) }
    }
}

impl GainTable {
    fn index(mv: Move) -> usize {
        mv.raw() as usize
    }

    pub fn get(&self, mv: Move) -> i32 {
        let (sum, count) = self.entries[Self::index(mv)];
        sum / (count as i32 + 1)
    }

    pub fn update(&mut self, mv: Move, gain: i32) {
        let idx = Self::index(mv);
        let (mut sum, mut count) = self.entries[idx];
        if count >= GAIN_COUNT_SATURATION {
            sum /= 2;
            count /= 2;
        }
        sum += gain;
        count += 1;
        self.entries[idx] = (sum, count);
    }

    pub fn clear(&mut self) {
        *self = GainTable::default();
    }
}

/// 1スレッド分のオーダリングテーブル一式
#[derive(Default)]
pub struct HistoryTables {
    pub main: ButterflyHistory,
    pub capture: ButterflyHistory,
    pub continuation: ContinuationHistory,
    pub counter_moves: CounterMoveHistory,
    pub follow_up: FollowUpHistory,
    pub gains: GainTable,
}

impl HistoryTables {
    pub fn clear(&mut self) {
        self.main.clear();
        self.capture.clear();
        self.continuation.clear();
        self.counter_moves.clear();
        self.follow_up.clear();
        self.gains.clear();
    }

    /// フェイルハイを起こした手に正のボーナス、それまでに試した手には負のペナルティを与える。
    /// `prev`は相手の直前の手(counter move/continuationのキー)、`grandparent`は
    /// 自分自身の2手前の手(follow-up moveのキー)。
    #[allow(clippy::too_many_arguments)]
    pub fn update_quiet_stats(
        &mut self,
        color: Color,
        best_move: Move,
        prev: Option<(Piece, Square)>,
        grandparent: Option<(Piece, Square)>,
        quiets_tried: &[Move],
        depth: i32,
    ) {
        let bonus = history_bonus(depth);
        self.main.update(color, best_move, bonus);
        if let Some((piece, sq)) = prev {
            self.continuation.update(piece, sq, bonus);
            self.counter_moves.push(piece, sq, best_move);
        }
        if let Some((piece, sq)) = grandparent {
            self.follow_up.push(piece, sq, best_move);
        }
        for &mv in quiets_tried {
            if mv != best_move {
                self.main.update(color, mv, -bonus);
                if let Some((piece, sq)) = prev {
                    self.continuation.update(piece, sq, -bonus / 2);
                }
            }
        }
    }

    pub fn update_capture_stats(
        &mut self,
        color: Color,
        best_move: Move,
        captures_tried: &[Move],
        depth: i32,
    ) {
        let bonus = history_bonus(depth);
        for &mv in captures_tried {
            let sign = if mv == best_move { 1 } else { -1 };
            self.capture.update(color, mv, sign * bonus);
        }
    }

    /// 直前の指し手が静かな手だったときだけ呼ぶ: 静的評価の差分をゲインとして積む
    pub fn update_gain(&mut self, mv: Move, prev_static: Value, current_static: Value) {
        if prev_static == Value::NONE || current_static == Value::NONE {
            return;
        }
        let gain = -(prev_static.raw() - current_static.raw());
        self.gains.update(mv, gain);
    }
}

/// 探索深さに応じたボーナス幅。深く探索しての結果ほど信頼して大きく動かす。
pub fn history_bonus(depth: i32) -> i32 {
    (depth * depth / 2).min(HISTORY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    #[test]
    fn history_value_saturates_at_history_max() {
        let mut table = ButterflyHistory::default();
        let mv = Move::new_normal(Square::new(0, 0), Square::new(0, 1), false);
        for _ in 0..1000 {
            table.update(Color::Black, mv, HISTORY_MAX);
        }
        assert!(table.get(Color::Black, mv) <= HISTORY_MAX);
        assert!(table.get(Color::Black, mv) > 0);
    }

    #[test]
    fn killer_moves_keep_most_recent_two() {
        let mut killers = KillerMoves::default();
        let a = Move::new_normal(Square::new(0, 0), Square::new(0, 1), false);
        let b = Move::new_normal(Square::new(1, 0), Square::new(1, 1), false);
        let c = Move::new_normal(Square::new(2, 0), Square::new(2, 1), false);
        killers.push(a);
        killers.push(b);
        killers.push(c);
        assert!(killers.contains(c));
        assert!(killers.contains(b));
        assert!(!killers.contains(a));
    }

    #[test]
    fn counter_move_history_is_set_on_cutoff_and_readable_by_the_checked_square() {
        use crate::types::PieceType;

        let mut tables = HistoryTables::default();
        let reply = Move::new_normal(Square::new(3, 3), Square::new(3, 4), false);
        let prev = (Piece::new(Color::White, PieceType::Silver), Square::new(4, 4));
        tables.update_quiet_stats(Color::Black, reply, Some(prev), None, &[], 4 * 2);

        let counters = tables.counter_moves.get(prev.0, prev.1);
        assert!(counters.contains(&reply));
    }

    #[test]
    fn follow_up_history_is_keyed_on_our_own_earlier_move() {
        use crate::types::PieceType;

        let mut tables = HistoryTables::default();
        let reply = Move::new_normal(Square::new(5, 5), Square::new(5, 4), false);
        let grandparent = (Piece::new(Color::Black, PieceType::Gold), Square::new(6, 6));
        tables.update_quiet_stats(Color::Black, reply, None, Some(grandparent), &[], 4 * 2);

        let follow_ups = tables.follow_up.get(grandparent.0, grandparent.1);
        assert!(follow_ups.contains(&reply));
    }

    #[test]
    fn gain_table_averages_observed_static_eval_improvements() {
        let mut gains = GainTable::default();
        let mv = Move::new_normal(Square::new(0, 0), Square::new(0, 1), false);
        gains.update(mv, 100);
        gains.update(mv, 50);
        // value[m] = sum / (count + 1)
        assert_eq!(gains.get(mv), 150 / 3);
    }

    #[test]
    fn gain_update_ignores_unknown_static_evals() {
        let mut tables = HistoryTables::default();
        let mv = Move::new_normal(Square::new(0, 0), Square::new(0, 1), false);
        tables.update_gain(mv, Value::NONE, Value::new(10));
        assert_eq!(tables.gains.get(mv), 0);
    }
}
