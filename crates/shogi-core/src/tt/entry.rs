//! 置換表の1エントリ
//!
//! 複数スレッドから同時に読み書きされるため、ロックは持たない。
//! Hyattのlockless hashing(XORトリック)を使う: キーと本体(16byteパック)を
//! 別々のアトミックワードに保存するとき、本体語をキー語にXORして保存し、
//! 読み出し時に`stored_key ^ stored_data`を再計算したキーと照合する。
//! 2語の書き込み・読み出しはそれぞれ独立したアトミック操作であり対として
//! 不可分ではないため、読み取り中に別スレッドが書き込むとまれに偽陰性
//! （本当はヒットなのにキー不一致と判定される）が起こりうるが、偽陽性
//! （壊れたデータを正しいものとして使ってしまうこと）は起こらない。

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Bound, Depth, Move, Value};

const MOVE_SHIFT: u64 = 0;
const VALUE_SHIFT: u64 = 16;
const DEPTH_SHIFT: u64 = 32;
const BOUND_SHIFT: u64 = 40;
const PV_SHIFT: u64 = 42;
const GEN_SHIFT: u64 = 43;

const MOVE_MASK: u64 = 0xFFFF;
const VALUE_MASK: u64 = 0xFFFF << VALUE_SHIFT;
const DEPTH_MASK: u64 = 0xFF << DEPTH_SHIFT;
const BOUND_MASK: u64 = 0x3 << BOUND_SHIFT;
const PV_MASK: u64 = 1 << PV_SHIFT;
const GEN_MASK: u64 = 0xFF << GEN_SHIFT;

/// 静的評価値とMate-in-3探索済みフラグは、キーのXOR検証で守られる本体語とは
/// 別の補助語に置く。こちらは探索のヒューリスティックにしか使わないので、
/// 書き込みと読み出しがまれに噛み合わず古い値を読んでも実害はない。
const EVAL_SHIFT: u64 = 0;
const EVAL_MASK: u64 = 0xFFFF;
const MATE3_SHIFT: u64 = 16;
const MATE3_MASK: u64 = 1 << MATE3_SHIFT;

/// プローブ1回分のスナップショット。書き込み済みエントリの読み取り結果。
#[derive(Debug, Clone, Copy)]
pub struct TTData {
    pub value: Value,
    /// ノードの静的評価値。`save`時に未計算なら`Value::NONE`。
    pub static_eval: Value,
    pub depth: Depth,
    pub bound: Bound,
    pub mv: Move,
    pub is_pv: bool,
    pub generation: u8,
    /// この局面でMate-in-3探索をすでに試みたか（結果が詰みでなくても立つ）
    pub mate3_already_tried: bool,
}

fn pack(data: &TTData) -> u64 {
    let value_bits = (data.value.raw() as i16 as u16) as u64;
    let depth_bits = (data.depth.clamp(0, 255) as u64) & 0xFF;
    (data.mv.raw() as u64) << MOVE_SHIFT
        | value_bits << VALUE_SHIFT
        | depth_bits << DEPTH_SHIFT
        | ((data.bound as u64) << BOUND_SHIFT)
        | ((data.is_pv as u64) << PV_SHIFT)
        | ((data.generation as u64) << GEN_SHIFT)
}

fn pack_extra(data: &TTData) -> u64 {
    let eval_bits = (data.static_eval.raw() as i16 as u16) as u64;
    (eval_bits << EVAL_SHIFT) | ((data.mate3_already_tried as u64) << MATE3_SHIFT)
}

fn unpack(word: u64, extra: u64) -> TTData {
    let mv = Move::from_raw(((word & MOVE_MASK) >> MOVE_SHIFT) as u16);
    let value = Value::new((((word & VALUE_MASK) >> VALUE_SHIFT) as u16) as i16 as i32);
    let depth = ((word & DEPTH_MASK) >> DEPTH_SHIFT) as Depth;
    let bound = Bound::from_u8(((word & BOUND_MASK) >> BOUND_SHIFT) as u8);
    let is_pv = (word & PV_MASK) != 0;
    let generation = ((word & GEN_MASK) >> GEN_SHIFT) as u8;
    let static_eval = Value::new((((extra & EVAL_MASK) >> EVAL_SHIFT) as u16) as i16 as i32);
    let mate3_already_tried = (extra & MATE3_MASK) != 0;
    TTData { value, static_eval, depth, bound, mv, is_pv, generation, mate3_already_tried }
}

#[derive(Debug, Default)]
pub struct TTEntry {
    key_xor_data: AtomicU64,
    data: AtomicU64,
    extra: AtomicU64,
}

impl TTEntry {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.load(Ordering::Relaxed) == 0 && self.key_xor_data.load(Ordering::Relaxed) == 0
    }

    /// `key`と照合しつつ読み出す。キーが一致しなければ`None`。
    pub fn read(&self, key: u64) -> Option<TTData> {
        let data_word = self.data.load(Ordering::Acquire);
        let key_xor = self.key_xor_data.load(Ordering::Acquire);
        if data_word == 0 && key_xor == 0 {
            return None;
        }
        if key_xor ^ data_word != key {
            return None;
        }
        let extra = self.extra.load(Ordering::Relaxed);
        Some(unpack(data_word, extra))
    }

    /// 現在この枠に入っているデータの世代(ヒットの有無に関わらず)。置換判定に使う。
    pub fn relative_age(&self, current_generation: u8) -> u8 {
        let data_word = self.data.load(Ordering::Relaxed);
        let generation = ((data_word & GEN_MASK) >> GEN_SHIFT) as u8;
        current_generation.wrapping_sub(generation)
    }

    pub fn raw_depth(&self) -> Depth {
        let data_word = self.data.load(Ordering::Relaxed);
        ((data_word & DEPTH_MASK) >> DEPTH_SHIFT) as Depth
    }

    pub fn write(&self, key: u64, data: &TTData) {
        let word = pack(data);
        // extraを最初に書いておく。キー検証の対象外なので、読み手がdata/key_xorの
        // 検証を通過した直後にここを読んでも最新とは限らないが、静的評価値と
        // Mate-in-3フラグはヒューリスティックにしか使わないので許容する。
        self.extra.store(pack_extra(data), Ordering::Relaxed);
        // dataを先に書き、続けてXOR語を書く。読み手は逆順(data→key_xor)で読むため、
        // 書き込み途中に割り込んでも「両方古い」か「両方新しい」のどちらかになり、
        // 不一致の組み合わせはXOR検証で弾かれる。
        self.data.store(word, Ordering::Release);
        self.key_xor_data.store(key ^ word, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    #[test]
    fn write_then_read_round_trips_with_matching_key() {
        let entry = TTEntry::default();
        let data = TTData {
            value: Value::new(123),
            static_eval: Value::new(-45),
            depth: 6,
            bound: Bound::Exact,
            mv: Move::new_normal(Square::new(2, 2), Square::new(2, 3), false),
            is_pv: true,
            generation: 8,
            mate3_already_tried: true,
        };
        entry.write(0xDEAD_BEEF, &data);
        let read = entry.read(0xDEAD_BEEF).unwrap();
        assert_eq!(read.value, data.value);
        assert_eq!(read.static_eval, data.static_eval);
        assert_eq!(read.depth, data.depth);
        assert_eq!(read.bound, data.bound);
        assert_eq!(read.mv, data.mv);
        assert!(read.is_pv);
        assert!(read.mate3_already_tried);
    }

    #[test]
    fn mismatched_key_misses() {
        let entry = TTEntry::default();
        let data = TTData {
            value: Value::ZERO,
            static_eval: Value::NONE,
            depth: 1,
            bound: Bound::Lower,
            mv: Move::NONE,
            is_pv: false,
            generation: 0,
            mate3_already_tried: false,
        };
        entry.write(1, &data);
        assert!(entry.read(2).is_none());
    }
}
