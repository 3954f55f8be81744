//! ランク別ワーカー重み表
//!
//! プレサーチの上位1位の分岐は2〜7位の分岐より多くのスレッドを割り当てられ、
//! 2〜7位の分岐はキャッチオールより多くのスレッドを割り当てられる。
//! ハードコードの3/2/1ではなくテーブルにしておくことで、ワーカー数を
//! 変えたテストを書ける。

#[derive(Debug, Clone)]
pub struct WeightTable {
    /// depth-1の最上位分岐 (rank 0) に割り当てるスレッド数
    best: u32,
    /// depth-1の2〜7位分岐に割り当てるスレッド数
    middle: u32,
    /// キャッチオール分岐に割り当てるスレッド数
    catch_all: u32,
}

impl Default for WeightTable {
    fn default() -> WeightTable {
        WeightTable { best: 4, middle: 2, catch_all: 1 }
    }
}

impl WeightTable {
    pub fn new(best: u32, middle: u32, catch_all: u32) -> WeightTable {
        WeightTable { best, middle, catch_all }
    }

    /// `rank`はdepth-1での順位(0が最善)。`None`はキャッチオール系統のリーフ。
    pub fn threads_for_rank(&self, rank: Option<usize>) -> u32 {
        match rank {
            None => self.catch_all,
            Some(0) => self.best,
            Some(_) => self.middle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_orders_best_above_middle_above_catch_all() {
        let table = WeightTable::default();
        assert!(table.threads_for_rank(Some(0)) > table.threads_for_rank(Some(1)));
        assert!(table.threads_for_rank(Some(3)) > table.threads_for_rank(None));
    }

    #[test]
    fn custom_table_is_honored_verbatim() {
        let table = WeightTable::new(8, 1, 1);
        assert_eq!(table.threads_for_rank(Some(0)), 8);
        assert_eq!(table.threads_for_rank(Some(5)), 1);
        assert_eq!(table.threads_for_rank(None), 1);
    }
}
