//! 置換表の境界種別（Bound）

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Bound {
    /// エントリなし
    None = 0,
    /// 下限（fail-high、実際のスコアは記録値以上）
    Lower = 1,
    /// 上限（fail-low、実際のスコアは記録値以下）
    Upper = 2,
    /// 確定値（PVノードで全幅探索した結果）
    Exact = 3,
}

impl Bound {
    #[inline]
    pub const fn from_u8(v: u8) -> Bound {
        match v {
            1 => Bound::Lower,
            2 => Bound::Upper,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }

    /// NonPVノードでのカットオフ判定: 記録された境界が現在の窓に対してカットを許すか
    #[inline]
    pub const fn allows_cutoff(self, value_ge_beta: bool) -> bool {
        match self {
            Bound::Exact => true,
            Bound::Lower => value_ge_beta,
            Bound::Upper => !value_ge_beta,
            Bound::None => false,
        }
    }
}
