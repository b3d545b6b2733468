//! 表统计 - 占用直方图与主桶驻留
//!
//! `hist[c]` 统计恰好有 c 个占用槽的桶数；`primary` 统计住在自己
//! 主桶里的键数。两者共同刻画单次内存访问即可命中的查找比例。

use crate::map::bin::BIN_SIZE;
use std::fmt;

/// 统计报表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    /// 按占用槽数分桶的直方图，下标 0..=16
    pub hist: [u32; BIN_SIZE + 1],
    /// 驻留主桶的键数
    pub primary: u32,
}

impl Default for TableStats {
    fn default() -> Self {
        Self {
            hist: [0; BIN_SIZE + 1],
            primary: 0,
        }
    }
}

impl TableStats {
    /// 直方图覆盖的桶总数
    pub fn bins(&self) -> u32 {
        self.hist.iter().sum()
    }

    /// 桶内条目总数（不含旁路通道）
    pub fn occupied(&self) -> u64 {
        self.hist
            .iter()
            .enumerate()
            .map(|(count, &bins)| count as u64 * u64::from(bins))
            .sum()
    }

    /// 主桶驻留比例，空表为 0
    pub fn primary_ratio(&self) -> f64 {
        let occupied = self.occupied();
        if occupied == 0 {
            return 0.0;
        }
        f64::from(self.primary) / occupied as f64
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bins = self.bins().max(1);
        write!(f, "histogram:")?;
        for &count in &self.hist {
            write!(f, " {:5.2}%", 100.0 * f64::from(count) / f64::from(bins))?;
        }
        write!(
            f,
            "\nprimary: {} ({:.2}%)",
            self.primary,
            100.0 * self.primary_ratio()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = TableStats::default();
        assert_eq!(stats.bins(), 0);
        assert_eq!(stats.occupied(), 0);
        assert_eq!(stats.primary_ratio(), 0.0);
    }

    #[test]
    fn test_occupancy_tally() {
        let mut stats = TableStats::default();
        stats.hist[0] = 3;
        stats.hist[2] = 4;
        stats.hist[16] = 1;
        stats.primary = 20;
        assert_eq!(stats.bins(), 8);
        assert_eq!(stats.occupied(), 2 * 4 + 16);
        assert!((stats.primary_ratio() - 20.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_display_renders_percentages() {
        let mut stats = TableStats::default();
        stats.hist[1] = 10;
        stats.primary = 10;
        let text = stats.to_string();
        assert!(text.contains("histogram:"));
        assert!(text.contains("primary: 10"));
    }
}
