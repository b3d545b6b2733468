//! 缓存行对齐的 32 位键 Cuckoo 哈希表
//!
//! 键为 `u32`，每条目可携带 0..=15 个 32 位数据字。桶与缓存行等宽
//! （16 键一桶），桶内查找是固定四次比较的无分支二分；常规查找只
//! 触达一到两条缓存行。插入走双哈希 cuckoo 置换，失败时按随机化
//! 因子扩容；删除后可按配置收缩；`rebuild` 支持按目标填充率重建。
//!
//! ## 快速开始
//!
//! ```rust
//! use cuckoo_binmap::BinMap;
//!
//! let mut map = BinMap::with_defaults();
//!
//! map.insert(7, &[42]).expect("插入失败");
//! assert_eq!(map.lookup(7).map(|d| d[0]), Some(42));
//!
//! map.update(7, &[99]).expect("更新失败");
//! assert_eq!(map.lookup(7).map(|d| d[0]), Some(99));
//!
//! map.delete(7).expect("删除失败");
//! assert!(map.lookup(7).is_none());
//! ```

#![warn(clippy::all)]

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{}};
}

// 核心模块
pub mod error;
pub mod hash;
pub mod iter;
pub mod map;
pub mod memory;
pub mod primes;
pub mod stats;
pub mod types;

// 公共接口导出
pub use crate::{
    error::{BinMapError, IterError},
    iter::BinMapIter,
    map::{BinMap, ALIGNMENT, BIN_SIZE, INF},
    memory::{default_context, MemContext, MemHandle},
    stats::TableStats,
    types::{BinMapConfig, Payload, DATA_MAXSIZE, RATIO_MIN},
};

use std::fmt;

impl fmt::Debug for BinMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinMap")
            .field("keys", &self.keys())
            .field("bins", &self.bins())
            .field("fill", &self.fill())
            .finish()
    }
}

/// 预配置的紧凑哈希表
///
/// 默认配置把 `lower` 设为 0.0，收缩因此永远不会触发；本包装使用
/// [`BinMapConfig::compact`]（lower = 0.05、upper = 0.95、depth = 4），
/// 批量删除后自动释放桶空间。
pub struct CompactMap {
    inner: BinMap,
}

impl CompactMap {
    /// 创建新紧凑哈希表
    pub fn new() -> Self {
        match BinMap::create(&BinMapConfig::compact()) {
            Ok(inner) => Self { inner },
            Err(_) => unreachable!("内置紧凑配置必定有效"),
        }
    }

    /// 获取内部哈希表引用
    pub fn inner(&self) -> &BinMap {
        &self.inner
    }

    /// 获取内部哈希表可变引用
    pub fn inner_mut(&mut self) -> &mut BinMap {
        &mut self.inner
    }
}

impl Default for CompactMap {
    fn default() -> Self {
        Self::new()
    }
}

/// 批量插入，返回成功条数
pub fn batch_insert<'a, I>(map: &mut BinMap, items: I) -> usize
where
    I: IntoIterator<Item = (u32, &'a [u32])>,
{
    let mut count = 0;
    for (key, data) in items {
        if map.insert(key, data).is_ok() {
            count += 1;
        }
    }
    count
}

/// 批量查询
pub fn batch_lookup<I>(map: &BinMap, keys: I) -> Vec<Option<Payload>>
where
    I: IntoIterator<Item = u32>,
{
    keys.into_iter().map(|key| map.lookup(key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_helpers() {
        let mut map = BinMap::with_defaults();
        let data = [1u32];
        let inserted = batch_insert(&mut map, [(1, &data[..]), (2, &data[..]), (1, &data[..])]);
        assert_eq!(inserted, 2);
        let found = batch_lookup(&map, [1, 2, 3]);
        assert!(found[0].is_some());
        assert!(found[1].is_some());
        assert!(found[2].is_none());
    }

    #[test]
    fn test_compact_map_shrinks() {
        let mut map = CompactMap::new();
        for key in 0..5_000u32 {
            map.inner_mut().insert(key, &[key]).unwrap();
        }
        let bins_full = map.inner().bins();
        for key in 64..5_000u32 {
            map.inner_mut().delete(key).unwrap();
        }
        assert!(map.inner().bins() < bins_full);
        assert_eq!(map.inner().keys(), 64);
    }

    #[test]
    fn test_debug_format() {
        let map = BinMap::with_defaults();
        let text = format!("{:?}", map);
        assert!(text.contains("keys"));
        assert!(text.contains("bins"));
    }
}
