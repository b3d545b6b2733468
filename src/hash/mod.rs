//! 哈希模块 - 键到桶位置的映射

pub mod avalanche;

pub use avalanche::{full_avalanche, half_avalanche};

/// 键的主桶索引
#[inline]
pub fn primary_bin(key: u32, bins: u32) -> u32 {
    full_avalanche(key) % bins
}

/// 键的副桶索引
#[inline]
pub fn secondary_bin(key: u32, bins: u32) -> u32 {
    half_avalanche(key) % bins
}
