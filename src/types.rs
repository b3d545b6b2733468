//! 核心类型定义 - 配置、负载缓冲与公共常量

use crate::error::BinMapError;
use std::fmt;
use std::ops::Deref;

/// 每条目最多可携带的数据字数（32 位字）
pub const DATA_MAXSIZE: usize = 15;

/// rebuild 支持的最小目标填充率
pub const RATIO_MIN: f64 = 0.01;

/// 表配置
///
/// 八个字段全部显式给出，不存在"省略尾部字段"的写法；
/// `Default` 提供推荐值。注意默认 `lower = 0.0` 意味着收缩永远不会触发，
/// 需要收缩的场景必须显式配置（或使用 [`BinMapConfig::compact`]）。
#[derive(Debug, Clone)]
pub struct BinMapConfig {
    /// 建表时预估的键数量，决定初始素数索引
    pub start: u32,
    /// 每条目数据字数，0..=15
    pub data: u32,
    /// cuckoo 置换的最大递归深度，常用 3..=5
    pub depth: u32,
    /// 填充率下限；删除后低于此值触发收缩
    pub lower: f64,
    /// 填充率上限；插入后将超过此值时先扩容
    pub upper: f64,
    /// 扩容时素数索引的基础增长倍率
    pub growth: f64,
    /// 每次重试追加的增长系数
    pub attempt: f64,
    /// 均匀 [0,1) 噪声项的系数，打散对抗性插入模式
    pub random: f64,
}

impl Default for BinMapConfig {
    fn default() -> Self {
        Self {
            start: 112,
            data: 1,
            depth: 3,
            lower: 0.0,
            upper: 1.0,
            growth: 1.5,
            attempt: 0.5,
            random: 0.5,
        }
    }
}

impl BinMapConfig {
    /// 紧凑预设 - 启用收缩并提高置换深度
    pub fn compact() -> Self {
        Self {
            depth: 4,
            lower: 0.05,
            upper: 0.95,
            ..Self::default()
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), BinMapError> {
        if self.data as usize > DATA_MAXSIZE {
            return Err(BinMapError::InvalidConfig {
                reason: format!("data = {} 超出上限 {}", self.data, DATA_MAXSIZE),
            });
        }
        if self.depth == 0 {
            return Err(BinMapError::InvalidConfig {
                reason: "depth 必须至少为 1".into(),
            });
        }
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(BinMapError::InvalidConfig {
                reason: "填充率阈值必须是有限值".into(),
            });
        }
        if !(0.0..1.0).contains(&self.lower) || self.upper > 1.0 || self.lower >= self.upper {
            return Err(BinMapError::InvalidConfig {
                reason: format!(
                    "阈值必须满足 0 <= lower < upper <= 1, 实际 lower = {}, upper = {}",
                    self.lower, self.upper
                ),
            });
        }
        for (name, v) in [
            ("growth", self.growth),
            ("attempt", self.attempt),
            ("random", self.random),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(BinMapError::InvalidConfig {
                    reason: format!("{} = {} 必须是非负有限值", name, v),
                });
            }
        }
        if self.growth < 1.0 {
            return Err(BinMapError::InvalidConfig {
                reason: format!("growth = {} 不得小于 1.0", self.growth),
            });
        }
        Ok(())
    }
}

/// 条目数据的栈上定长缓冲
///
/// 查找、迭代按值返回数据拷贝；宽度由建表配置决定。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    len: u32,
    words: [u32; DATA_MAXSIZE],
}

impl Payload {
    pub(crate) fn from_slice(src: &[u32]) -> Self {
        let mut words = [0u32; DATA_MAXSIZE];
        words[..src.len()].copy_from_slice(src);
        Self {
            len: src.len() as u32,
            words,
        }
    }

    /// 数据字切片
    pub fn as_slice(&self) -> &[u32] {
        &self.words[..self.len as usize]
    }

    /// 数据字数
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// data = 0 的表返回空负载
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for Payload {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        self.as_slice()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
