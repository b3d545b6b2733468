//! 统一错误处理 - 操作拒绝与迭代器状态

use thiserror::Error;

/// 表操作被拒绝时返回的错误
///
/// 这些都是可恢复的业务结果，不是程序缺陷；
/// 约定违规（分配器误用、迭代器用错表等）直接终止进程，不走此类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinMapError {
    #[error("键已存在: {key:#010x}")]
    KeyExists { key: u32 },

    #[error("键不存在: {key:#010x}")]
    KeyNotFound { key: u32 },

    #[error("无效配置: {reason}")]
    InvalidConfig { reason: String },
}

impl BinMapError {
    /// 获取错误恢复建议
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::KeyExists { .. } => "改用 update 覆盖既有数据",
            Self::KeyNotFound { .. } => "先 insert 再操作，或确认键值",
            Self::InvalidConfig { .. } => "检查配置参数范围",
        }
    }
}

/// 迭代器游标状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IterError {
    /// 游标已越过最后一个条目，或表为空
    #[error("迭代器已到达末尾")]
    Exhausted,

    /// 捕获版本与表当前版本不一致，需要 reset
    #[error("表已被修改，迭代器失效")]
    Invalidated,
}
