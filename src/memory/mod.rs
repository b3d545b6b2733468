//! 内存管理模块 - 记账分配器上下文

pub mod context;

pub use context::{default_context, ErrorHook, MemContext, MemHandle};

/// 表结构句柄名
pub const HANDLE_TABLE: &str = "binmap_table";
/// 桶数组句柄名（对象 = 一条 64 字节行）
pub const HANDLE_BIN: &str = "binmap_bin";
/// 迭代器句柄名
pub const HANDLE_ITER: &str = "binmap_iter";

/// 默认上下文的记账报表
pub fn report() -> String {
    default_context().report()
}

/// 默认上下文的泄漏检查
pub fn verify() {
    default_context().verify()
}
