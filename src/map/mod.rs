//! 哈希表核心模块 - 桶布局、放置引擎与表操作

pub mod bin;
pub(crate) mod place;
pub mod table;

pub use bin::{ALIGNMENT, BIN_SIZE, INF};
pub use table::BinMap;
