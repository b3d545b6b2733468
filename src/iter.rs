//! 版本守护游标 - 对表的非拥有回引
//!
//! 游标持有建表时分配的进程唯一表 id 和复位瞬间捕获的版本号，
//! 不借用表本身；每次取值/前进都显式传入表引用。捕获版本与表当前
//! 版本不符即返回 [`IterError::Invalidated`]，复位后恢复可用。
//! 把游标用在别的表上属约定违规，直接终止。

use crate::error::IterError;
use crate::map::bin::{BIN_SIZE, INF};
use crate::map::BinMap;
use crate::memory::{MemContext, MemHandle, HANDLE_ITER};
use crate::types::Payload;
use std::sync::Arc;

/// 表游标，按 (桶, 偏移) 线性扫描，旁路通道最后
pub struct BinMapIter {
    table_id: u64,
    version: u64,
    base: u32,
    offset: usize,
    ctx: Arc<MemContext>,
    handle: Arc<MemHandle>,
}

impl BinMapIter {
    pub(crate) fn create(h: &BinMap) -> Self {
        let ctx = Arc::clone(h.ctx());
        let handle = ctx.acquire(HANDLE_ITER, std::mem::size_of::<Self>());
        ctx.reuse(&handle, 1);
        let mut iter = Self {
            table_id: h.id(),
            version: h.version(),
            base: 0,
            offset: 0,
            ctx,
            handle,
        };
        iter.reset(h);
        iter
    }

    fn guard_table(&self, h: &BinMap) {
        assert_eq!(self.table_id, h.id(), "游标用在了别的表上");
    }

    /// 复位到第一个条目并重新捕获版本
    pub fn reset(&mut self, h: &BinMap) {
        self.guard_table(h);
        self.version = h.version();
        self.base = 0;
        self.offset = 0;
        // 首个占用槽必在某个非空桶的偏移 0
        while self.base < h.bins() && h.bin_key(self.base, 0) == INF {
            self.base += 1;
        }
    }

    /// 取当前条目
    pub fn current(&self, h: &BinMap) -> Result<(u32, Payload), IterError> {
        self.guard_table(h);
        if self.version != h.version() {
            return Err(IterError::Invalidated);
        }
        if self.base < h.bins() {
            let key = h.bin_key(self.base, self.offset);
            if key == INF {
                return Err(IterError::Exhausted);
            }
            return Ok((key, h.payload_at(self.base, self.offset)));
        }
        if self.base == h.bins() && self.offset == 0 {
            if let Some(payload) = h.inf_payload() {
                return Ok((INF, payload));
            }
        }
        Err(IterError::Exhausted)
    }

    /// 前进到下一个占用槽
    pub fn forward(&mut self, h: &BinMap) -> Result<(), IterError> {
        self.guard_table(h);
        if self.version != h.version() {
            return Err(IterError::Invalidated);
        }
        self.offset += 1;
        if self.offset == BIN_SIZE {
            self.offset = 0;
            self.base += 1;
        }
        while self.base < h.bins() {
            // 占用槽连续：遇到哨兵即整桶扫完
            if h.bin_key(self.base, self.offset) != INF {
                return Ok(());
            }
            self.offset = 0;
            self.base += 1;
        }
        if self.base == h.bins() && self.offset == 0 && h.has_infdata() {
            return Ok(());
        }
        Err(IterError::Exhausted)
    }
}

impl Drop for BinMapIter {
    fn drop(&mut self) {
        self.ctx.recycle(&self.handle, 1);
    }
}
