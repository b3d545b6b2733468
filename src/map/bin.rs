//! 桶布局与桶内操作
//!
//! 一个桶组由 `size` 条 64 字节行构成：第 0 行放 16 个键，
//! 其后每行放全部条目的同一个数据字（列主序），条目 *i* 的数据
//! 始终位于各数据行的槽位 *i*。键行内占用槽从偏移 0 起连续存放、
//! 按键严格升序；尾部空槽一律写哨兵 [`INF`]，数据清零。

use crate::memory::{MemContext, MemHandle};
use crate::types::DATA_MAXSIZE;
use std::sync::Arc;

/// 行对齐（字节）
pub const ALIGNMENT: usize = 64;

/// 每桶键槽数
pub const BIN_SIZE: usize = ALIGNMENT / 4;

/// 空槽哨兵；该值本身的存储走旁路通道
pub const INF: u32 = 0xffff_ffff;

/// 一条缓存行
#[derive(Clone, Copy)]
#[repr(C, align(64))]
pub struct BinRow(pub [u32; BIN_SIZE]);

/// 键加数据字的临时条目缓冲，置换与滚动期间使用
pub(crate) struct Entry {
    pub(crate) key: u32,
    words: [u32; DATA_MAXSIZE],
}

impl Entry {
    pub(crate) fn blank() -> Self {
        Self {
            key: INF,
            words: [0; DATA_MAXSIZE],
        }
    }

    pub(crate) fn data(&self, words: usize) -> &[u32] {
        &self.words[..words]
    }
}

/// 桶数组 - 行经记账分配器借出，Drop 时归还
pub(crate) struct BinArray {
    rows: Vec<BinRow>,
    bins: u32,
    size: u32,
    ctx: Arc<MemContext>,
    handle: Arc<MemHandle>,
}

impl BinArray {
    /// 借出并初始化 `bins` 个桶组，每组 `size` 行
    pub(crate) fn reuse(
        ctx: &Arc<MemContext>,
        handle: &Arc<MemHandle>,
        bins: u32,
        size: u32,
    ) -> Self {
        let total = bins as usize * size as usize;
        ctx.reuse(handle, total as u64);
        let mut rows = vec![BinRow([0; BIN_SIZE]); total];
        let mut i = 0;
        while i < total {
            rows[i] = BinRow([INF; BIN_SIZE]);
            i += size as usize;
        }
        Self {
            rows,
            bins,
            size,
            ctx: Arc::clone(ctx),
            handle: Arc::clone(handle),
        }
    }

    #[inline]
    pub(crate) fn bins(&self) -> u32 {
        self.bins
    }

    #[inline]
    pub(crate) fn data_words(&self) -> usize {
        (self.size - 1) as usize
    }

    pub(crate) fn handle(&self) -> &Arc<MemHandle> {
        &self.handle
    }

    pub(crate) fn ctx(&self) -> &Arc<MemContext> {
        &self.ctx
    }

    #[inline]
    fn key_row(&self, base: u32) -> &[u32; BIN_SIZE] {
        &self.rows[base as usize * self.size as usize].0
    }

    #[inline]
    fn key_row_mut(&mut self, base: u32) -> &mut [u32; BIN_SIZE] {
        &mut self.rows[base as usize * self.size as usize].0
    }

    #[inline]
    fn data_row(&self, base: u32, word: usize) -> &[u32; BIN_SIZE] {
        &self.rows[base as usize * self.size as usize + 1 + word].0
    }

    #[inline]
    fn data_row_mut(&mut self, base: u32, word: usize) -> &mut [u32; BIN_SIZE] {
        &mut self.rows[base as usize * self.size as usize + 1 + word].0
    }

    #[inline]
    pub(crate) fn key(&self, base: u32, offset: usize) -> u32 {
        self.key_row(base)[offset]
    }

    #[inline]
    pub(crate) fn set_key(&mut self, base: u32, offset: usize, key: u32) {
        self.key_row_mut(base)[offset] = key;
    }

    /// 桶尾空闲即可再收一个条目
    #[inline]
    pub(crate) fn tail_free(&self, base: u32) -> bool {
        self.key(base, BIN_SIZE - 1) == INF
    }

    pub(crate) fn data_copy_out(&self, base: u32, offset: usize, out: &mut [u32]) {
        for (word, dst) in out.iter_mut().enumerate() {
            *dst = self.data_row(base, word)[offset];
        }
    }

    pub(crate) fn data_store(&mut self, base: u32, offset: usize, src: &[u32]) {
        for (word, &value) in src.iter().enumerate() {
            self.data_row_mut(base, word)[offset] = value;
        }
    }

    pub(crate) fn data_clear(&mut self, base: u32, offset: usize) {
        for word in 0..self.data_words() {
            self.data_row_mut(base, word)[offset] = 0;
        }
    }

    pub(crate) fn data_is_clear(&self, base: u32, offset: usize) -> bool {
        (0..self.data_words()).all(|word| self.data_row(base, word)[offset] == 0)
    }

    pub(crate) fn entry_copy(&self, base: u32, offset: usize, dst: &mut Entry) {
        dst.key = self.key(base, offset);
        for word in 0..self.data_words() {
            dst.words[word] = self.data_row(base, word)[offset];
        }
    }

    pub(crate) fn entry_paste(&mut self, src: &Entry, base: u32, offset: usize) {
        self.set_key(base, offset, src.key);
        for word in 0..self.data_words() {
            self.data_row_mut(base, word)[offset] = src.words[word];
        }
    }

    fn entry_move(&mut self, base: u32, src_offset: usize, dst_offset: usize) {
        let key = self.key(base, src_offset);
        self.set_key(base, dst_offset, key);
        for word in 0..self.data_words() {
            let value = self.data_row(base, word)[src_offset];
            self.data_row_mut(base, word)[dst_offset] = value;
        }
    }

    /// 桶内无分支二分查找
    ///
    /// 恰好四次比较，偏移计算不依赖数据分支；键是否命中由最终比对判定。
    #[inline]
    pub(crate) fn locate(&self, base: u32, key: u32) -> Option<usize> {
        debug_assert_ne!(key, INF);
        let row = self.key_row(base);
        let mut o = 0usize;
        o += usize::from(key >= row[o + 8]) << 3;
        o += usize::from(key >= row[o + 4]) << 2;
        o += usize::from(key >= row[o + 2]) << 1;
        o += usize::from(key >= row[o + 1]);
        if row[o] == key {
            return Some(o);
        }
        debug_assert!(row.iter().all(|&k| k != key));
        None
    }

    /// 尾插后向左滚动，恢复键升序
    pub(crate) fn roll_left(&mut self, base: u32, offset: usize) {
        let mut entry = Entry::blank();
        self.entry_copy(base, offset, &mut entry);
        let mut o = offset;
        while o > 0 && self.key(base, o - 1) >= entry.key {
            self.entry_move(base, o - 1, o);
            o -= 1;
        }
        self.entry_paste(&entry, base, o);
        debug_assert!(self.is_ordered(base));
    }

    /// 删除后向右滚动，把哨兵推到桶尾
    pub(crate) fn roll_right(&mut self, base: u32, offset: usize) {
        let mut entry = Entry::blank();
        self.entry_copy(base, offset, &mut entry);
        let mut o = offset;
        while o < BIN_SIZE - 1 && self.key(base, o + 1) <= entry.key {
            self.entry_move(base, o + 1, o);
            o += 1;
        }
        self.entry_paste(&entry, base, o);
        debug_assert!(self.is_ordered(base));
    }

    /// 原位换入新键后，向左或向右冒泡到有序位置，返回最终偏移
    pub(crate) fn adjust(&mut self, base: u32, offset: usize) -> usize {
        let mut o = offset;
        loop {
            let left_ok = o == 0 || self.key(base, o - 1) < self.key(base, o);
            let right_ok = o == BIN_SIZE - 1 || self.key(base, o) < self.key(base, o + 1);
            if left_ok && right_ok {
                return o;
            }
            let next = if left_ok { o + 1 } else { o - 1 };
            let mut entry = Entry::blank();
            self.entry_copy(base, o, &mut entry);
            self.entry_move(base, next, o);
            self.entry_paste(&entry, base, next);
            o = next;
        }
    }

    /// 桶内占用槽数；占用槽从偏移 0 起连续
    pub(crate) fn count(&self, base: u32) -> usize {
        self.key_row(base)
            .iter()
            .position(|&k| k == INF)
            .unwrap_or(BIN_SIZE)
    }

    /// 校验桶不变式：前缀严格升序，尾部全为哨兵且数据清零
    pub(crate) fn is_ordered(&self, base: u32) -> bool {
        let row = self.key_row(base);
        let live = self.count(base);
        for o in 1..live {
            if row[o - 1] >= row[o] {
                return false;
            }
        }
        (live..BIN_SIZE).all(|o| row[o] == INF && self.data_is_clear(base, o))
    }
}

impl Clone for BinArray {
    fn clone(&self) -> Self {
        self.ctx.reuse(&self.handle, self.rows.len() as u64);
        Self {
            rows: self.rows.clone(),
            bins: self.bins,
            size: self.size,
            ctx: Arc::clone(&self.ctx),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl Drop for BinArray {
    fn drop(&mut self) {
        self.ctx.recycle(&self.handle, self.rows.len() as u64);
    }
}
