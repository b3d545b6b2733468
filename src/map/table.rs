//! 哈希表核心 - 公共操作与扩缩容引擎
//!
//! 查找路径最多触达两条缓存行：主桶键行，未命中再看副桶键行。
//! 插入可能触发 cuckoo 置换，置换失败进入扩容循环；删除后填充率
//! 跌破下限则尝试收缩。所有可观测的变更都使 `version` 递增一次，
//! 迭代器据此失效。

use super::bin::{BinArray, BinRow, BIN_SIZE, INF};
use super::place::place;
use crate::error::BinMapError;
use crate::hash::{primary_bin, secondary_bin};
use crate::iter::BinMapIter;
use crate::memory::{default_context, MemContext, MemHandle, HANDLE_BIN, HANDLE_TABLE};
use crate::stats::TableStats;
use crate::types::{BinMapConfig, Payload, DATA_MAXSIZE, RATIO_MIN};
use crate::{log_debug, primes};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// 覆盖 `keys` 个键所需的最小素数索引
fn keys_to_prix(keys: u64) -> u32 {
    let mut prix = 0u32;
    while u64::from(primes::index_to_number(prix)) * (BIN_SIZE as u64) < keys {
        prix += 1;
    }
    prix
}

/// 缓存行对齐的 32 位键 cuckoo 哈希表
pub struct BinMap {
    arr: BinArray,
    prix: u32,
    keys: u32,
    size: u32,
    depth: u32,
    min: u32,
    max: u32,
    lower: f64,
    upper: f64,
    growth: f64,
    attempt: f64,
    random: f64,
    version: u64,
    infdata: Option<[u32; DATA_MAXSIZE]>,
    id: u64,
    ctx: Arc<MemContext>,
    table_handle: Arc<MemHandle>,
}

impl BinMap {
    /// 按配置建表，使用进程级默认记账上下文
    pub fn create(conf: &BinMapConfig) -> Result<Self, BinMapError> {
        Self::create_in(conf, default_context())
    }

    /// 按配置建表，记账走注入的上下文
    pub fn create_in(conf: &BinMapConfig, ctx: Arc<MemContext>) -> Result<Self, BinMapError> {
        conf.validate()?;
        Ok(Self::build(conf, ctx))
    }

    /// 默认配置建表
    pub fn with_defaults() -> Self {
        Self::build(&BinMapConfig::default(), default_context())
    }

    fn build(conf: &BinMapConfig, ctx: Arc<MemContext>) -> Self {
        let table_handle = ctx.acquire(HANDLE_TABLE, std::mem::size_of::<Self>());
        let bin_handle = ctx.acquire(HANDLE_BIN, std::mem::size_of::<BinRow>());
        ctx.reuse(&table_handle, 1);

        let prix = keys_to_prix(u64::from(conf.start));
        let bins = primes::index_to_number(prix);
        let size = conf.data + 1;
        let arr = BinArray::reuse(&ctx, &bin_handle, bins, size);

        Self {
            arr,
            prix,
            keys: 0,
            size,
            depth: conf.depth,
            min: INF,
            max: 0,
            lower: conf.lower,
            upper: conf.upper,
            growth: conf.growth,
            attempt: conf.attempt,
            random: conf.random,
            version: 0,
            infdata: None,
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            ctx,
            table_handle,
        }
    }

    /// 当前键数（含旁路通道）
    pub fn keys(&self) -> u32 {
        self.keys
    }

    /// 当前桶数
    pub fn bins(&self) -> u32 {
        self.arr.bins()
    }

    /// 自上次重建以来观测到的最小键
    ///
    /// 删除不收紧极值；重建或清空时重置。
    pub fn min(&self) -> u32 {
        self.min
    }

    /// 自上次重建以来观测到的最大键
    pub fn max(&self) -> u32 {
        self.max
    }

    /// 每条目数据字数
    pub fn data_words(&self) -> usize {
        self.arr.data_words()
    }

    /// 填充率 keys / (bins * 16)
    pub fn fill(&self) -> f64 {
        f64::from(self.keys) / (f64::from(self.arr.bins()) * BIN_SIZE as f64)
    }

    /// 变更版本号，迭代器失效的外部见证
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn ctx(&self) -> &Arc<MemContext> {
        &self.ctx
    }

    pub(crate) fn bin_key(&self, base: u32, offset: usize) -> u32 {
        self.arr.key(base, offset)
    }

    pub(crate) fn payload_at(&self, base: u32, offset: usize) -> Payload {
        let words = self.arr.data_words();
        let mut buf = [0u32; DATA_MAXSIZE];
        self.arr.data_copy_out(base, offset, &mut buf[..words]);
        Payload::from_slice(&buf[..words])
    }

    pub(crate) fn has_infdata(&self) -> bool {
        self.infdata.is_some()
    }

    pub(crate) fn inf_payload(&self) -> Option<Payload> {
        let words = self.arr.data_words();
        self.infdata
            .as_ref()
            .map(|data| Payload::from_slice(&data[..words]))
    }

    fn ttl(&self) -> u32 {
        self.depth.min(self.arr.bins())
    }

    fn note_key(&mut self, key: u32) {
        if key < self.min {
            self.min = key;
        }
        if key > self.max {
            self.max = key;
        }
    }

    /// 主桶、副桶两次桶内查找
    fn locate(&self, key: u32) -> Option<(u32, usize)> {
        let base = primary_bin(key, self.arr.bins());
        if let Some(offset) = self.arr.locate(base, key) {
            return Some((base, offset));
        }
        let base = secondary_bin(key, self.arr.bins());
        self.arr.locate(base, key).map(|offset| (base, offset))
    }

    /// 插入 (key, data)；键已存在时拒绝
    ///
    /// `data` 长度必须等于建表配置的数据字数。
    pub fn insert(&mut self, key: u32, data: &[u32]) -> Result<(), BinMapError> {
        assert_eq!(data.len(), self.arr.data_words(), "数据宽度与建表配置不符");

        if key == INF {
            if self.infdata.is_some() {
                return Err(BinMapError::KeyExists { key });
            }
            let mut buf = [0u32; DATA_MAXSIZE];
            buf[..data.len()].copy_from_slice(data);
            self.infdata = Some(buf);
            self.note_key(key);
            self.keys += 1;
            self.version += 1;
            return Ok(());
        }

        if self.locate(key).is_some() {
            return Err(BinMapError::KeyExists { key });
        }

        let projected = f64::from(self.keys + 1) / (f64::from(self.arr.bins()) * BIN_SIZE as f64);
        let ttl = self.ttl();
        if projected <= self.upper && place(&mut self.arr, key, data, ttl) {
            self.note_key(key);
            self.keys += 1;
            self.version += 1;
            return Ok(());
        }

        // 视同放置失败：扩容后重新安置全部条目
        self.grow(key, data);
        self.version += 1;
        Ok(())
    }

    /// 删除键；键不存在时拒绝
    pub fn delete(&mut self, key: u32) -> Result<(), BinMapError> {
        if key == INF {
            if self.infdata.take().is_none() {
                return Err(BinMapError::KeyNotFound { key });
            }
            self.keys -= 1;
            self.version += 1;
            if self.keys == 0 {
                self.min = INF;
                self.max = 0;
            }
            return Ok(());
        }

        let Some((base, offset)) = self.locate(key) else {
            return Err(BinMapError::KeyNotFound { key });
        };
        self.arr.set_key(base, offset, INF);
        self.arr.data_clear(base, offset);
        self.arr.roll_right(base, offset);
        self.keys -= 1;
        self.version += 1;
        if self.keys == 0 {
            self.min = INF;
            self.max = 0;
        }

        if self.shrinkable() {
            self.shrink();
        }
        Ok(())
    }

    /// 查找键，命中返回数据拷贝
    pub fn lookup(&self, key: u32) -> Option<Payload> {
        if key == INF {
            return self.inf_payload();
        }
        let (base, offset) = self.locate(key)?;
        Some(self.payload_at(base, offset))
    }

    /// 原位更新既有键的数据；键不存在时拒绝
    pub fn update(&mut self, key: u32, data: &[u32]) -> Result<(), BinMapError> {
        assert_eq!(data.len(), self.arr.data_words(), "数据宽度与建表配置不符");

        if key == INF {
            match self.infdata.as_mut() {
                Some(buf) => {
                    buf[..data.len()].copy_from_slice(data);
                    self.version += 1;
                    Ok(())
                }
                None => Err(BinMapError::KeyNotFound { key }),
            }
        } else {
            let Some((base, offset)) = self.locate(key) else {
                return Err(BinMapError::KeyNotFound { key });
            };
            self.arr.data_store(base, offset, data);
            self.version += 1;
            Ok(())
        }
    }

    /// 把全部条目重新安置到 `prix` 对应的新桶数组
    ///
    /// `pending` 是触发本次重建的待插条目，最先安置。任何放置失败都
    /// 放弃新数组并保持现状；成功则提交新数组并重算 keys 与极值。
    fn repack(&mut self, prix: u32, pending: Option<(u32, &[u32])>) -> bool {
        let bins = primes::index_to_number(prix);
        let mut fresh = BinArray::reuse(self.arr.ctx(), self.arr.handle(), bins, self.size);
        let ttl = self.depth.min(bins);

        let mut keys = 0u32;
        let mut min = INF;
        let mut max = 0u32;
        if self.infdata.is_some() {
            keys = 1;
            max = INF;
        }

        if let Some((key, data)) = pending {
            if !place(&mut fresh, key, data, ttl) {
                return false;
            }
            if key < min {
                min = key;
            }
            if key > max {
                max = key;
            }
            keys += 1;
        }

        let words = self.arr.data_words();
        let mut buf = [0u32; DATA_MAXSIZE];
        for base in 0..self.arr.bins() {
            for offset in 0..BIN_SIZE {
                let key = self.arr.key(base, offset);
                if key == INF {
                    break;
                }
                self.arr.data_copy_out(base, offset, &mut buf[..words]);
                if !place(&mut fresh, key, &buf[..words], ttl) {
                    return false;
                }
                if key < min {
                    min = key;
                }
                if key > max {
                    max = key;
                }
                keys += 1;
            }
        }

        self.arr = fresh;
        self.prix = prix;
        self.keys = keys;
        self.min = min;
        self.max = max;
        true
    }

    /// 扩容循环 - 放大素数索引直到全部条目安置成功
    ///
    /// 噪声项使桶数不可预测，避免同一插入模式反复撞上冲突桶数。
    fn grow(&mut self, key: u32, data: &[u32]) {
        let old_prix = self.prix;
        let old_bins = self.arr.bins();
        let mut attempt = 1u32;
        loop {
            let factor = self.growth
                + self.attempt * f64::from(attempt)
                + self.random * rand::random::<f64>();
            let scaled = (f64::from(old_prix) * factor) as u32;
            let prix = scaled.max(old_prix + attempt);
            if self.repack(prix, Some((key, data))) {
                log_debug!(
                    "扩容: 桶 {} -> {} (第 {} 次尝试)",
                    old_bins,
                    self.arr.bins(),
                    attempt
                );
                return;
            }
            attempt += 1;
        }
    }

    fn shrinkable(&self) -> bool {
        self.keys as usize > BIN_SIZE && self.fill() < self.lower
    }

    /// 收缩 - 以阈值中点为目标填充率重建
    ///
    /// 收缩绝不把素数索引抬回收缩前的值；到达即放弃，保留现有数组。
    fn shrink(&mut self) {
        let old_prix = self.prix;
        let old_bins = self.arr.bins();
        let target = (self.upper + self.lower) / 2.0;
        let want = (f64::from(self.keys) / target).ceil() as u64;
        let mut prix = keys_to_prix(want);
        while prix < old_prix {
            if self.repack(prix, None) {
                log_debug!("收缩: 桶 {} -> {}", old_bins, self.arr.bins());
                return;
            }
            prix += 1;
        }
    }

    /// 以目标填充率重建表
    ///
    /// 高比率（如 1.0）用最少的桶表示现有键集；低比率换取更高的
    /// 主桶命中率（可用 [`BinMap::stats`] 检验）。比率范围 0.01..=1.0。
    pub fn rebuild(&mut self, ratio: f64) -> Result<(), BinMapError> {
        if !ratio.is_finite() || !(RATIO_MIN..=1.0).contains(&ratio) {
            return Err(BinMapError::InvalidConfig {
                reason: format!("重建比率 {} 超出 {}..=1.0", ratio, RATIO_MIN),
            });
        }
        let want = (f64::from(self.keys) / ratio) as u64;
        let mut prix = keys_to_prix(want);
        loop {
            if self.repack(prix, None) {
                log_debug!("重建: 比率 {:.2}, 桶 {}", ratio, self.arr.bins());
                self.version += 1;
                return Ok(());
            }
            prix += 1;
        }
    }

    /// 生成占用直方图与主桶驻留统计
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats::default();
        for base in 0..self.arr.bins() {
            let live = self.arr.count(base);
            stats.hist[live] += 1;
            for offset in 0..live {
                let key = self.arr.key(base, offset);
                if primary_bin(key, self.arr.bins()) == base {
                    stats.primary += 1;
                }
            }
        }
        stats
    }

    /// 对每个条目调用 `fun(key, data)`，旁路通道最后
    ///
    /// 借用检查保证回调无法改表；版本断言保底。
    pub fn apply<F: FnMut(u32, &[u32])>(&self, mut fun: F) {
        let version = self.version;
        let words = self.arr.data_words();
        let mut buf = [0u32; DATA_MAXSIZE];
        for base in 0..self.arr.bins() {
            for offset in 0..BIN_SIZE {
                let key = self.arr.key(base, offset);
                if key == INF {
                    break;
                }
                self.arr.data_copy_out(base, offset, &mut buf[..words]);
                fun(key, &buf[..words]);
                debug_assert_eq!(version, self.version, "回调不得修改表");
            }
        }
        if let Some(data) = &self.infdata {
            fun(INF, &data[..words]);
        }
    }

    /// 创建并复位一个游标
    pub fn iter(&self) -> BinMapIter {
        BinMapIter::create(self)
    }

    /// 校验内部不变式，仅测试使用
    #[doc(hidden)]
    pub fn assert_valid(&self) {
        let mut live = 0u64;
        for base in 0..self.arr.bins() {
            assert!(self.arr.is_ordered(base), "桶 {} 失序", base);
            let count = self.arr.count(base);
            live += count as u64;
            for offset in 0..count {
                let key = self.arr.key(base, offset);
                assert!(
                    primary_bin(key, self.arr.bins()) == base
                        || secondary_bin(key, self.arr.bins()) == base,
                    "键 {:#010x} 不在自己的主桶或副桶",
                    key
                );
            }
        }
        assert_eq!(
            u64::from(self.keys),
            live + u64::from(self.infdata.is_some()),
            "键计数与槽位不一致"
        );
    }
}

impl Clone for BinMap {
    /// 深拷贝 - 克隆与原表不共享任何子结构
    fn clone(&self) -> Self {
        self.ctx.reuse(&self.table_handle, 1);
        Self {
            arr: self.arr.clone(),
            prix: self.prix,
            keys: self.keys,
            size: self.size,
            depth: self.depth,
            min: self.min,
            max: self.max,
            lower: self.lower,
            upper: self.upper,
            growth: self.growth,
            attempt: self.attempt,
            random: self.random,
            version: self.version,
            infdata: self.infdata,
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            ctx: Arc::clone(&self.ctx),
            table_handle: Arc::clone(&self.table_handle),
        }
    }
}

impl Drop for BinMap {
    fn drop(&mut self) {
        self.ctx.recycle(&self.table_handle, 1);
    }
}
