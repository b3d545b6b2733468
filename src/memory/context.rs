//! 记账分配器 - 具名句柄跟踪对象的借出与归还
//!
//! 句柄绑定固定对象尺寸，记录 `reused`（累计借出）、`recycled`（累计归还）
//! 与 `maxusage`（峰值在用量）。退出前 `verify` 要求每个句柄两数相等，
//! 不平衡即视为泄漏并终止进程。上下文可注入；进程级默认实例支持
//! `reset` 以隔离测试。

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 致命错误回调，诊断信息经由它输出后进程终止
pub type ErrorHook = Box<dyn Fn(&str) + Send + Sync>;

/// 某一对象尺寸的记账句柄
pub struct MemHandle {
    id: &'static str,
    object_size: usize,
    reused: AtomicU64,
    recycled: AtomicU64,
    maxusage: AtomicU64,
}

impl MemHandle {
    fn new(id: &'static str, object_size: usize) -> Self {
        Self {
            id,
            object_size,
            reused: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            maxusage: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn object_size(&self) -> usize {
        self.object_size
    }

    /// 累计借出对象数
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    /// 累计归还对象数
    pub fn recycled(&self) -> u64 {
        self.recycled.load(Ordering::Relaxed)
    }

    /// 峰值在用对象数
    pub fn maxusage(&self) -> u64 {
        self.maxusage.load(Ordering::Relaxed)
    }

    /// 当前在用对象数
    pub fn in_use(&self) -> u64 {
        self.reused() - self.recycled()
    }
}

/// 分配器上下文
///
/// 表、桶数组与迭代器各持有自己的句柄；上下文经 `Arc` 注入，
/// 便于在测试里使用独立实例。
pub struct MemContext {
    handles: Mutex<Vec<Arc<MemHandle>>>,
    hook: ErrorHook,
}

impl MemContext {
    /// 使用默认错误回调（stderr 诊断）创建上下文
    pub fn new() -> Arc<Self> {
        Self::with_error_hook(Box::new(|msg| eprintln!("{}", msg)))
    }

    /// 使用自定义错误回调创建上下文
    pub fn with_error_hook(hook: ErrorHook) -> Arc<Self> {
        Arc::new(Self {
            handles: Mutex::new(Vec::new()),
            hook,
        })
    }

    /// 取得（或登记）具名句柄
    ///
    /// 同名句柄共享计数；同名但对象尺寸不同属约定违规。
    pub fn acquire(&self, id: &'static str, object_size: usize) -> Arc<MemHandle> {
        let mut handles = self.handles.lock();
        if let Some(h) = handles.iter().find(|h| h.id == id).cloned() {
            drop(handles);
            if h.object_size != object_size {
                self.fatal(&format!(
                    "记账句柄 \"{}\" 以不同对象尺寸重复登记: {} != {}",
                    id, h.object_size, object_size
                ));
            }
            return h;
        }
        let h = Arc::new(MemHandle::new(id, object_size));
        handles.push(Arc::clone(&h));
        h
    }

    /// 记录借出 `n` 个对象
    pub fn reuse(&self, handle: &MemHandle, n: u64) {
        if n == 0 {
            self.fatal(&format!("记账句柄 \"{}\" 零对象借出", handle.id));
        }
        let reused = handle.reused.fetch_add(n, Ordering::Relaxed) + n;
        let usage = reused - handle.recycled.load(Ordering::Relaxed);
        handle.maxusage.fetch_max(usage, Ordering::Relaxed);
    }

    /// 记录归还 `n` 个对象
    pub fn recycle(&self, handle: &MemHandle, n: u64) {
        if n == 0 {
            self.fatal(&format!("记账句柄 \"{}\" 零对象归还", handle.id));
        }
        let recycled = handle.recycled.fetch_add(n, Ordering::Relaxed) + n;
        if recycled > handle.reused.load(Ordering::Relaxed) {
            self.fatal(&format!("记账句柄 \"{}\" 归还量超过借出量", handle.id));
        }
    }

    /// 泄漏检查 - 每个句柄必须 reused == recycled
    pub fn verify(&self) {
        let leaked: Vec<Arc<MemHandle>> = {
            let handles = self.handles.lock();
            handles.iter().filter(|h| h.in_use() != 0).cloned().collect()
        };
        if !leaked.is_empty() {
            let mut msg = String::from("退出前仍有未归还对象:\n");
            for h in &leaked {
                let _ = writeln!(
                    msg,
                    "  \"{}\": reused = {}, recycled = {}",
                    h.id,
                    h.reused(),
                    h.recycled()
                );
            }
            self.fatal(&msg);
        }
    }

    /// 清空全部句柄（仅用于测试隔离）
    pub fn reset(&self) {
        self.handles.lock().clear();
    }

    /// 当前句柄快照
    pub fn handles(&self) -> Vec<Arc<MemHandle>> {
        self.handles.lock().clone()
    }

    /// 生成记账报表
    pub fn report(&self) -> String {
        let handles = self.handles.lock();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>10} {:>12} {:>12} {:>10}",
            "id", "size", "current", "reused", "recycled", "maxusage"
        );
        let (mut reused, mut recycled, mut maxusage) = (0u64, 0u64, 0u64);
        for h in handles.iter() {
            let _ = writeln!(
                out,
                "{:<20} {:>8} {:>10} {:>12} {:>12} {:>10}",
                h.id,
                h.object_size,
                h.in_use(),
                h.reused(),
                h.recycled(),
                h.maxusage()
            );
            reused += h.reused();
            recycled += h.recycled();
            maxusage += h.maxusage();
        }
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>10} {:>12} {:>12} {:>10}",
            "total",
            "-",
            reused - recycled,
            reused,
            recycled,
            maxusage
        );
        out
    }

    fn fatal(&self, msg: &str) -> ! {
        crate::log_error!("{}", msg);
        (self.hook)(msg);
        std::process::abort();
    }
}

/// 进程级默认上下文
pub fn default_context() -> Arc<MemContext> {
    static DEFAULT: Lazy<Arc<MemContext>> = Lazy::new(MemContext::new);
    Arc::clone(&DEFAULT)
}
