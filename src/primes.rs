//! 素数表 - 桶数量只取素数，按索引单调递增
//!
//! 表按需向后延伸并缓存，查询摊还 O(1)。索引 i 对应从 2 开始的第 i 个素数。

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static TABLE: Lazy<Mutex<Vec<u32>>> =
    Lazy::new(|| Mutex::new(vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37]));

fn is_prime(n: u32) -> bool {
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u32;
    while (d as u64) * (d as u64) <= n as u64 {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// 第 `index` 个素数
pub fn index_to_number(index: u32) -> u32 {
    let mut table = TABLE.lock();
    while table.len() <= index as usize {
        let mut cand = table[table.len() - 1] + 2;
        while !is_prime(cand) {
            cand += 2;
        }
        table.push(cand);
    }
    table[index as usize]
}
