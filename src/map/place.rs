//! cuckoo 放置引擎 - 有界递归置换
//!
//! 先试主桶尾、再试副桶尾；两者皆满时只挑"当前正驻留主桶"的占用者
//! 换出，被换出的键必然还有一个未试过的副桶可去，置换环因此很快断开，
//! 填充率也得以保持。递归预算 ttl 耗尽即失败，由扩容引擎接手。

use super::bin::{BinArray, Entry, BIN_SIZE};
use crate::hash::{primary_bin, secondary_bin};

/// 尝试把 (key, data) 放入数组，失败返回 false 且数组内容不变
pub(crate) fn place(arr: &mut BinArray, key: u32, data: &[u32], ttl: u32) -> bool {
    if ttl == 0 {
        return false;
    }

    let primary = primary_bin(key, arr.bins());
    if arr.tail_free(primary) {
        debug_assert!(arr.data_is_clear(primary, BIN_SIZE - 1));
        arr.set_key(primary, BIN_SIZE - 1, key);
        arr.data_store(primary, BIN_SIZE - 1, data);
        arr.roll_left(primary, BIN_SIZE - 1);
        return true;
    }

    let secondary = secondary_bin(key, arr.bins());
    if arr.tail_free(secondary) {
        debug_assert!(arr.data_is_clear(secondary, BIN_SIZE - 1));
        arr.set_key(secondary, BIN_SIZE - 1, key);
        arr.data_store(secondary, BIN_SIZE - 1, data);
        arr.roll_left(secondary, BIN_SIZE - 1);
        return true;
    }

    displace(arr, primary, key, data, ttl) || displace(arr, secondary, key, data, ttl)
}

/// 在已满的 `base` 桶里为 (key, data) 腾位
///
/// 逐个尝试以 `base` 为主桶的占用者：换入新条目、让占用者递归另寻
/// 住处；递归失败则恢复原状继续下一个候选。
fn displace(arr: &mut BinArray, base: u32, key: u32, data: &[u32], ttl: u32) -> bool {
    let words = arr.data_words();
    for offset in 0..BIN_SIZE {
        let cand_key = arr.key(base, offset);
        if primary_bin(cand_key, arr.bins()) != base {
            continue;
        }

        let mut cand = Entry::blank();
        arr.entry_copy(base, offset, &mut cand);

        arr.set_key(base, offset, key);
        arr.data_store(base, offset, data);
        let slot = arr.adjust(base, offset);

        if place(arr, cand.key, cand.data(words), ttl - 1) {
            return true;
        }

        // 候选者无处可去，恢复原状后尝试下一个
        debug_assert_eq!(arr.key(base, slot), key);
        arr.entry_paste(&cand, base, slot);
        let restored = arr.adjust(base, slot);
        debug_assert_eq!(restored, offset);
    }
    false
}
