//! 整数雪崩混合器 - 两个独立的 32→32 位全域混合函数
//!
//! 常量取自 Bob Jenkins 的整数哈希集合
//! (<http://burtleburtle.net/bob/hash/integer.html>)。
//! `full_avalanche` 决定键的主桶，`half_avalanche` 决定副桶。

/// 全雪崩混合器 - 主桶哈希
#[inline]
pub fn full_avalanche(mut a: u32) -> u32 {
    a = a.wrapping_add(0x7ed5_5d16).wrapping_add(a << 12);
    a = (a ^ 0xc761_c23c) ^ (a >> 19);
    a = a.wrapping_add(0x1656_67b1).wrapping_add(a << 5);
    a = a.wrapping_add(0xd3a2_646c) ^ (a << 9);
    a = a.wrapping_add(0xfd70_46c5).wrapping_add(a << 3);
    a = (a ^ 0xb55a_4f09) ^ (a >> 16);
    a
}

/// 半雪崩混合器 - 副桶哈希
///
/// 入口先按位取反，保证与 `full_avalanche` 在整个键域上相互独立。
#[inline]
pub fn half_avalanche(mut a: u32) -> u32 {
    a = !a;
    a = a.wrapping_add(0x479a_b41d).wrapping_add(a << 8);
    a = (a ^ 0xe4aa_10ce) ^ (a >> 5);
    a = a.wrapping_add(0x9942_f0a6).wrapping_sub(a << 14);
    a = (a ^ 0x5aed_d67d) ^ (a >> 3);
    a = a.wrapping_add(0x17be_a992).wrapping_add(a << 7);
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_deterministic() {
        for key in [0u32, 1, 7, 0xdead_beef, u32::MAX] {
            assert_eq!(full_avalanche(key), full_avalanche(key));
            assert_eq!(half_avalanche(key), half_avalanche(key));
        }
    }

    #[test]
    fn test_mixers_independent() {
        // 两个混合器在同一键上必须产生不同输出（抽样验证）
        let mut rng = StdRng::seed_from_u64(42);
        let mut same = 0u32;
        for _ in 0..10_000 {
            let key: u32 = rng.gen();
            if full_avalanche(key) == half_avalanche(key) {
                same += 1;
            }
        }
        assert!(same < 4, "混合器输出重合过多: {}", same);
    }

    #[test]
    fn test_low_collision_rate() {
        // 连续键经混合后对小模数应接近均匀分布
        let bins = 97u32;
        let mut hist = vec![0u32; bins as usize];
        for key in 0..97_000u32 {
            hist[(full_avalanche(key) % bins) as usize] += 1;
        }
        let expect = 97_000 / bins;
        for &count in &hist {
            assert!(count > expect / 2 && count < expect * 2, "分布倾斜: {}", count);
        }
    }

    #[test]
    fn test_avalanche_effect() {
        // 翻转输入单个比特平均应翻转接近一半输出比特
        let mut rng = StdRng::seed_from_u64(7);
        let mut flipped = 0u64;
        let samples = 4_000u64;
        for _ in 0..samples {
            let key: u32 = rng.gen();
            let bit = 1u32 << rng.gen_range(0..32);
            flipped += u64::from((full_avalanche(key) ^ full_avalanche(key ^ bit)).count_ones());
        }
        let avg = flipped as f64 / samples as f64;
        assert!((10.0..22.0).contains(&avg), "平均翻转比特数异常: {}", avg);
    }
}
