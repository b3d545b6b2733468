//! Cuckoo 哈希表集成测试
//!
//! 端到端场景（哨兵旁路、增删改查、扩容、收缩、重建、迭代器失效）
//! 加上随机化的不变式校验。

use cuckoo_binmap::{
    batch_insert, BinMap, BinMapConfig, BinMapError, IterError, MemContext, BIN_SIZE, INF,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use test_log::test;

const SEED: u64 = 42;
const DENSE_KEYS: u32 = 10_000;

/// 扩缩容压力场景用的配置（下限抬到 0.05 使收缩可达）
fn dense_config() -> BinMapConfig {
    BinMapConfig {
        start: 10,
        depth: 4,
        lower: 0.05,
        upper: 0.95,
        ..BinMapConfig::default()
    }
}

/// 建好一张装满 1..=DENSE_KEYS、数据为按位取反的表
fn dense_map() -> BinMap {
    let mut map = BinMap::create(&dense_config()).unwrap();
    for key in 1..=DENSE_KEYS {
        map.insert(key, &[!key]).unwrap();
    }
    map
}

#[test]
fn scenario_sentinel_handling() {
    let conf = BinMapConfig {
        data: 0,
        ..BinMapConfig::default()
    };
    let mut map = BinMap::create(&conf).unwrap();

    map.insert(0xffff_ffff, &[]).unwrap();
    assert_eq!(
        map.insert(0xffff_ffff, &[]),
        Err(BinMapError::KeyExists { key: INF })
    );
    assert!(map.lookup(0xffff_ffff).is_some());
    map.delete(0xffff_ffff).unwrap();
    assert!(map.lookup(0xffff_ffff).is_none());
    assert_eq!(map.keys(), 0);
}

#[test]
fn scenario_basic_crud() {
    let mut map = BinMap::with_defaults();

    map.insert(7, &[42]).unwrap();
    assert_eq!(map.lookup(7).map(|d| d[0]), Some(42));

    map.update(7, &[99]).unwrap();
    assert_eq!(map.lookup(7).map(|d| d[0]), Some(99));

    map.delete(7).unwrap();
    assert!(map.lookup(7).is_none());
}

#[test]
fn scenario_grow_to_ten_thousand() {
    let map = dense_map();
    assert_eq!(map.keys(), DENSE_KEYS);
    assert!(map.fill() <= 0.95, "最终填充率超限: {}", map.fill());
    for key in 1..=DENSE_KEYS {
        assert_eq!(map.lookup(key).map(|d| d[0]), Some(!key), "键 {} 数据不符", key);
    }
    assert_eq!(map.min(), 1);
    assert_eq!(map.max(), DENSE_KEYS);
    map.assert_valid();
}

#[test]
fn scenario_shrink_after_random_deletes() {
    let mut map = dense_map();
    let mut keys: Vec<u32> = (1..=DENSE_KEYS).collect();
    let mut rng = StdRng::seed_from_u64(SEED);
    keys.shuffle(&mut rng);

    let (gone, kept) = keys.split_at(9_500);
    for &key in gone {
        map.delete(key).unwrap();
    }
    assert_eq!(map.keys(), 500);
    assert!(map.fill() >= 0.05, "收缩后填充率仍低于下限: {}", map.fill());
    for &key in kept {
        assert_eq!(map.lookup(key).map(|d| d[0]), Some(!key));
    }
    map.assert_valid();
}

#[test]
fn scenario_rebuild_full_ratio() {
    let mut map = dense_map();
    let bins_before = map.bins();
    map.rebuild(1.0).unwrap();
    assert_eq!(map.keys(), DENSE_KEYS);
    assert!(map.bins() <= bins_before, "重建不应增加桶数");
    for key in 1..=DENSE_KEYS {
        assert_eq!(map.lookup(key).map(|d| d[0]), Some(!key));
    }
    map.assert_valid();
}

#[test]
fn scenario_iterator_invalidation() {
    let mut map = BinMap::with_defaults();
    for key in 0..100u32 {
        map.insert(key, &[key]).unwrap();
    }
    let mut iter = map.iter();
    assert!(iter.current(&map).is_ok());

    map.insert(100, &[100]).unwrap();
    assert_eq!(iter.current(&map), Err(IterError::Invalidated));

    iter.reset(&map);
    assert!(iter.current(&map).is_ok());
}

#[test]
fn iterator_covers_every_key_exactly_once() {
    let mut map = BinMap::with_defaults();
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut expected = BTreeSet::new();
    while expected.len() < 3_000 {
        let key: u32 = rng.gen();
        if key != INF && expected.insert(key) {
            map.insert(key, &[!key]).unwrap();
        }
    }
    map.insert(INF, &[0]).unwrap();
    expected.insert(INF);

    let mut iter = map.iter();
    let mut seen = BTreeSet::new();
    loop {
        match iter.current(&map) {
            Ok((key, _)) => assert!(seen.insert(key), "键 {:#010x} 重复产出", key),
            Err(IterError::Exhausted) => break,
            Err(IterError::Invalidated) => panic!("表未修改，迭代器不应失效"),
        }
        if iter.forward(&map).is_err() {
            break;
        }
    }
    assert_eq!(seen, expected);
    assert_eq!(seen.len(), map.keys() as usize);
}

#[test]
fn update_is_idempotent() {
    let mut map = BinMap::with_defaults();
    map.insert(5, &[1]).unwrap();
    map.update(5, &[2]).unwrap();
    assert_eq!(map.lookup(5).map(|d| d[0]), Some(2));
    map.update(5, &[2]).unwrap();
    assert_eq!(map.lookup(5).map(|d| d[0]), Some(2));
}

#[test]
fn version_is_monotone() {
    let mut map = BinMap::with_defaults();
    let mut last = map.version();
    let bump = |map: &BinMap, last: &mut u64| {
        assert!(map.version() > *last, "变更后版本必须递增");
        *last = map.version();
    };
    map.insert(1, &[1]).unwrap();
    bump(&map, &mut last);
    map.update(1, &[2]).unwrap();
    bump(&map, &mut last);
    map.insert(INF, &[3]).unwrap();
    bump(&map, &mut last);
    map.delete(INF).unwrap();
    bump(&map, &mut last);
    map.rebuild(1.0).unwrap();
    bump(&map, &mut last);
    // 只读操作不得改版本
    let _ = map.lookup(1);
    let _ = map.stats();
    assert_eq!(map.version(), last);
}

#[test]
fn clone_and_original_diverge() {
    let mut map = dense_map();
    let mut copy = map.clone();

    map.delete(1).unwrap();
    copy.update(2, &[0]).unwrap();
    copy.insert(0, &[0]).unwrap();

    assert!(map.lookup(1).is_none());
    assert!(copy.lookup(1).is_some());
    assert_eq!(map.lookup(2).map(|d| d[0]), Some(!2u32));
    assert_eq!(copy.lookup(2).map(|d| d[0]), Some(0));
    assert!(map.lookup(0).is_none());

    map.assert_valid();
    copy.assert_valid();
}

#[test]
fn rebuild_preserves_multiset() {
    let mut map = BinMap::create(&dense_config()).unwrap();
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    for _ in 0..2_000 {
        let key: u32 = rng.gen();
        let _ = map.insert(key, &[key.rotate_left(7)]);
    }
    map.insert(INF, &[123]).unwrap();

    let collect = |map: &BinMap| {
        let mut entries = BTreeMap::new();
        map.apply(|key, data| {
            entries.insert(key, data.to_vec());
        });
        entries
    };
    let before = collect(&map);
    assert_eq!(before.len(), map.keys() as usize);

    for ratio in [1.0, 0.5, 0.25, 0.01] {
        map.rebuild(ratio).unwrap();
        assert_eq!(collect(&map), before, "比率 {} 重建后内容改变", ratio);
        map.assert_valid();
    }
}

#[test]
fn randomized_churn_matches_mirror() {
    let mut map = BinMap::create(&dense_config()).unwrap();
    let mut mirror = BTreeSet::new();
    let mut rng = StdRng::seed_from_u64(SEED ^ 2);

    for round in 0..30_000u32 {
        let key = rng.gen_range(0..8_192u32);
        if mirror.contains(&key) {
            map.delete(key).unwrap();
            mirror.remove(&key);
            assert!(map.lookup(key).is_none());
        } else {
            map.insert(key, &[!key]).unwrap();
            mirror.insert(key);
            assert_eq!(map.lookup(key).map(|d| d[0]), Some(!key));
        }
        assert_eq!(map.keys() as usize, mirror.len());

        if round % 4_096 == 0 {
            map.assert_valid();
            for &key in mirror.iter().take(64) {
                assert_eq!(map.lookup(key).map(|d| d[0]), Some(!key));
            }
        }
    }
    map.assert_valid();
    let stats = map.stats();
    assert_eq!(stats.occupied(), mirror.len() as u64);
}

#[test]
fn accounting_balances_across_workload() {
    let ctx = MemContext::new();
    {
        let mut map = BinMap::create_in(&dense_config(), Arc::clone(&ctx)).unwrap();
        let data: Vec<(u32, [u32; 1])> = (0..2_000u32).map(|k| (k, [k])).collect();
        let inserted = batch_insert(&mut map, data.iter().map(|(k, d)| (*k, &d[..])));
        assert_eq!(inserted, 2_000);

        let copy = map.clone();
        let iter = map.iter();
        drop(iter);
        drop(copy);
        map.rebuild(0.8).unwrap();
    }
    // 所有对象归还后泄漏检查必须通过
    ctx.verify();
}

#[test]
fn stats_reflect_occupancy() {
    let map = dense_map();
    let stats = map.stats();
    assert_eq!(stats.bins(), map.bins());
    assert_eq!(stats.occupied(), u64::from(DENSE_KEYS));
    // 主桶驻留应占多数，这是单访问查找的基础
    assert!(
        stats.primary_ratio() > 0.5,
        "主桶驻留比例过低: {:.3}",
        stats.primary_ratio()
    );
    assert_eq!(stats.hist.len(), BIN_SIZE + 1);
}
