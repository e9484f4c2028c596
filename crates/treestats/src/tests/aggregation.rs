// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{StaticTree, init_logging, site};
use crate::aggregate::{Aggregator, ReadContext};
use crate::cache::{CacheStore, MemoryCacheStore, stat_key};
use crate::config::StatsConfig;
use crate::stat::{CheckStats, StatName, StatValue};
use crate::stats::Stats;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

fn aggregator() -> (Aggregator, MemoryCacheStore) {
    let cache = MemoryCacheStore::new();
    (
        Aggregator::new(Arc::new(cache.clone()), StatsConfig::default()),
        cache,
    )
}

fn checks(pairs: &[(&str, u64)], critical: u64) -> CheckStats {
    CheckStats {
        checks: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        critical,
    }
}

#[tokio::test]
async fn test_sum_depth_zero() {
    let tree = StaticTree::new();
    _ = tree.add("/af/solo/", None, 5);
    let (agg, _) = aggregator();
    let value = agg
        .compute_uncached(&tree.item("/af/solo/"), StatName::Total)
        .await
        .unwrap();
    assert_eq!(value, StatValue::Count(5));
}

#[tokio::test]
async fn test_sum_depth_one() {
    let tree = StaticTree::new();
    _ = tree
        .add("/p/", None, 0)
        .add("/p/a", Some("/p/"), 5)
        .add("/p/b", Some("/p/"), 3)
        .add("/p/c", Some("/p/"), 0);
    let (agg, _) = aggregator();
    let value = agg
        .compute_uncached(&tree.item("/p/"), StatName::Total)
        .await
        .unwrap();
    assert_eq!(value, StatValue::Count(8));
}

#[tokio::test]
async fn test_sum_depth_three() {
    let tree = StaticTree::new();
    _ = tree
        .add("/r/", None, 1)
        .add("/r/x/", Some("/r/"), 2)
        .add("/r/y/", Some("/r/"), 0)
        .add("/r/x/m/", Some("/r/x/"), 4)
        .add("/r/x/m/leaf1", Some("/r/x/m/"), 8)
        .add("/r/x/m/leaf2", Some("/r/x/m/"), 16)
        .add("/r/y/leaf3", Some("/r/y/"), 32);
    let (agg, _) = aggregator();

    let root = tree.item("/r/");
    let total = agg.compute_uncached(&root, StatName::Total).await.unwrap();
    assert_eq!(total, StatValue::Count(63));

    // own + sum over children, at every level
    let own = root.own_value(StatName::Total).await.unwrap().count();
    let mut sum = own;
    for child in root.children().await.unwrap() {
        sum += agg
            .compute_uncached(&child, StatName::Total)
            .await
            .unwrap()
            .count();
    }
    assert_eq!(sum, 63);

    let mid = tree.item("/r/x/m/");
    assert_eq!(
        agg.compute_uncached(&mid, StatName::Total).await.unwrap(),
        StatValue::Count(28)
    );
}

#[tokio::test]
async fn test_mtime_takes_newest() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();

    let tree = StaticTree::new();
    _ = tree
        .add("/n/", None, 0)
        .add("/n/newer", Some("/n/"), 0)
        .add("/n/older", Some("/n/"), 0);
    tree.set_mtime("/n/", t0);
    tree.set_mtime("/n/newer", t1);
    tree.set_mtime("/n/older", t2);

    let (agg, _) = aggregator();
    let value = agg
        .compute_uncached(&tree.item("/n/"), StatName::Mtime)
        .await
        .unwrap();
    assert_eq!(value, StatValue::Mtime(t1));
}

#[tokio::test]
async fn test_checks_merge_across_children() {
    let tree = StaticTree::new();
    _ = tree
        .add("/n/", None, 0)
        .add("/n/a", Some("/n/"), 0)
        .add("/n/b", Some("/n/"), 0);
    tree.set_checks("/n/", checks(&[], 1));
    tree.set_checks("/n/a", checks(&[("endpunc", 2)], 2));
    tree.set_checks("/n/b", checks(&[("endpunc", 1), ("unchanged", 3)], 4));

    let (agg, _) = aggregator();
    let value = agg
        .compute_uncached(&tree.item("/n/"), StatName::Checks)
        .await
        .unwrap();
    assert_eq!(
        value,
        StatValue::Checks(checks(&[("endpunc", 3), ("unchanged", 3)], 7))
    );
}

#[tokio::test]
async fn test_update_cached_is_idempotent() {
    let tree = site().await;
    let (agg, cache) = aggregator();
    let tp = tree.item("/af/tutorial/").await.unwrap();
    let key = stat_key("/af/tutorial/", StatName::Checks);

    let first = agg.update_cached(&tp, StatName::Checks).await.unwrap();
    let stored_first = cache.get(&key).await.unwrap();
    let second = agg.update_cached(&tp, StatName::Checks).await.unwrap();
    let stored_second = cache.get(&key).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(stored_first, stored_second);
    assert!(stored_first.is_some());
}

#[tokio::test]
async fn test_cache_miss_returns_identity() {
    init_logging();
    let tree = site().await;
    let (agg, cache) = aggregator();
    let tp = tree.item("/af/tutorial/").await.unwrap();

    for name in StatName::ALL {
        assert_eq!(
            agg.compute_cached(&tp, name, ReadContext::Interactive).await,
            name.identity()
        );
        assert_eq!(
            agg.compute_cached(&tp, name, ReadContext::FromUpdate).await,
            name.identity()
        );
    }
    // Reads never fill the cache
    assert!(cache.is_empty().await);
    assert_eq!(cache.cache_stats().await.misses, 16);
}

#[tokio::test]
async fn test_wrong_shape_in_cache_returns_identity() {
    let tree = site().await;
    let (agg, cache) = aggregator();
    let tp = tree.item("/af/tutorial/").await.unwrap();

    cache
        .set(
            &stat_key("/af/tutorial/", StatName::Total),
            StatValue::Checks(CheckStats::default()).to_bytes().unwrap(),
        )
        .await
        .unwrap();
    cache
        .set(&stat_key("/af/tutorial/", StatName::Fuzzy), b"not json".to_vec())
        .await
        .unwrap();

    assert_eq!(
        agg.compute_cached(&tp, StatName::Total, ReadContext::Interactive).await,
        StatValue::Count(0)
    );
    assert_eq!(
        agg.compute_cached(&tp, StatName::Fuzzy, ReadContext::Interactive).await,
        StatValue::Count(0)
    );
}

#[tokio::test]
async fn test_get_stats_with_children() {
    let tree = site().await;
    let memory = Stats::in_memory(StatsConfig {
        sync_jobs: true,
        ..StatsConfig::default()
    });
    let stats = &memory.stats;
    let tp = tree.item("/af/tutorial/").await.unwrap();

    let empty = stats.get_stats(&tp, true).await;
    assert_eq!(empty.total, 0);
    assert!(!empty.is_dirty);

    stats.refresh_stats(&tp, true, None).await.unwrap();
    let report = stats.get_stats(&tp, true).await;
    assert_eq!(report.total, 15);
    assert_eq!(report.translated, 11);
    assert_eq!(report.fuzzy, 1);
    assert_eq!(report.suggestions, 2);
    assert_eq!(report.critical, 1);
    assert!(!report.is_dirty);

    let keys: Vec<&String> = report.children.keys().collect();
    assert_eq!(keys, vec!["a.po", "sub"]);
    assert_eq!(report.children["sub"].total, 5);
    assert!(report.children["sub"].children.is_empty());

    let shallow = stats.get_stats(&tp, false).await;
    assert!(shallow.children.is_empty());

    assert_eq!(stats.get_error_unit_count(&tp).await, 1);
    assert_eq!(stats.get_checks(&tp).await.checks.get("endpunc"), Some(&2));
}

#[tokio::test]
async fn test_project_report_keeps_every_language() {
    let tree = site().await;
    let memory = Stats::in_memory(StatsConfig {
        sync_jobs: true,
        ..StatsConfig::default()
    });
    let stats = &memory.stats;
    let root = tree.item("/").await.unwrap();
    let project = tree.item("/projects/tutorial/").await.unwrap();
    stats.refresh_stats(&root, true, None).await.unwrap();
    stats.refresh_stats(&project, false, None).await.unwrap();

    let report = stats.get_stats(&project, true).await;
    assert_eq!(report.children.len(), project.children().await.unwrap().len());
    let keys: Vec<&String> = report.children.keys().collect();
    assert_eq!(keys, vec!["af-tutorial", "de-tutorial"]);
    assert_eq!(report.children["af-tutorial"].total, 15);
    assert_eq!(report.children["de-tutorial"].total, 10);
    assert_eq!(report.total, 25);

    let language = tree.item("/af/").await.unwrap();
    let report = stats.get_stats(&language, true).await;
    let keys: Vec<&String> = report.children.keys().collect();
    assert_eq!(keys, vec!["af-retired", "af-tutorial"]);
}
