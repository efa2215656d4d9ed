//! Integration tests for the intensity cache over both store backends.

use intensity_cache::{IntensityCache, IntensityKey, IntensityValue};
use std::sync::atomic::Ordering;
use std::thread;

fn key(source: &str, percentile: f64) -> IntensityKey {
    IntensityKey::new(source, 0, 9, percentile, 1, "NONE")
}

#[test]
fn test_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let value = IntensityValue::new(-3.25e-4, 0.0, "exact");

    {
        let cache = IntensityCache::on_disk(dir.path()).unwrap();
        cache.set(&key("ngc253.fits", 0.995), &value);
    }

    let reopened = IntensityCache::on_disk(dir.path()).unwrap();
    assert_eq!(reopened.get(&key("ngc253.fits", 0.995)), Some(value));
    assert!(reopened.get(&key("ngc253.fits", 0.99)).is_none());
}

#[test]
fn test_file_cache_handles_awkward_source_ids() {
    let dir = tempfile::tempdir().unwrap();
    let cache = IntensityCache::on_disk(dir.path()).unwrap();
    let odd = key("/data/obs 1/cube|v2.fits", 0.5);

    cache.set(&odd, &IntensityValue::new(7.0, 0.0, "exact"));
    assert_eq!(cache.get(&odd).map(|v| v.value), Some(7.0));
}

#[test]
fn test_file_cache_long_archive_path_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = format!("/data/{}/cube.fits", "obs/".repeat(60));
    assert!(source.len() >= 200);
    let value = IntensityValue::new(12.5, 0.0, "exact");

    {
        let cache = IntensityCache::on_disk(dir.path()).unwrap();
        cache.set(&key(&source, 0.99), &value);
        assert_eq!(cache.stats().store_errors.load(Ordering::Relaxed), 0);
    }

    let reopened = IntensityCache::on_disk(dir.path()).unwrap();
    assert_eq!(reopened.get(&key(&source, 0.99)), Some(value));
}

#[test]
fn test_concurrent_get_set_memory() {
    let cache = IntensityCache::in_memory(10_000);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let k = key(&format!("src-{t}"), i as f64 / 200.0);
                    cache.set(&k, &IntensityValue::new(i as f64, 0.0, "exact"));
                    let got = cache.get(&k).expect("value just written");
                    assert_eq!(got.value, i as f64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.stats().writes.load(Ordering::Relaxed), 1600);
    assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1600);
}

#[test]
fn test_concurrent_writers_same_key_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cache = IntensityCache::on_disk(dir.path()).unwrap();
    let shared = key("shared.fits", 0.5);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    cache.set(&shared, &IntensityValue::new((t * 100 + i) as f64, 0.0, "exact"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // whichever writer finished last, the entry must decode cleanly
    let value = cache.get(&shared).expect("entry present");
    assert!(value.value >= 0.0 && value.value < 400.0);
    assert_eq!(cache.stats().store_errors.load(Ordering::Relaxed), 0);
}
