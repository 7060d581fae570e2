//! Readers racing writers on a shared matcher.

use cidrtrie::{CacheConfig, CacheStrategy, CanonicalAddr, CidrMatcher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_readers_never_see_torn_state() {
    for strategy in CacheStrategy::ALL {
        let m = Arc::new(CidrMatcher::new(CacheConfig::with_strategy(strategy)));
        m.insert("10.0.0.0/8").unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        // Never removed, so always present.
                        assert!(m.check("10.20.30.40").unwrap());
                        assert!(!m.check("8.8.8.8").unwrap());
                        // Toggled by the writer; either answer is fine.
                        m.check("172.20.0.1").unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            m.insert("172.16.0.0/12").unwrap();
            m.remove("172.16.0.0/12").unwrap();
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
        assert!(!m.check("172.20.0.1").unwrap());
        assert_eq!(m.len(), 1);
    }
}

#[test]
fn test_concurrent_writers_are_serialized() {
    let m = Arc::new(CidrMatcher::default());

    let writers: Vec<_> = (0..8u8)
        .map(|t| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                for i in 0..32u8 {
                    m.insert(&format!("{}.{}.0.0/16", t + 1, i)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(m.len(), 8 * 32);
    assert_eq!(m.generation(), 8 * 32);
    for t in 0..8u8 {
        for i in 0..32u8 {
            assert!(m.check(format!("{}.{}.1.1", t + 1, i).as_str()).unwrap());
        }
    }
}

#[test]
fn test_batches_publish_atomically() {
    let m = Arc::new(CidrMatcher::new(CacheConfig::no_cache()));
    let done = Arc::new(AtomicBool::new(false));

    let batch: Vec<String> = (0..64).map(|i| format!("10.{}.0.0/16", i)).collect();

    let reader = {
        let m = Arc::clone(&m);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                // A batch is either fully visible or not at all.
                let snapshot = m.snapshot();
                let len = snapshot.len();
                assert!(len == 0 || len == 64, "saw {} entries", len);
                if len == 64 {
                    assert!(snapshot.contains(&CanonicalAddr::V4([10, 63, 255, 255])));
                }
                m.check("10.0.0.1").unwrap();
            }
        })
    };

    for _ in 0..50 {
        m.batch_insert(&batch).unwrap();
        m.clear();
    }
    done.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert!(m.is_empty());
}

#[test]
fn test_cache_results_follow_mutations_under_load() {
    let m = Arc::new(CidrMatcher::new(CacheConfig {
        strategy: CacheStrategy::Dual,
        capacity: 16,
    }));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let m = Arc::clone(&m);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let _ = m.check("192.168.1.1").unwrap();
                    let _ = m.check(&[192u8, 168, 1, 1]).unwrap();
                }
            })
        })
        .collect();

    for _ in 0..100 {
        m.insert("192.168.0.0/16").unwrap();
        assert!(m.check("192.168.1.1").unwrap());
        m.remove("192.168.0.0/16").unwrap();
        assert!(!m.check("192.168.1.1").unwrap());
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        reader.join().unwrap();
    }
}
