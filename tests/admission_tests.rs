use mimicd::admission::{AdmissionController, BucketStore, TokenBucket};
use mimicd::config::{LimitParams, RateLimitConfig};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_burst_exhaustion_and_refill_window() {
    // rate=2/s, burst=2: first two immediate calls pass, the third fails
    // with a positive retry estimate; after one window a call passes again.
    let bucket = TokenBucket::new(2.0, 2);
    assert!(bucket.allow());
    assert!(bucket.allow());
    assert!(!bucket.allow());

    let status = bucket.status();
    assert!(status.retry_after > Duration::ZERO);
    assert_eq!(status.remaining, 0);

    thread::sleep(Duration::from_millis(600));
    assert!(bucket.allow());
}

#[test]
fn test_layered_onion_short_circuits() {
    let cfg = RateLimitConfig {
        enabled: true,
        requests_per_second: 1000.0,
        burst: 1000,
        per_ip: Some(LimitParams {
            requests_per_second: 0.1,
            burst: 1,
        }),
        per_key: None,
        ..RateLimitConfig::default()
    };
    let adm = AdmissionController::from_config(&cfg).unwrap();

    assert!(adm.check(None, "203.0.113.7").is_ok());
    let denied = adm.check(None, "203.0.113.7").unwrap_err();
    assert_eq!(denied.remaining, 0);
    // Other identities are unaffected by the inner denial.
    assert!(adm.check(None, "203.0.113.8").is_ok());
}

#[test]
fn test_rejection_continues_until_refill() {
    let cfg = RateLimitConfig {
        enabled: true,
        requests_per_second: 0.5,
        burst: 1,
        ..RateLimitConfig::default()
    };
    let adm = AdmissionController::from_config(&cfg).unwrap();
    assert!(adm.check(None, "x").is_ok());
    for _ in 0..5 {
        assert!(adm.check(None, "x").is_err());
    }
}

#[test]
fn test_store_bounded_under_identifier_flood() {
    let store = BucketStore::new(64, Duration::from_secs(300));
    for i in 0..10_000 {
        store.get_or_create(&format!("ip:spoofed-{i}"), 10.0, 10);
    }
    assert_eq!(store.len(), 64);
}

#[test]
fn test_eviction_tolerates_concurrent_creation() {
    let store = Arc::new(BucketStore::new(128, Duration::from_millis(1)));
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..2_000 {
                    store.get_or_create(&format!("ip:{t}-{i}"), 10.0, 10);
                }
            })
        })
        .collect();
    let sweeper = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..50 {
                store.sweep();
                thread::sleep(Duration::from_millis(1));
            }
        })
    };
    for w in writers {
        w.join().unwrap();
    }
    sweeper.join().unwrap();
    assert!(store.len() <= 128);
}
