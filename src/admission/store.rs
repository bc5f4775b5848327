use super::bucket::TokenBucket;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

/// Bounded store of live token buckets, keyed by identifier string
/// (`global`, `ip:<addr>`, `key:<digest>`).
///
/// Buckets are created lazily on first use. The store is an LRU bounded at
/// `capacity`: a flood of spoofed identifiers evicts the least-recently-used
/// buckets instead of growing without bound. A background sweeper drops
/// buckets idle past `idle`. Creation and eviction are serialized on the
/// store lock, so a sweep can never race a concurrent creation into a lost
/// bucket; per-bucket token state carries its own lock.
pub struct BucketStore {
    inner: Mutex<LruCache<String, Arc<TokenBucket>>>,
    idle: Duration,
}

impl BucketStore {
    pub fn new(capacity: usize, idle: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            idle,
        }
    }

    /// Fetch the bucket for `id`, creating it with the given parameters if
    /// absent. Creation may evict the LRU entry when the store is full.
    pub fn get_or_create(&self, id: &str, rate: f64, burst: u32) -> Arc<TokenBucket> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(bucket) = inner.get(id) {
            return Arc::clone(bucket);
        }
        let bucket = Arc::new(TokenBucket::new(rate, burst));
        inner.put(id.to_string(), Arc::clone(&bucket));
        bucket
    }

    /// Drop buckets idle past the configured threshold. Returns the number
    /// of evicted buckets.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<String> = inner
            .iter()
            .filter(|(_, bucket)| bucket.idle_for() > self.idle)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            inner.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn the periodic sweeper coroutine. Sweep failures are logged and the
/// loop continues; the task's lifecycle is independent of any request.
pub fn spawn_sweeper(store: Arc<BucketStore>, interval: Duration) {
    // SAFETY: may's spawn is unsafe by runtime contract; the closure owns its
    // captures and runs for the process lifetime.
    let _ = unsafe {
        may::coroutine::spawn::<_, ()>(move || loop {
            may::coroutine::sleep(interval);
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.sweep())) {
                Ok(evicted) if evicted > 0 => {
                    debug!(evicted, remaining = store.len(), "bucket sweep complete");
                }
                Ok(_) => {}
                Err(panic) => {
                    error!(panic = ?panic, "bucket sweep panicked; continuing");
                }
            }
        })
    };
}
