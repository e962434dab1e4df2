//! TTL cache of decoded build specs keyed by VIN
//!
//! Expiry is enforced twice: readers treat an expired entry as a miss without
//! removing it, and a background sweep physically removes expired entries so
//! memory stays bounded regardless of read traffic.
//!
//! The map sits behind one readers-writer lock. Entries are replaced whole on
//! write and the lock is never held across I/O.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use types::build::BuildSpec;
use types::ids::Vin;

pub const DEFAULT_BUILD_TTL_SECS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct BuildCacheConfig {
    /// Lifetime of an entry from the moment it is written
    pub ttl: Duration,
    /// How often the sweep removes expired entries
    pub sweep_interval: Duration,
}

impl Default for BuildCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_BUILD_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl BuildCacheConfig {
    /// # Environment Variables
    /// - `BUILD_CACHE_TTL_SECS`: entry lifetime (default: 3600)
    /// - `BUILD_CACHE_SWEEP_SECS`: sweep interval (default: 60)
    pub fn from_env() -> Self {
        let ttl = Duration::from_secs(
            std::env::var("BUILD_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BUILD_TTL_SECS),
        );
        let sweep_interval = Duration::from_secs(
            std::env::var("BUILD_CACHE_SWEEP_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );
        Self {
            ttl,
            sweep_interval,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedBuild {
    spec: BuildSpec,
    expires_at: Instant,
}

/// Concurrency-safe build spec cache with a fixed TTL.
///
/// There is no negative caching: only successful decodes are ever stored.
pub struct BuildCache {
    entries: RwLock<HashMap<Vin, CachedBuild>>,
    ttl: Duration,
}

impl BuildCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached spec for `vin`, if present and not yet expired.
    pub fn get(&self, vin: &Vin) -> Option<BuildSpec> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(vin)
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.spec.clone())
    }

    /// Store `spec` for `vin`, replacing any previous entry and restarting the TTL.
    pub fn set(&self, vin: Vin, spec: BuildSpec) {
        let entry = CachedBuild {
            spec,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().insert(vin, entry);
    }

    /// Remove every entry whose expiry has passed. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, cached| cached.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep.
    ///
    /// The task holds only a weak reference, so it also ends once the cache
    /// itself is dropped.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) -> SweepTask {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_sweeper(Arc::downgrade(self), every, shutdown_rx));
        info!(interval_secs = every.as_secs(), "Build cache sweeper started");
        SweepTask {
            shutdown_tx,
            handle,
        }
    }
}

async fn run_sweeper(cache: Weak<BuildCache>, every: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,

            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else { break };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "Swept expired build specs");
                }
            }
        }
    }

    debug!("Build cache sweeper stopped");
}

/// Handle to the running sweep task.
pub struct SweepTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Signal the sweep to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(make: &str) -> BuildSpec {
        BuildSpec {
            year: 2021,
            make: make.into(),
            model: "F-150".into(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_set_hits() {
        let cache = BuildCache::new(Duration::from_secs(3600));
        let vin = Vin::new("1FAFP404X1F123456");

        assert!(cache.get(&vin).is_none());
        cache.set(vin.clone(), spec("Ford"));
        assert_eq!(cache.get(&vin), Some(spec("Ford")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss_before_sweep() {
        let cache = BuildCache::new(Duration::from_secs(10));
        let vin = Vin::new("VIN1");
        cache.set(vin.clone(), spec("Ford"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get(&vin).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&vin).is_none());
        // Lazy expiry leaves the entry in place.
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_replaces_entry_and_restarts_ttl() {
        let cache = BuildCache::new(Duration::from_secs(10));
        let vin = Vin::new("VIN1");
        cache.set(vin.clone(), spec("Ford"));

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set(vin.clone(), spec("Lincoln"));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&vin).map(|s| s.make), Some("Lincoln".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = BuildCache::new(Duration::from_secs(10));
        cache.set(Vin::new("OLD"), spec("Ford"));
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set(Vin::new("NEW"), spec("Ford"));
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&Vin::new("NEW")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_runs_and_stops() {
        let cache = Arc::new(BuildCache::new(Duration::from_secs(30)));
        cache.set(Vin::new("VIN1"), spec("Ford"));

        let sweeper = cache.start_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());

        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_ends_when_cache_dropped() {
        let cache = Arc::new(BuildCache::new(Duration::from_secs(30)));
        let sweeper = cache.start_sweeper(Duration::from_secs(1));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(sweeper.is_finished());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let cache = Arc::new(BuildCache::new(Duration::from_secs(3600)));
            let handles: Vec<_> = (0..32)
                .map(|i| {
                    let cache = cache.clone();
                    tokio::spawn(async move {
                        let vin = Vin::new(format!("VIN{}", i % 4));
                        for _ in 0..100 {
                            cache.set(vin.clone(), spec(&format!("Make{}", i % 4)));
                            let hit = cache.get(&vin).unwrap();
                            // Whole-entry replace: never a torn spec.
                            assert_eq!(hit.make, format!("Make{}", i % 4));
                            assert_eq!(hit.model, "F-150");
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(cache.len(), 4);
        });
    }
}
