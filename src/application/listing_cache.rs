//! Single-entry TTL cache for the home-page listing.
//!
//! The cache holds exactly one value: the full ordered home listing. It is
//! constructed once and injected into the feed service, so expiry and
//! explicit clearing are testable in isolation. Nothing clears it on post
//! mutation; a post deleted inside the TTL window remains visible on the
//! home page until the entry expires or is cleared. Group and profile
//! listings never pass through here.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedListing<T> {
    value: T,
    stored_at: Instant,
}

impl<T> CachedListing<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

pub struct ListingCache<T> {
    ttl: Duration,
    slot: RwLock<Option<CachedListing<T>>>,
}

impl<T: Clone> ListingCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, or run `compute` and store its result.
    ///
    /// Concurrent misses coalesce on the write lock, so the producer runs at
    /// most once per expiry. A producer error is returned as-is and nothing
    /// is stored.
    pub async fn get_or_compute<F, Fut, E>(&self, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        {
            let guard = self.slot.read().await;
            if let Some(entry) = guard.as_ref() {
                if entry.is_fresh(self.ttl) {
                    counter!("piazza_listing_cache_hit_total").increment(1);
                    return Ok(entry.value.clone());
                }
            }
        }

        let mut guard = self.slot.write().await;
        if let Some(entry) = guard.as_ref() {
            if entry.is_fresh(self.ttl) {
                counter!("piazza_listing_cache_hit_total").increment(1);
                return Ok(entry.value.clone());
            }
        }

        counter!("piazza_listing_cache_miss_total").increment(1);
        let value = compute().await?;
        *guard = Some(CachedListing {
            value: value.clone(),
            stored_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drop the stored value; the next `get_or_compute` recomputes.
    pub async fn clear(&self) {
        counter!("piazza_listing_cache_clear_total").increment(1);
        *self.slot.write().await = None;
    }
}
