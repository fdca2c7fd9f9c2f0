use std::future::Future;
use std::sync::Arc;
use dashmap::DashMap;
use log::{debug, info};
use tokio::sync::OnceCell;
use crate::catalog::CatalogEntry;

/// Cache key of one catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub site: String,
    pub locale: String,
}

type Slot = Arc<OnceCell<Arc<Vec<CatalogEntry>>>>;

/// Catalog listings per `(site, locale)`.
///
/// Concurrent lookups of a missing key share one computation. A failed computation leaves the key empty so the next
/// lookup retries.
#[derive(Debug, Default)]
pub struct PromptCatalogCache {
    slots: DashMap<CacheKey, Slot>,
}

impl PromptCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached listing for `(site, locale)`, computing it with `init` if there is none.
    pub async fn get_or_try_init<F, Fut, E>(&self, site: &str, locale: &str, init: F) -> Result<Arc<Vec<CatalogEntry>>, E>
        where F: FnOnce() -> Fut,
              Fut: Future<Output=Result<Vec<CatalogEntry>, E>> {
        let key = CacheKey { site: site.to_string(), locale: locale.to_string() };
        // clone the slot out so no map shard lock is held across the await
        let slot = self.slots.entry(key).or_default().value().clone();
        let entries = slot
            .get_or_try_init(|| async move {
                debug!("populating prompt catalog of {} for locale {}", site, locale);
                init().await.map(Arc::new)
            })
            .await?;
        Ok(entries.clone())
    }

    pub fn is_cached(&self, site: &str, locale: &str) -> bool {
        let key = CacheKey { site: site.to_string(), locale: locale.to_string() };
        self.slots.get(&key).map_or(false, |slot| slot.initialized())
    }

    /// Drop every listing of `site`, whatever its locale.
    pub fn invalidate(&self, site: &str) {
        let before = self.slots.len();
        self.slots.retain(|key, _| key.site != site);
        info!("invalidated {} prompt catalog entries of {}", before.saturating_sub(self.slots.len()), site);
    }
}
