//! §4.2 cache contract + §9 "shared schema with readers + writers" design
//! note: a read/write lock around an `Arc<SchemaSnapshot>`, swapped wholesale
//! on write rather than mutated in place. Grounded in the retrieval pack's
//! `SchemaCacheService` (other_examples, myr), adapted from TTL expiry to
//! the gateway's always-fresh-after-DDL invariant.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::model::SchemaSnapshot;

pub struct SchemaCache {
    inner: RwLock<Arc<SchemaSnapshot>>,
}

impl SchemaCache {
    pub fn new(initial: SchemaSnapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    /// A shared, point-in-time-consistent view. Cheap to clone; cloning the
    /// `Arc` rather than the snapshot itself is what keeps readers lock-free
    /// at statement granularity.
    pub async fn snapshot(&self) -> Arc<SchemaSnapshot> {
        let guard = self.inner.read().await;
        debug!("schema cache read");
        Arc::clone(&*guard)
    }

    /// Swaps in a freshly rebuilt snapshot. Never mutates the previous one
    /// in place, so in-flight readers keep their own consistent view.
    pub async fn replace(&self, new_snapshot: SchemaSnapshot) {
        let mut guard = self.inner.write().await;
        *guard = Arc::new(new_snapshot);
        debug!("schema cache replaced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_is_visible_to_subsequent_reads() {
        let cache = SchemaCache::new(SchemaSnapshot::default());
        assert!(cache.snapshot().await.tables.is_empty());

        let mut next = SchemaSnapshot::default();
        next.tables.insert(
            "users".to_string(),
            super::super::model::Table::new("users"),
        );
        cache.replace(next).await;

        assert_eq!(cache.snapshot().await.tables.len(), 1);
    }
}
