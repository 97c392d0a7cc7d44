//! Process-wide cache of shared feature-extraction adapters.
//!
//! Extractor models are expensive to load and are commonly shared between
//! consecutive sessions (a user re-teaching the same modality should not
//! reload the model). This module replaces an implicit file-scoped cache
//! with an explicit, lazily-initialized, reference-counted registry with
//! clear init and teardown semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::debug;

use crate::extractor::FeatureExtractionAdapter;

struct CacheEntry {
    adapter: FeatureExtractionAdapter,
    refs: usize,
}

lazy_static! {
    static ref SHARED_EXTRACTORS: Mutex<HashMap<String, CacheEntry>> = Mutex::new(HashMap::new());
}

/// Returns the cached adapter for `name`, initializing it on first use.
/// Every `acquire` must be paired with a [`release`].
pub fn acquire(name: &str, init: impl FnOnce() -> FeatureExtractionAdapter) -> FeatureExtractionAdapter {
    let mut cache = SHARED_EXTRACTORS.lock().expect("extractor cache poisoned");
    let entry = cache.entry(name.to_string()).or_insert_with(|| {
        debug!("initializing shared extractor '{}'", name);
        CacheEntry {
            adapter: init(),
            refs: 0,
        }
    });
    entry.refs += 1;
    entry.adapter.clone()
}

/// Drops one reference to the named adapter, evicting it when the last
/// reference goes away.
pub fn release(name: &str) {
    let mut cache = SHARED_EXTRACTORS.lock().expect("extractor cache poisoned");
    let empty = match cache.get_mut(name) {
        Some(entry) => {
            entry.refs = entry.refs.saturating_sub(1);
            entry.refs == 0
        }
        None => false,
    };
    if empty {
        debug!("evicting shared extractor '{}'", name);
        cache.remove(name);
    }
}

/// Evicts every cached adapter regardless of reference counts. Intended
/// for process shutdown.
pub fn teardown() {
    SHARED_EXTRACTORS
        .lock()
        .expect("extractor cache poisoned")
        .clear();
}

/// Number of live cached adapters.
pub fn cached_count() -> usize {
    SHARED_EXTRACTORS
        .lock()
        .expect("extractor cache poisoned")
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractorStatus, RawCapture, SyncFeatureExtractor};
    use crate::SessionError;
    use ndarray::Array1;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingExtractor;

    impl SyncFeatureExtractor for CountingExtractor {
        fn status(&self) -> ExtractorStatus {
            ExtractorStatus::Ready
        }

        fn embedding_size(&self) -> usize {
            2
        }

        fn extract(&self, _raw: &RawCapture) -> Result<Array1<f32>, SessionError> {
            Ok(Array1::zeros(2))
        }
    }

    #[test]
    fn acquire_initializes_once_and_release_evicts() {
        let inits = AtomicUsize::new(0);
        let make = || {
            inits.fetch_add(1, Ordering::SeqCst);
            FeatureExtractionAdapter::from_sync(Arc::new(CountingExtractor))
        };

        let _a = acquire("test-shared-a", make);
        let _b = acquire("test-shared-a", || {
            inits.fetch_add(1, Ordering::SeqCst);
            FeatureExtractionAdapter::from_sync(Arc::new(CountingExtractor))
        });
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        release("test-shared-a");
        release("test-shared-a");
        // Eviction happened; the next acquire re-initializes.
        let _c = acquire("test-shared-a", || {
            inits.fetch_add(1, Ordering::SeqCst);
            FeatureExtractionAdapter::from_sync(Arc::new(CountingExtractor))
        });
        assert_eq!(inits.load(Ordering::SeqCst), 2);
        release("test-shared-a");

        // Teardown evicts regardless of outstanding references.
        let _d = acquire("test-shared-b", || {
            FeatureExtractionAdapter::from_sync(Arc::new(CountingExtractor))
        });
        assert!(cached_count() >= 1);
        teardown();
        assert_eq!(cached_count(), 0);
    }
}
