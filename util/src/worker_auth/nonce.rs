use std::collections::HashMap;
use std::sync::Mutex;

/// Replay cache of `(worker, nonce)` keys with expiry times (unix seconds).
///
/// A single mutex owns the map so that check-then-insert is one atomic step.
#[derive(Debug, Default)]
pub struct NonceCache {
    entries: Mutex<HashMap<String, i64>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Purges expired keys, then records `key` until `now + ttl_seconds`.
    ///
    /// Returns `false` if the key is still live, meaning the request is a replay.
    pub fn check_and_insert(&self, key: &str, now: i64, ttl_seconds: i64) -> bool {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        entries.retain(|_, expires_at| *expires_at > now);

        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), now + ttl_seconds);
        true
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|e| e.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the cache key for a nonce.
    pub fn key(worker_id: Option<&str>, nonce: &str) -> String {
        format!("{}:{}", worker_id.unwrap_or(super::ANONYMOUS_WORKER), nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn second_use_within_ttl_is_rejected() {
        let cache = NonceCache::new();
        assert!(cache.check_and_insert("w1:n", 1_000, 300));
        assert!(!cache.check_and_insert("w1:n", 1_299, 300));
    }

    #[test]
    fn reuse_after_expiry_is_allowed_and_expired_keys_are_purged() {
        let cache = NonceCache::new();
        assert!(cache.check_and_insert("w1:a", 1_000, 300));
        assert!(cache.check_and_insert("w1:b", 1_000, 300));
        assert_eq!(cache.len(), 2);

        assert!(cache.check_and_insert("w1:a", 1_300, 300));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn same_nonce_different_worker_is_distinct() {
        let cache = NonceCache::new();
        assert!(cache.check_and_insert(&NonceCache::key(Some("w1"), "n"), 0, 60));
        assert!(cache.check_and_insert(&NonceCache::key(Some("w2"), "n"), 0, 60));
        assert!(!cache.check_and_insert(&NonceCache::key(Some("w1"), "n"), 1, 60));
        assert_eq!(NonceCache::key(None, "n"), "anonymous:n");
    }

    #[test]
    fn concurrent_inserts_admit_exactly_one() {
        let cache = Arc::new(NonceCache::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.check_and_insert("w:race", 10, 60))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
