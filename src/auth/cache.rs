//! Per-service token cache.
//!
//! Entries live only as long as the home token pair that produced them:
//! the owning client clears the cache whenever the home pair is replaced
//! (login or refresh), and entries that have expired on their own are
//! treated as absent.

use std::collections::HashMap;

use crate::auth::token::TokenPair;

/// Cache of service-scoped token pairs keyed by audience identifier
#[derive(Debug, Default)]
pub struct ServiceTokenCache {
    entries: HashMap<String, TokenPair>,
}

impl ServiceTokenCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a still-fresh token for the given audience
    #[must_use]
    pub fn get(&self, audience: &str) -> Option<&TokenPair> {
        let pair = self.entries.get(audience)?;
        if pair.is_expired() {
            tracing::debug!(audience, "cached service token expired");
            return None;
        }
        Some(pair)
    }

    /// Store a freshly exchanged token for the given audience
    pub fn insert(&mut self, audience: impl Into<String>, pair: TokenPair) {
        self.entries.insert(audience.into(), pair);
    }

    /// Drop every cached entry. Called whenever the home token pair is
    /// replaced, since service tokens derive from it.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!(entries = self.entries.len(), "clearing service token cache");
            self.entries.clear();
        }
    }

    /// Number of cached entries, fresh or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_pair(access: &str) -> TokenPair {
        TokenPair::new(access.to_string(), None, Some(3600))
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = ServiceTokenCache::new();
        cache.insert("data-management-api", fresh_pair("svc-token"));

        let pair = cache.get("data-management-api").unwrap();
        assert_eq!(pair.access_token, "svc-token");
        assert!(cache.get("metadata-api").is_none());
    }

    #[test]
    fn test_expired_entry_treated_as_absent() {
        let mut cache = ServiceTokenCache::new();
        let mut stale = fresh_pair("svc-token");
        stale.issued_at -= 7200;
        cache.insert("soda-api", stale);

        assert!(cache.get("soda-api").is_none());
        // the stale entry still occupies a slot until cleared
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = ServiceTokenCache::new();
        cache.insert("data-management-api", fresh_pair("a"));
        cache.insert("metadata-api", fresh_pair("b"));
        assert_eq!(cache.len(), 2);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get("data-management-api").is_none());
    }
}
