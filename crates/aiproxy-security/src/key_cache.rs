//! In-process cache of provider verification keys

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;

use crate::issuer::IssuerKind;

/// Verification keys per issuer and key id.
///
/// Entries never expire and are never replaced. A rotated key arrives under a
/// new kid, which misses here and triggers a fresh document fetch.
#[derive(Default)]
pub struct KeyCache {
    keys: RwLock<HashMap<IssuerKind, HashMap<String, Arc<DecodingKey>>>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, issuer: IssuerKind, kid: &str) -> Option<Arc<DecodingKey>> {
        self.keys
            .read()
            .get(&issuer)
            .and_then(|keys| keys.get(kid))
            .cloned()
    }

    /// Adds keys not already present. Returns how many were new.
    pub fn insert_all<I>(&self, issuer: IssuerKind, keys: I) -> usize
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let mut guard = self.keys.write();
        let per_issuer = guard.entry(issuer).or_default();
        let mut added = 0;
        for (kid, key) in keys {
            if !per_issuer.contains_key(&kid) {
                per_issuer.insert(kid, Arc::new(key));
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.keys.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
