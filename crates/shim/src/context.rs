//! Marker set distinguishing mutating transactions from query contexts.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::error::{ShimError, ShimResult};
use crate::message::TxKey;

#[derive(Debug, Default)]
pub struct TransactionContexts {
    markers: DashMap<TxKey, bool>,
}

impl TransactionContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` for the lifetime of the returned guard.
    pub fn mark(self: &Arc<Self>, key: TxKey, is_transaction: bool) -> ShimResult<ContextGuard> {
        match self.markers.entry(key.clone()) {
            Entry::Occupied(_) => Err(ShimError::DuplicateTransaction { key }),
            Entry::Vacant(vacant) => {
                vacant.insert(is_transaction);
                Ok(ContextGuard {
                    key,
                    contexts: Arc::clone(self),
                })
            }
        }
    }

    /// True only for keys marked as mutating; unknown keys are query contexts.
    pub fn is_transaction(&self, key: &TxKey) -> bool {
        self.markers.get(key).is_some_and(|marker| *marker)
    }

    pub fn contains(&self, key: &TxKey) -> bool {
        self.markers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Removes its marker on drop.
#[derive(Debug)]
pub struct ContextGuard {
    key: TxKey,
    contexts: Arc<TransactionContexts>,
}

impl ContextGuard {
    pub fn key(&self) -> &TxKey {
        &self.key
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.contexts.markers.remove(&self.key);
    }
}
