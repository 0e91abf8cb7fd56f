//! Correlation of outbound requests with the peer's Response/Error replies.
//!
//! Each in-flight request owns a [`ResponseSlot`] keyed by its transaction.
//! The slot is a one-shot rendezvous: the inbound reader delivers exactly one
//! message into it and the requesting task consumes it. Dropping the slot
//! removes the key, whichever way the request ended.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{ShimError, ShimResult};
use crate::message::{ChaincodeMessage, TxKey};

struct SlotEntry {
    id: u64,
    // Taken by the first delivery.
    sender: Option<oneshot::Sender<ChaincodeMessage>>,
}

#[derive(Default)]
pub struct ResponseRegistry {
    slots: Mutex<HashMap<TxKey, SlotEntry>>,
    next_id: AtomicU64,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `key`. Fails if one is already registered.
    pub fn acquire(self: &Arc<Self>, key: TxKey) -> ShimResult<ResponseSlot> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&key) {
            return Err(ShimError::SlotInUse { key });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        slots.insert(
            key.clone(),
            SlotEntry {
                id,
                sender: Some(sender),
            },
        );
        tracing::debug!(%key, pending = slots.len(), "registered response slot");

        Ok(ResponseSlot {
            key,
            id,
            receiver,
            registry: Arc::clone(self),
        })
    }

    /// Hands `message` to the waiter registered for `key`.
    pub fn deliver(&self, key: &TxKey, message: ChaincodeMessage) -> ShimResult<()> {
        let mut slots = self.slots.lock();
        let Some(entry) = slots.get_mut(key) else {
            return Err(ShimError::NoPendingRequest {
                key: key.clone(),
                kind: message.kind,
            });
        };
        let Some(sender) = entry.sender.take() else {
            return Err(ShimError::AlreadyDelivered { key: key.clone() });
        };

        let kind = message.kind;
        if sender.send(message).is_err() {
            return Err(ShimError::NoPendingRequest {
                key: key.clone(),
                kind,
            });
        }
        tracing::debug!(%key, %kind, "delivered response");
        Ok(())
    }

    /// Removes whatever slot is registered for `key`.
    pub fn release(&self, key: &TxKey) -> bool {
        self.slots.lock().remove(key).is_some()
    }

    fn release_slot(&self, key: &TxKey, id: u64) {
        let mut slots = self.slots.lock();
        if slots.get(key).is_some_and(|entry| entry.id == id) {
            slots.remove(key);
            tracing::trace!(%key, "released response slot");
        }
    }

    pub fn contains(&self, key: &TxKey) -> bool {
        self.slots.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

/// A registered wait for one reply. Releases its key when dropped.
pub struct ResponseSlot {
    key: TxKey,
    id: u64,
    receiver: oneshot::Receiver<ChaincodeMessage>,
    registry: Arc<ResponseRegistry>,
}

impl ResponseSlot {
    pub fn key(&self) -> &TxKey {
        &self.key
    }

    /// Suspends until the reply arrives or `cancel` fires.
    pub async fn wait(mut self, cancel: &CancellationToken) -> ShimResult<ChaincodeMessage> {
        tokio::select! {
            received = &mut self.receiver => received.map_err(|_| ShimError::HandlerGone),
            _ = cancel.cancelled() => Err(ShimError::Cancelled),
        }
    }
}

impl Drop for ResponseSlot {
    fn drop(&mut self) {
        self.registry.release_slot(&self.key, self.id);
    }
}
