//! Single-slot handoff between the callback listener and the waiting flow.
//!
//! Every request handler holds a clone of the [`Handoff`]. The first
//! [`Handoff::offer`] takes the sender and delivers; later offers are dropped.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

pub struct Handoff<T> {
    slot: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for Handoff<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Create a handoff and the receiver for its single value.
pub fn handoff<T>() -> (Handoff<T>, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    let handoff = Handoff {
        slot: Arc::new(Mutex::new(Some(tx))),
    };
    (handoff, rx)
}

impl<T> Handoff<T> {
    /// Offer a value. Returns `true` only for the offer that was delivered.
    pub fn offer(&self, value: T) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether a value has already been offered (delivered or not).
    pub fn is_spent(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
