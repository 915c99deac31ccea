//! Identity change notifications.
//!
//! Every publication bumps a monotonically increasing epoch so consumers can
//! tell which of two interleaved notifications is newer.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::ExternalIdentity;

/// Identity state at one point in the event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub epoch: u64,
    pub identity: Option<ExternalIdentity>,
}

/// Shared identity event channel. Clones publish to the same stream.
#[derive(Debug, Clone)]
pub struct IdentityEvents {
    sender: Arc<watch::Sender<IdentitySnapshot>>,
}

impl Default for IdentityEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityEvents {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(IdentitySnapshot::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish a new identity state and return its epoch.
    pub fn publish(&self, identity: Option<ExternalIdentity>) -> u64 {
        let mut epoch = 0;
        self.sender.send_modify(|snapshot| {
            snapshot.epoch += 1;
            snapshot.identity = identity;
            epoch = snapshot.epoch;
        });
        epoch
    }

    pub fn current(&self) -> IdentitySnapshot {
        self.sender.borrow().clone()
    }

    /// Deliver the current snapshot, then every later one, to `callback`.
    ///
    /// Delivery runs on a spawned task, so a runtime must be active. Bursts
    /// of publications may coalesce; the callback always sees the newest.
    pub fn subscribe<F>(&self, mut callback: F) -> IdentitySubscription
    where
        F: FnMut(&IdentitySnapshot) + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                let snapshot = receiver.borrow_and_update().clone();
                callback(&snapshot);
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        });
        IdentitySubscription { task: Some(task) }
    }
}

/// Guard for an active subscription. Dropping it stops delivery.
#[derive(Debug)]
pub struct IdentitySubscription {
    task: Option<JoinHandle<()>>,
}

impl IdentitySubscription {
    /// Stop delivery. No callback starts after this returns.
    pub fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        self.release();
    }
}
