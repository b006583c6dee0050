//! Approval callback registry.
//!
//! Maps an approval ID to the single handler waiting on it. The webhook listener
//! resolves entries; waiters insert them and clear them on timeout. Both sides go
//! through one lock and `remove` is the arbitration point: whoever takes the entry
//! out of the map owns the outcome, so a handler runs at most once.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::errors::GuardError;
use crate::models::approval::ApprovalDecision;

pub type ApprovalCallback = Box<dyn FnOnce(ApprovalDecision) + Send + 'static>;

/// Result of [`CallbackRegistry::wait_for_approval`].
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Decided(ApprovalDecision),
    /// No decision arrived in time. The registration has been removed.
    TimedOut,
    /// The registration was removed with `unregister_callback` while waiting.
    Cancelled,
}

impl WaitOutcome {
    pub fn decision(&self) -> Option<&ApprovalDecision> {
        match self {
            WaitOutcome::Decided(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

struct Entry {
    token: u64,
    callback: ApprovalCallback,
}

#[derive(Clone, Default)]
pub struct CallbackRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    next_token: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Handlers run outside the lock, so a poisoned map is still consistent.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, approval_id: &str, callback: ApprovalCallback) -> Result<u64, GuardError> {
        let mut entries = self.entries();
        if entries.contains_key(approval_id) {
            return Err(GuardError::DuplicateRegistration(approval_id.to_string()));
        }
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        entries.insert(approval_id.to_string(), Entry { token, callback });
        Ok(token)
    }

    /// Remove `approval_id` only if it still belongs to the registration `token`.
    fn remove_owned(&self, approval_id: &str, token: u64) -> bool {
        let mut entries = self.entries();
        match entries.get(approval_id) {
            Some(entry) if entry.token == token => {
                entries.remove(approval_id);
                true
            }
            _ => false,
        }
    }

    /// Attach a one-shot handler to `approval_id`.
    /// Fails if the ID already has a handler.
    pub fn register_callback<F>(&self, approval_id: &str, callback: F) -> Result<(), GuardError>
    where
        F: FnOnce(ApprovalDecision) + Send + 'static,
    {
        self.insert(approval_id, Box::new(callback))?;
        debug!(approval_id, "approval callback registered");
        Ok(())
    }

    /// Returns whether a handler was registered.
    pub fn unregister_callback(&self, approval_id: &str) -> bool {
        let removed = self.entries().remove(approval_id).is_some();
        if removed {
            debug!(approval_id, "approval callback unregistered");
        }
        removed
    }

    pub fn is_registered(&self, approval_id: &str) -> bool {
        self.entries().contains_key(approval_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand `decision` to the handler registered for its ID.
    ///
    /// Returns `false` when nobody is waiting (e.g. the waiter already timed out);
    /// such decisions are dropped. A panicking handler is logged and contained.
    pub fn resolve(&self, decision: ApprovalDecision) -> bool {
        let approval_id = decision.approval_id.clone();
        let entry = self.entries().remove(&approval_id);

        let Some(entry) = entry else {
            info!(approval_id = %approval_id, "no waiter registered for approval, ignoring decision");
            return false;
        };

        let callback = entry.callback;
        if catch_unwind(AssertUnwindSafe(move || callback(decision))).is_err() {
            error!(approval_id = %approval_id, "approval callback panicked");
        } else {
            debug!(approval_id = %approval_id, "approval callback invoked");
        }
        true
    }

    /// Wait until a decision for `approval_id` is resolved or `timeout` elapses.
    ///
    /// The registration never outlives the call: it is cleared on timeout and if
    /// the returned future is dropped early.
    pub async fn wait_for_approval(
        &self,
        approval_id: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, GuardError> {
        let (tx, mut rx) = oneshot::channel();
        let token = self.insert(
            approval_id,
            Box::new(move |decision: ApprovalDecision| {
                let _ = tx.send(decision);
            }),
        )?;
        let _registration = Registration {
            registry: self,
            approval_id,
            token,
        };

        debug!(approval_id, timeout_secs = timeout.as_secs_f64(), "waiting for approval webhook");

        let outcome = match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(decision)) => WaitOutcome::Decided(decision),
            Ok(Err(_)) => WaitOutcome::Cancelled,
            Err(_) => {
                if self.remove_owned(approval_id, token) {
                    WaitOutcome::TimedOut
                } else {
                    // The listener took the entry just as the timer fired; its
                    // handler is about to (or already did) send.
                    match rx.await {
                        Ok(decision) => WaitOutcome::Decided(decision),
                        Err(_) => WaitOutcome::Cancelled,
                    }
                }
            }
        };

        match &outcome {
            WaitOutcome::Decided(d) => {
                info!(approval_id, status = %d.status, "approval decision received")
            }
            WaitOutcome::TimedOut => warn!(approval_id, "timed out waiting for approval"),
            WaitOutcome::Cancelled => debug!(approval_id, "approval wait cancelled"),
        }
        Ok(outcome)
    }
}

/// Clears a wait's registration when the wait ends, however it ends.
struct Registration<'a> {
    registry: &'a CallbackRegistry,
    approval_id: &'a str,
    token: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.remove_owned(self.approval_id, self.token);
    }
}
