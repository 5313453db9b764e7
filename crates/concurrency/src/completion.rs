//! Completion delivery
//!
//! An operation reports its final status exactly once through a
//! `CompletionCallback`. A waiting caller typically owns a `Synchronizer` and
//! hands the operation a callback that holds it only weakly, so a caller that
//! gives up waiting is never kept alive by the operation.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tabula_core::Result;
use tracing::debug;

/// Final status of an operation as seen by its submitter
pub type CompletionStatus = Result<()>;

/// One-shot consumer of a completion status
pub type CompletionCallback = Box<dyn FnOnce(CompletionStatus) + Send + 'static>;

/// Caller-owned slot a single status is delivered into
#[derive(Debug, Default)]
pub struct Synchronizer {
    status: Mutex<Option<CompletionStatus>>,
    cond: Condvar,
}

impl Synchronizer {
    /// Create an empty synchronizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the status and wake waiters
    ///
    /// Only the first delivery is kept.
    pub fn status_cb(&self, status: CompletionStatus) {
        let mut slot = self.status.lock();
        if slot.is_some() {
            debug!(?status, "Synchronizer already completed, dropping status");
            return;
        }
        *slot = Some(status);
        self.cond.notify_all();
    }

    /// True once a status was delivered
    pub fn is_done(&self) -> bool {
        self.status.lock().is_some()
    }

    /// Block until a status is delivered
    pub fn wait(&self) -> CompletionStatus {
        let mut slot = self.status.lock();
        loop {
            if let Some(status) = slot.as_ref() {
                return status.clone();
            }
            self.cond.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`; `None` if nothing arrived in time
    pub fn wait_for(&self, timeout: Duration) -> Option<CompletionStatus> {
        let mut slot = self.status.lock();
        if slot.is_none() {
            self.cond.wait_while_for(&mut slot, |s| s.is_none(), timeout);
        }
        slot.clone()
    }
}

/// Callback forwarding to `synchronizer` while it is still alive
///
/// If the synchronizer has been dropped by the time the status arrives, the
/// status is discarded.
pub fn make_weak_synchronizer_completion_callback(
    synchronizer: Weak<Synchronizer>,
) -> CompletionCallback {
    Box::new(move |status| {
        if let Some(synchronizer) = synchronizer.upgrade() {
            synchronizer.status_cb(status);
        }
    })
}
