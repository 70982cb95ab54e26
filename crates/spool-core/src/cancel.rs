use crate::request_id::RequestId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Pending/cancelled bookkeeping for in-flight requests.
///
/// The tracker is the only shared mutable state in the reactor layer. Both
/// sets live in a single map guarded by one lock: an entry's presence means
/// the id is pending, and its `cancelled` flag means the id is also in the
/// cancelled set. That representation makes `cancelled ⊆ pending` structural
/// and lets every operation run as one critical section.
///
/// The tracker is an owned component: construct one per server instance and
/// share it by `Arc`, so independent sessions (and tests) never interfere.
///
/// # Examples
///
/// ```
/// use spool_core::{CancellationTracker, RequestId};
///
/// let tracker = CancellationTracker::new();
/// let id = RequestId::from(1);
///
/// tracker.mark_pending(id.clone());
/// assert!(tracker.cancel(&id));
/// assert!(!tracker.cancel(&id)); // duplicate cancel is a no-op
///
/// tracker.clear(&id);
/// assert_eq!(tracker.pending_count(), 0);
/// ```
pub struct CancellationTracker {
    requests: Mutex<HashMap<RequestId, Entry>>,
}

struct Entry {
    token: CancellationToken,
    cancelled: bool,
}

impl CancellationTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn requests(&self) -> MutexGuard<'_, HashMap<RequestId, Entry>> {
        // No task ever holds the lock across a suspension point, so a
        // poisoned lock only means a panicking thread died mid-update of a
        // single entry; the map itself stays usable.
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `id` to the pending set.
    ///
    /// Returns `false` if the id was already pending. Id uniqueness while
    /// pending is a caller obligation; on a collision the existing entry is
    /// kept so an in-flight cancellation wait is not orphaned.
    pub fn mark_pending(&self, id: RequestId) -> bool {
        let mut requests = self.requests();
        if requests.contains_key(&id) {
            tracing::warn!(%id, "request id reused while still pending");
            return false;
        }
        requests.insert(
            id,
            Entry {
                token: CancellationToken::new(),
                cancelled: false,
            },
        );
        true
    }

    /// Moves a pending `id` into the cancelled set and wakes its waiter.
    ///
    /// A no-op for ids that are not pending (never dispatched, or already
    /// responded and cleared); this bound keeps the cancelled set from
    /// growing for ids the reactor will never look at. Repeated cancels are
    /// idempotent. Returns whether the cancellation was newly observed.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let mut requests = self.requests();
        match requests.get_mut(id) {
            Some(entry) if !entry.cancelled => {
                entry.cancelled = true;
                entry.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Suspends until `id` is in the cancelled set.
    ///
    /// Returns immediately if the id is already cancelled. For an id that
    /// was never marked pending the future never resolves; the reactor only
    /// ever races this against the handler for a pending id, and the race
    /// discards whichever side loses.
    pub async fn cancelled(&self, id: &RequestId) {
        let token = self
            .requests()
            .get(id)
            .map(|entry| entry.token.clone());
        match token {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Removes `id` from both sets unconditionally.
    ///
    /// Must be invoked exactly once per request, on every exit path; calling
    /// it again (or for an id that was never pending) is a safe no-op.
    pub fn clear(&self, id: &RequestId) {
        self.requests().remove(id);
    }

    /// Returns whether `id` is pending.
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.requests().contains_key(id)
    }

    /// Returns whether `id` is pending and already cancelled.
    pub fn is_cancelled(&self, id: &RequestId) -> bool {
        self.requests().get(id).is_some_and(|entry| entry.cancelled)
    }

    /// Number of requests currently pending.
    pub fn pending_count(&self) -> usize {
        self.requests().len()
    }

    /// Number of pending requests that have been cancelled.
    pub fn cancelled_count(&self) -> usize {
        self.requests()
            .values()
            .filter(|entry| entry.cancelled)
            .count()
    }
}

impl Default for CancellationTracker {
    fn default() -> Self {
        Self::new()
    }
}
