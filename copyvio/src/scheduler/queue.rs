//! Ordered work queue with per-domain exclusivity.
//!
//! The queue and the busy-domain table live behind one lock, so "find a
//! candidate whose domain is free and mark the domain busy" is a single
//! atomic step. A claimed domain is released when its [`DomainSlot`] drops,
//! which covers normal completion, errors, panics and task aborts alike.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::cancellation::CancellationToken;
use crate::core::Candidate;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Candidate>,
    busy: HashSet<String>,
}

/// Shared queue of candidates for one check.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    released: Notify,
}

/// A claimed candidate together with its domain slot.
#[derive(Debug)]
pub struct Claim {
    /// The candidate to fetch.
    pub candidate: Candidate,
    /// Exclusive hold on the candidate's domain.
    pub slot: DomainSlot,
}

/// Exclusive hold on one domain. Dropping it frees the domain.
#[derive(Debug)]
pub struct DomainSlot {
    queue: Arc<WorkQueue>,
    domain: String,
}

impl DomainSlot {
    /// The held domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl Drop for DomainSlot {
    fn drop(&mut self) {
        self.queue.state.lock().busy.remove(&self.domain);
        self.queue.released.notify_waiters();
    }
}

impl WorkQueue {
    /// Creates a queue holding `candidates` in order.
    #[must_use]
    pub fn new(candidates: impl IntoIterator<Item = Candidate>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                pending: candidates.into_iter().collect(),
                busy: HashSet::new(),
            }),
            released: Notify::new(),
        })
    }

    /// Number of candidates not yet claimed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether `domain` is currently held.
    #[must_use]
    pub fn is_busy(&self, domain: &str) -> bool {
        self.state.lock().busy.contains(domain)
    }

    /// Claims the first pending candidate whose domain is free.
    ///
    /// Waits while every pending candidate's domain is held. Returns `None`
    /// once the queue is empty or `token` is cancelled.
    pub async fn claim(self: &Arc<Self>, token: &CancellationToken) -> Option<Claim> {
        loop {
            if token.is_cancelled() {
                return None;
            }

            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                if state.pending.is_empty() {
                    return None;
                }
                let free = state
                    .pending
                    .iter()
                    .position(|c| !state.busy.contains(&c.domain));
                if let Some(candidate) = free.and_then(|pos| state.pending.remove(pos)) {
                    state.busy.insert(candidate.domain.clone());
                    let slot = DomainSlot {
                        queue: Arc::clone(self),
                        domain: candidate.domain.clone(),
                    };
                    return Some(Claim { candidate, slot });
                }
            }

            tokio::select! {
                () = &mut released => {}
                () = token.cancelled() => return None,
            }
        }
    }
}
