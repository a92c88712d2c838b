//! Command acknowledgement table.
//!
//! Every dispatched command gets an [`EventId`] recorded as pending. An
//! `EVENT_RESULT` frame from the extension settles it. The table keeps only
//! the most recent [`MAX_TRACKED_EVENTS`] ids.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::identifiers::EventId;
use crate::protocol::EventResult;

// ============================================================================
// Constants
// ============================================================================

/// Number of event ids remembered.
pub const MAX_TRACKED_EVENTS: usize = 512;

/// Default time [`EventResults::wait`] waits for an acknowledgement.
pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll interval used by [`EventResults::wait`].
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// EventResults
// ============================================================================

#[derive(Debug, Default)]
struct Table {
    results: FxHashMap<EventId, EventResult>,
    order: VecDeque<EventId>,
}

/// Bounded map of event id to command outcome.
#[derive(Debug, Default)]
pub struct EventResults {
    inner: Mutex<Table>,
}

impl EventResults {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly dispatched command as pending.
    pub fn insert_pending(&self, id: EventId) {
        let mut table = self.inner.lock();
        if table.results.insert(id, EventResult::Pending).is_none() {
            table.order.push_back(id);
        }
        while table.order.len() > MAX_TRACKED_EVENTS {
            if let Some(oldest) = table.order.pop_front() {
                table.results.remove(&oldest);
            }
        }
    }

    /// Settles a pending command. Returns `false` for unknown ids.
    pub fn settle(&self, id: EventId, result: EventResult) -> bool {
        let mut table = self.inner.lock();
        match table.results.get_mut(&id) {
            Some(slot) => {
                *slot = result;
                trace!(event_id = %id, ?result, "Event result recorded");
                true
            }
            None => {
                debug!(event_id = %id, ?result, "Result for unknown event");
                false
            }
        }
    }

    /// Forgets an event id.
    pub fn remove(&self, id: EventId) {
        let mut table = self.inner.lock();
        if table.results.remove(&id).is_some() {
            table.order.retain(|tracked| *tracked != id);
        }
    }

    /// Returns the recorded outcome, `None` if the id is not tracked.
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<EventResult> {
        self.inner.lock().results.get(&id).copied()
    }

    /// Returns the number of tracked ids.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().results.len()
    }

    /// Returns `true` if nothing is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Polls until the command is settled or `timeout` elapses.
    ///
    /// Returns [`EventResult::Failed`] on timeout or for an unknown id.
    pub async fn wait(&self, id: EventId, timeout: Duration) -> EventResult {
        let deadline = Instant::now() + timeout;
        loop {
            match self.get(id) {
                Some(result) if result.is_settled() => return result,
                Some(_) => {}
                None => return EventResult::Failed,
            }
            if Instant::now() >= deadline {
                debug!(event_id = %id, "Event result timed out");
                return EventResult::Failed;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_pending_then_settled() {
        let results = EventResults::new();
        let id = EventId::next();

        results.insert_pending(id);
        assert_eq!(results.get(id), Some(EventResult::Pending));

        assert!(results.settle(id, EventResult::Succeeded));
        assert_eq!(results.get(id), Some(EventResult::Succeeded));
    }

    #[test]
    fn test_unknown_id_not_settled() {
        let results = EventResults::new();
        assert!(!results.settle(EventId::next(), EventResult::Succeeded));
        assert!(results.is_empty());
    }

    #[test]
    fn test_table_is_bounded() {
        let results = EventResults::new();
        let first = EventId::next();
        results.insert_pending(first);
        for _ in 0..MAX_TRACKED_EVENTS {
            results.insert_pending(EventId::next());
        }

        assert_eq!(results.len(), MAX_TRACKED_EVENTS);
        assert_eq!(results.get(first), None);
    }

    #[test]
    fn test_wait_returns_settled_result_immediately() {
        let results = EventResults::new();
        let id = EventId::next();
        results.insert_pending(id);
        results.settle(id, EventResult::Failed);

        let outcome = tokio_test::block_on(results.wait(id, Duration::ZERO));
        assert_eq!(outcome, EventResult::Failed);
        assert_eq!(
            tokio_test::block_on(results.wait(EventId::next(), DEFAULT_RESULT_TIMEOUT)),
            EventResult::Failed
        );
    }

    #[tokio::test]
    async fn test_wait_times_out_as_failed() {
        let results = EventResults::new();
        let id = EventId::next();
        results.insert_pending(id);

        let outcome = results.wait(id, Duration::from_millis(30)).await;
        assert_eq!(outcome, EventResult::Failed);
    }

    #[tokio::test]
    async fn test_wait_sees_settlement() {
        let results = Arc::new(EventResults::new());
        let id = EventId::next();
        results.insert_pending(id);

        let settler = Arc::clone(&results);
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            settler.settle(id, EventResult::Succeeded);
        });

        assert_eq!(results.wait(id, DEFAULT_RESULT_TIMEOUT).await, EventResult::Succeeded);
    }
}
