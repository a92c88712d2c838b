//! Registry of connected players.
//!
//! Owns every registered [`SessionHandle`], answers snapshot queries, picks
//! the active player and evicts sessions that stopped talking.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                Registry                  │
//! │  ┌────────────────────────────────────┐  │
//! │  │ PlayerId=1 → SessionHandle (tab A) │  │
//! │  │ PlayerId=2 → SessionHandle (tab B) │  │
//! │  │ PlayerId=4 → SessionHandle (app)   │  │
//! │  └────────────────────────────────────┘  │
//! │  active: PlayerId=2                      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Lock order is active, then map, then a handle's state. `Added`,
//! `Updated` and `Removed` handlers run with no lock held.
//! `ActivePlayerChanged` is delivered while the active slot is locked, so
//! concurrent refreshes report changes in the order they were selected.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `active` | Active-player selection policy |
//! | `events` | Player notifications |
//! | `handle` | Shared session handle |

// ============================================================================
// Submodules
// ============================================================================

/// Active-player selection policy.
pub mod active;

/// Player notifications.
pub mod events;

/// Shared session handle.
pub mod handle;

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::PlayerId;
use crate::player::{PlayerSnapshot, unix_millis};

// ============================================================================
// Re-exports
// ============================================================================

pub use active::{ActivePolicy, Candidate, DEFAULT_STOPPED_GRACE};
pub use events::{EventHandler, PlayerEvent};
pub use handle::{CloseReason, Outbound, SessionHandle};

// ============================================================================
// Registry
// ============================================================================

/// The set of registered sessions, ordered by id.
///
/// # Example
///
/// ```ignore
/// let registry = Registry::new(ActivePolicy::default());
/// let (handle, outbound_rx) = SessionHandle::new(PlayerId::next(), unix_millis());
/// registry.register(handle);
///
/// let active = registry.get_active(true)?;
/// ```
pub struct Registry {
    /// Registered sessions by id.
    sessions: RwLock<BTreeMap<PlayerId, Arc<SessionHandle>>>,
    /// Active-player policy.
    policy: ActivePolicy,
    /// Last active id reported to the event handler.
    active: Mutex<Option<PlayerId>>,
    /// Notification callback.
    event_handler: RwLock<Option<EventHandler>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("sessions", &self.len())
            .field("policy", &self.policy)
            .field("active", &*self.active.lock())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Registry - Constructor
// ============================================================================

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(policy: ActivePolicy) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            policy,
            active: Mutex::new(None),
            event_handler: RwLock::new(None),
        }
    }

    /// Returns the active-player policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> ActivePolicy {
        self.policy
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(ActivePolicy::default())
    }
}

// ============================================================================
// Registry - Membership
// ============================================================================

impl Registry {
    /// Adds a session and returns its id.
    pub fn register(&self, handle: Arc<SessionHandle>) -> PlayerId {
        let id = handle.id();
        let snapshot = handle.snapshot();

        self.sessions.write().insert(id, handle);
        info!(player_id = %id, "Player registered");

        self.emit(PlayerEvent::Added(snapshot));
        self.refresh_active();
        id
    }

    /// Removes a session. Returns the handle if it was registered.
    pub fn unregister(&self, id: PlayerId) -> Option<Arc<SessionHandle>> {
        let removed = self.sessions.write().remove(&id)?;
        info!(player_id = %id, "Player unregistered");

        self.emit(PlayerEvent::Removed(removed.snapshot()));
        self.refresh_active();
        Some(removed)
    }

    /// Returns the live handle for `id`.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Returns the number of registered sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Returns every registered id, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<PlayerId> {
        self.sessions.read().keys().copied().collect()
    }
}

// ============================================================================
// Registry - Queries
// ============================================================================

impl Registry {
    /// Returns a snapshot of one player.
    ///
    /// With `always_return_player` a missing player yields
    /// [`PlayerSnapshot::placeholder`] instead of an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPlayer`] if `id` is not registered.
    pub fn get_by_id(&self, id: PlayerId, always_return_player: bool) -> Result<PlayerSnapshot> {
        match self.get(id) {
            Some(handle) => Ok(handle.snapshot()),
            None if always_return_player => Ok(PlayerSnapshot::placeholder()),
            None => Err(Error::no_such_player(id)),
        }
    }

    /// Returns a snapshot of the active player.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPlayer`] with the placeholder id when no player
    /// qualifies and `always_return_player` is false.
    pub fn get_active(&self, always_return_player: bool) -> Result<PlayerSnapshot> {
        let active = self
            .select_active(unix_millis())
            .and_then(|id| self.get(id));

        match active {
            Some(handle) => Ok(handle.snapshot()),
            None if always_return_player => Ok(PlayerSnapshot::placeholder()),
            None => Err(Error::no_such_player(PlayerId::PLACEHOLDER)),
        }
    }

    /// Returns snapshots of every player in ascending id order.
    #[must_use]
    pub fn get_all(&self) -> Vec<PlayerSnapshot> {
        self.sessions
            .read()
            .values()
            .map(|handle| handle.snapshot())
            .collect()
    }

    fn select_active(&self, now_ms: u64) -> Option<PlayerId> {
        let candidates: Vec<Candidate> = self
            .sessions
            .read()
            .values()
            .map(|handle| handle.candidate())
            .collect();

        self.policy.select(candidates, now_ms)
    }
}

// ============================================================================
// Registry - Notifications
// ============================================================================

impl Registry {
    /// Sets the notification callback, replacing any previous one.
    pub fn set_event_handler(&self, handler: EventHandler) {
        *self.event_handler.write() = Some(handler);
    }

    /// Clears the notification callback.
    pub fn clear_event_handler(&self) {
        *self.event_handler.write() = None;
    }

    /// Reports that a registered player's state changed.
    pub fn notify_updated(&self, handle: &SessionHandle) {
        if self.get(handle.id()).is_none() {
            return;
        }
        self.emit(PlayerEvent::Updated(handle.snapshot()));
        self.refresh_active();
    }

    /// Recomputes the active player and reports a change.
    pub fn refresh_active(&self) {
        let mut active = self.active.lock();
        let selected = self.select_active(unix_millis());
        if *active == selected {
            return;
        }
        *active = selected;

        debug!(player_id = ?selected, "Active player changed");
        let snapshot = selected.and_then(|id| self.get(id)).map(|h| h.snapshot());
        // held until delivered
        self.emit(PlayerEvent::ActivePlayerChanged(snapshot));
    }

    fn emit(&self, event: PlayerEvent) {
        let handler = self.event_handler.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

// ============================================================================
// Registry - Liveness
// ============================================================================

impl Registry {
    /// Evicts sessions silent for longer than `liveness_timeout`.
    ///
    /// Each evicted session is unregistered and told to close its socket.
    /// Returns the evicted ids.
    pub fn sweep_stale(&self, now: Instant, liveness_timeout: Duration) -> Vec<PlayerId> {
        let stale: Vec<PlayerId> = self
            .sessions
            .read()
            .values()
            .filter(|handle| now.saturating_duration_since(handle.last_seen()) > liveness_timeout)
            .map(|handle| handle.id())
            .collect();

        for id in &stale {
            if let Some(handle) = self.unregister(*id) {
                warn!(
                    player_id = %id,
                    timeout_ms = liveness_timeout.as_millis() as u64,
                    "Evicting stale player"
                );
                handle.close(CloseReason::Stale);
            }
        }

        stale
    }

    /// Tells every session to close. Returns how many were signalled.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let handles: Vec<_> = self.sessions.read().values().cloned().collect();
        for handle in &handles {
            handle.close(reason);
        }
        handles.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::player::PlaybackState;
    use crate::protocol::FieldUpdate;

    fn registered(registry: &Registry) -> (Arc<SessionHandle>, tokio::sync::mpsc::UnboundedReceiver<Outbound>) {
        let (handle, rx) = SessionHandle::new(PlayerId::next(), unix_millis());
        registry.register(Arc::clone(&handle));
        (handle, rx)
    }

    #[test]
    fn test_get_all_ascending_ids() {
        let registry = Registry::default();
        let (a, _ra) = SessionHandle::new(PlayerId::next(), 0);
        let (b, _rb) = SessionHandle::new(PlayerId::next(), 0);
        let (c, _rc) = SessionHandle::new(PlayerId::next(), 0);

        // registration order differs from id order
        registry.register(Arc::clone(&c));
        registry.register(Arc::clone(&a));
        registry.register(Arc::clone(&b));
        registry.unregister(b.id());

        let ids: Vec<_> = registry.get_all().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id(), c.id()]);
    }

    #[test]
    fn test_get_by_id_and_placeholder() {
        let registry = Registry::default();
        let (handle, _rx) = registered(&registry);

        assert_eq!(registry.get_by_id(handle.id(), false).expect("found").id, handle.id());

        registry.unregister(handle.id());
        assert!(matches!(
            registry.get_by_id(handle.id(), false),
            Err(Error::NoSuchPlayer { .. })
        ));
        assert!(registry.get_by_id(handle.id(), true).expect("placeholder").is_placeholder());
    }

    #[test]
    fn test_get_active_prefers_latest_activity() {
        let registry = Registry::default();
        let (first, _r1) = registered(&registry);
        let (second, _r2) = registered(&registry);
        let now = unix_millis();

        first.apply_field(&FieldUpdate::ActiveAt(now + 10), now);
        second.apply_field(&FieldUpdate::ActiveAt(now + 5), now);
        assert_eq!(registry.get_active(false).expect("active").id, first.id());

        second.apply_field(&FieldUpdate::ActiveAt(now + 10), now);
        assert_eq!(registry.get_active(false).expect("active").id, second.id());
    }

    #[test]
    fn test_get_active_empty() {
        let registry = Registry::default();
        assert!(registry.get_active(false).is_err());

        let placeholder = registry.get_active(true).expect("placeholder");
        assert!(placeholder.is_placeholder());
        assert!(placeholder.capabilities.is_empty());
    }

    #[test]
    fn test_events_emitted() {
        let registry = Registry::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.set_event_handler(Arc::new(move |event| sink.lock().push(event)));

        let (handle, _rx) = registered(&registry);
        handle.apply_field(&FieldUpdate::State(PlaybackState::Playing), unix_millis());
        registry.notify_updated(&handle);
        registry.unregister(handle.id());

        let events = seen.lock();
        assert!(matches!(events[0], PlayerEvent::Added(_)));
        assert!(matches!(events[1], PlayerEvent::ActivePlayerChanged(Some(_))));
        assert!(matches!(events[2], PlayerEvent::Updated(ref s) if s.state == PlaybackState::Playing));
        assert!(matches!(events[3], PlayerEvent::Removed(_)));
        assert!(matches!(events[4], PlayerEvent::ActivePlayerChanged(None)));
    }

    #[test]
    fn test_active_changes_delivered_in_selection_order() {
        let registry = Registry::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.set_event_handler(Arc::new(move |event| {
            if let PlayerEvent::ActivePlayerChanged(snapshot) = event {
                sink.lock().push(snapshot.map(|s| s.id));
            }
        }));

        let (first, _r1) = registered(&registry);
        let (second, _r2) = registered(&registry);
        let base = unix_millis();

        std::thread::scope(|scope| {
            for (handle, offset) in [(&first, 0u64), (&second, 1u64)] {
                let registry = &registry;
                scope.spawn(move || {
                    for round in 0..200u64 {
                        let at = base + round * 2 + offset;
                        handle.apply_field(&FieldUpdate::ActiveAt(at), base);
                        registry.refresh_active();
                    }
                });
            }
        });
        registry.refresh_active();

        let events = seen.lock();
        let live = registry.get_active(false).expect("active").id;
        assert_eq!(events.last().copied().flatten(), Some(live));
        assert!(events.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_update_after_unregister_is_silent() {
        let registry = Registry::default();
        let (handle, _rx) = registered(&registry);
        registry.unregister(handle.id());

        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        registry.set_event_handler(Arc::new(move |_| *sink.lock() += 1));
        registry.notify_updated(&handle);
        assert_eq!(*seen.lock(), 0);
    }

    #[test]
    fn test_sweep_evicts_silent_sessions() {
        let registry = Registry::default();
        let (quiet, mut quiet_rx) = registered(&registry);
        let (chatty, _chatty_rx) = registered(&registry);

        let later = Instant::now() + Duration::from_secs(31);
        chatty.touch(later);

        let evicted = registry.sweep_stale(later, Duration::from_secs(30));
        assert_eq!(evicted, vec![quiet.id()]);
        assert!(registry.get_by_id(quiet.id(), false).is_err());
        assert!(registry.get_by_id(chatty.id(), false).is_ok());
        assert_eq!(quiet_rx.try_recv().ok(), Some(Outbound::Close(CloseReason::Stale)));
    }

    #[test]
    fn test_close_all_signals_every_session() {
        let registry = Registry::default();
        let (_a, mut ra) = registered(&registry);
        let (_b, mut rb) = registered(&registry);

        assert_eq!(registry.close_all(CloseReason::Shutdown), 2);
        assert_eq!(ra.try_recv().ok(), Some(Outbound::Close(CloseReason::Shutdown)));
        assert_eq!(rb.try_recv().ok(), Some(Outbound::Close(CloseReason::Shutdown)));
    }
}
