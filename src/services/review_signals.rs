//! Listeners for review lifecycle events.
//!
//! Instead of a process-wide signal bus, callers build a `ReviewSignals`
//! value, connect listeners to it, and pass it to the operations that emit
//! events. Listeners run synchronously in registration order, outside the
//! registry lock, so a listener may connect or disconnect listeners; those
//! changes apply from the next event on.

use crate::models::{Review, User};
use std::sync::{Arc, RwLock};

/// Error type returned by listeners; its `Display` text is reported to the
/// caller when a listener vetoes an operation.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Arc<dyn Fn(&ReviewEvent<'_>) -> Result<(), ListenerError> + Send + Sync>;

/// Handle for disconnecting a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Which lifecycle point an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEventKind {
    /// Before a Ship It! is revoked. A failing listener aborts the revocation.
    ShipItRevoking,
    /// After a Ship It! was revoked and saved.
    ShipItRevoked,
    /// After a review was published.
    Published,
}

/// Event payload handed to listeners.
#[derive(Debug)]
pub struct ReviewEvent<'a> {
    pub kind: ReviewEventKind,
    pub user: &'a User,
    pub review: &'a Review,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, ReviewEventKind, Listener)>,
}

/// A set of review lifecycle listeners.
#[derive(Default)]
pub struct ReviewSignals {
    registry: RwLock<Registry>,
}

impl ReviewSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a listener for one kind of event.
    pub fn connect<F>(&self, kind: ReviewEventKind, listener: F) -> ListenerId
    where
        F: Fn(&ReviewEvent<'_>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.listeners.push((id, kind, Arc::new(listener)));
        id
    }

    pub fn connect_revoking<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ReviewEvent<'_>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.connect(ReviewEventKind::ShipItRevoking, listener)
    }

    pub fn connect_revoked<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ReviewEvent<'_>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.connect(ReviewEventKind::ShipItRevoked, listener)
    }

    pub fn connect_published<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ReviewEvent<'_>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.connect(ReviewEventKind::Published, listener)
    }

    /// Disconnect a listener. Returns whether it was connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        let before = registry.listeners.len();
        registry.listeners.retain(|(listener_id, _, _)| *listener_id != id);
        registry.listeners.len() != before
    }

    /// Snapshot the listeners for one kind of event.
    fn listeners_for(&self, kind: ReviewEventKind) -> Vec<(ListenerId, Listener)> {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        registry
            .listeners
            .iter()
            .filter(|(_, listener_kind, _)| *listener_kind == kind)
            .map(|(id, _, listener)| (*id, Arc::clone(listener)))
            .collect()
    }

    /// Run listeners for the event, stopping at the first failure.
    pub fn send(&self, event: &ReviewEvent<'_>) -> Result<(), ListenerError> {
        self.listeners_for(event.kind)
            .iter()
            .try_for_each(|(_, listener)| listener(event))
    }

    /// Run every listener for the event, logging failures instead of
    /// returning them.
    pub fn send_robust(&self, event: &ReviewEvent<'_>) {
        for (id, listener) in self.listeners_for(event.kind) {
            if let Err(e) = listener(event) {
                log::error!(
                    "[reviews] {:?} listener {:?} failed for review {}: {}",
                    event.kind,
                    id,
                    event.review.id,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user() -> User {
        User {
            id: 1,
            username: "doc".to_string(),
            email: String::new(),
            password_hash: String::new(),
            is_superuser: false,
            is_active: true,
            date_joined: 0,
        }
    }

    fn review() -> Review {
        Review {
            id: 1,
            review_request_id: 1,
            user_id: 1,
            base_reply_to_id: None,
            public: true,
            ship_it: true,
            body_top: Review::SHIP_IT_TEXT.to_string(),
            body_bottom: String::new(),
            timestamp: 0,
            extra_data: "{}".to_string(),
        }
    }

    #[test]
    fn test_send_filters_by_kind_and_stops_on_error() {
        let signals = ReviewSignals::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        signals.connect_revoking(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Err("oh no".into())
        });
        let c = calls.clone();
        signals.connect_revoking(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let c = calls.clone();
        signals.connect_revoked(move |_| {
            c.fetch_add(100, Ordering::SeqCst);
            Ok(())
        });

        let (user, review) = (user(), review());
        let err = signals
            .send(&ReviewEvent {
                kind: ReviewEventKind::ShipItRevoking,
                user: &user,
                review: &review,
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "oh no");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_robust_runs_all_listeners() {
        let signals = ReviewSignals::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for fail in [true, false] {
            let c = calls.clone();
            signals.connect_revoked(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err("boom".into())
                } else {
                    Ok(())
                }
            });
        }

        let (user, review) = (user(), review());
        signals.send_robust(&ReviewEvent {
            kind: ReviewEventKind::ShipItRevoked,
            user: &user,
            review: &review,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disconnect() {
        let signals = ReviewSignals::new();
        let id = signals.connect_published(|_| Err("never".into()));

        assert!(signals.disconnect(id));
        assert!(!signals.disconnect(id));

        let (user, review) = (user(), review());
        assert!(signals
            .send(&ReviewEvent {
                kind: ReviewEventKind::Published,
                user: &user,
                review: &review,
            })
            .is_ok());
    }

    #[test]
    fn test_listener_can_change_listeners() {
        let signals = Arc::new(ReviewSignals::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let (inner_signals, inner_calls) = (signals.clone(), calls.clone());
        signals.connect_published(move |_| {
            let c = inner_calls.clone();
            inner_signals.connect_published(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            inner_signals.disconnect(ListenerId(1));
            Ok(())
        });

        let (user, review) = (user(), review());
        let event = ReviewEvent {
            kind: ReviewEventKind::Published,
            user: &user,
            review: &review,
        };

        signals.send(&event).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        signals.send(&event).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
