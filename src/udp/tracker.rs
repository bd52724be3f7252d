//! Per-peer UDP session state.
//!
//! Each peer address moves through `absent -> dialing -> established`. The
//! first datagram from a new peer starts a dial; datagrams that arrive while
//! the dial is in flight are dropped rather than queued. A failed dial
//! removes the entry so the next datagram starts over.
//!
//! Entries carry a session number. Completion of a dial or teardown of a
//! session only touches the entry it created, so a stale task can never
//! clobber a newer session for the same peer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Queue feeding one established session's writer.
pub type SessionSender = mpsc::Sender<Vec<u8>>;

/// What to do with a datagram from a peer.
#[derive(Debug)]
pub enum Admission {
    /// New peer: the caller must dial and then call
    /// [`ConnTracker::establish`] or [`ConnTracker::remove_session`].
    Dial {
        /// Session number for the new entry.
        session: u64,
    },
    /// A dial is in flight; discard the datagram.
    Drop,
    /// Session is up; queue the datagram here.
    Forward(SessionSender),
}

/// Observable state of a tracked peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Dial in flight.
    Dialing,
    /// Connection open.
    Established,
}

#[derive(Debug)]
struct ConnState {
    session: u64,
    connection: Option<SessionSender>,
    waiting: bool,
}

#[derive(Debug, Default)]
struct Sessions {
    peers: HashMap<String, ConnState>,
    next_session: u64,
}

/// Shared map from peer address to session state.
///
/// Cloning is cheap and every clone sees the same map.
#[derive(Debug, Clone, Default)]
pub struct ConnTracker {
    inner: Arc<Mutex<Sessions>>,
}

impl ConnTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a datagram from `peer`, registering a dialing entry for a
    /// peer not seen before.
    pub fn admit(&self, peer: &str) -> Admission {
        let mut sessions = self.inner.lock();
        if let Some(state) = sessions.peers.get(peer) {
            return match (&state.connection, state.waiting) {
                (Some(sender), false) => Admission::Forward(sender.clone()),
                _ => Admission::Drop,
            };
        }

        let session = sessions.next_session;
        sessions.next_session += 1;
        sessions.peers.insert(
            peer.to_string(),
            ConnState {
                session,
                connection: None,
                waiting: true,
            },
        );
        Admission::Dial { session }
    }

    /// Record a successful dial. Returns `false` if the entry is gone or
    /// belongs to another session, in which case the caller should close
    /// its connection.
    pub fn establish(&self, peer: &str, session: u64, sender: SessionSender) -> bool {
        let mut sessions = self.inner.lock();
        match sessions.peers.get_mut(peer) {
            Some(state) if state.session == session && state.waiting => {
                state.connection = Some(sender);
                state.waiting = false;
                true
            }
            _ => false,
        }
    }

    /// Remove `peer` if its entry still belongs to `session`.
    pub fn remove_session(&self, peer: &str, session: u64) -> bool {
        let mut sessions = self.inner.lock();
        let owned = sessions
            .peers
            .get(peer)
            .is_some_and(|state| state.session == session);
        if owned {
            sessions.peers.remove(peer);
        }
        owned
    }

    /// Current phase of `peer`, if tracked.
    pub fn phase(&self, peer: &str) -> Option<SessionPhase> {
        self.inner.lock().peers.get(peer).map(|state| {
            if state.waiting {
                SessionPhase::Dialing
            } else {
                SessionPhase::Established
            }
        })
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.inner.lock().peers.len()
    }

    /// Check if no peers are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
