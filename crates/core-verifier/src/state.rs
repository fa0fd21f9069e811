use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use modguard_allowlist::SharedAllowlist;
use modguard_codec::Reassembly;
use modguard_core_types::PeerId;

/// Identifies one verification attempt of a peer.
///
/// Ids are allocated in increasing order, so a reconnecting peer never reuses the
/// id of its previous session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The deadline timer of a session.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeout {
    pub peer: PeerId,
    pub session: SessionId,
}

impl Timeout {
    pub fn new(peer: PeerId, session: SessionId) -> Self {
        Self { peer, session }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Params {
    /// How long a peer has to deliver its full report
    pub wait_duration: Duration,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            wait_duration: Duration::from_secs(10),
        }
    }
}

/// A peer that has been asked for its report and has not answered in full yet.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub peer: PeerId,
    pub started_at: Instant,
    pub deadline: Instant,
    pub reassembly: Reassembly,
}

impl Session {
    pub fn new(id: SessionId, peer: PeerId, wait_duration: Duration) -> Self {
        let started_at = Instant::now();

        Self {
            id,
            peer,
            started_at,
            deadline: started_at + wait_duration,
            reassembly: Reassembly::new(),
        }
    }

    pub fn timeout(&self) -> Timeout {
        Timeout::new(self.peer.clone(), self.id)
    }
}

#[derive(Debug)]
pub struct State {
    pub params: Params,

    /// The allowlist reports are checked against
    pub allowlist: SharedAllowlist,

    /// Peers currently connected to the server, verified or not
    pub connected: BTreeSet<PeerId>,

    /// At most one live session per peer
    pub sessions: BTreeMap<PeerId, Session>,

    next_session: u64,
}

impl State {
    pub fn new(params: Params, allowlist: SharedAllowlist) -> Self {
        Self {
            params,
            allowlist,
            connected: BTreeSet::new(),
            sessions: BTreeMap::new(),
            next_session: 0,
        }
    }

    /// Start a fresh session for `peer`.
    ///
    /// Returns the timer of the new session and the session it replaces, if any.
    pub fn start_session(&mut self, peer: PeerId) -> (Timeout, Option<Session>) {
        let id = SessionId::new(self.next_session);
        self.next_session += 1;

        let session = Session::new(id, peer.clone(), self.params.wait_duration);
        let timeout = session.timeout();
        let replaced = self.sessions.insert(peer, session);

        (timeout, replaced)
    }

    pub fn remove_session(&mut self, peer: &PeerId) -> Option<Session> {
        self.sessions.remove(peer)
    }

    pub fn session(&self, peer: &PeerId) -> Option<&Session> {
        self.sessions.get(peer)
    }

    pub fn is_pending(&self, peer: &PeerId) -> bool {
        self.sessions.contains_key(peer)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Forget every peer and session, returning the sessions that were live.
    pub fn reset(&mut self) -> Vec<Session> {
        self.connected.clear();
        std::mem::take(&mut self.sessions).into_values().collect()
    }
}
