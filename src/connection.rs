//! Per-TCP-socket state (§3, §4.3, §4.4).
//!
//! A `Connection` owns no socket itself — the net task does, identified by
//! the opaque [`ConnectionHandle`] it hands back from `connect`. What the
//! connection owns is purely protocol-level bookkeeping: which sessions
//! have been promoted onto it (keyed by the server-assigned Session-ID) and
//! which are still waiting for their first SETUP response.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::session::SessionHandle;

/// Stable identifier for a [`Connection`], handed out by the net task and
/// threaded through every `Session`'s weak back-pointer (§9 REDESIGN FLAGS:
/// "identify Connections by stable handles ... store the handle, not an
/// owning reference").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(usize);

impl ConnectionHandle {
    /// Construct a handle for an identifier the net task implementation
    /// assigned itself (a slab index, a socket fd, a monotonic counter —
    /// whatever is stable for the connection's lifetime).
    pub fn new(id: usize) -> Self {
        ConnectionHandle(id)
    }

    pub fn id(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Per-connection protocol state (§3 Connection entity).
///
/// Invariant: a session handle appears in at most one of `session_table`
/// or `pending_session_queue` (§8 property 3, promotion exclusivity).
pub struct Connection {
    pub handle: ConnectionHandle,
    /// Established sessions, keyed by server-assigned Session-ID.
    pub session_table: HashMap<String, SessionHandle>,
    /// Sessions that have sent SETUP but have no Session-ID yet.
    pub pending_session_queue: VecDeque<SessionHandle>,
    /// Bytes received but not yet decoded into a complete message.
    pub read_buffer: Vec<u8>,
}

impl Connection {
    pub fn new(handle: ConnectionHandle) -> Self {
        Connection {
            handle,
            session_table: HashMap::new(),
            pending_session_queue: VecDeque::new(),
            read_buffer: Vec::new(),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.session_table.is_empty() && self.pending_session_queue.is_empty()
    }

    /// Move a pending session to the established table under `session_id`,
    /// per §4.3's "promote pending to established" transition.
    pub fn promote(&mut self, session: SessionHandle, session_id: String) {
        self.pending_session_queue.retain(|s| *s != session);
        self.session_table.insert(session_id, session);
    }
}
