//! Per-logical-session state (§3, §4.5).
//!
//! A session is born detached — no connection, no server-assigned ID — and
//! is promoted to "established" the moment a SETUP response carrying a
//! Session-ID is correlated against it (§4.3). `SessionRegistry` is the
//! thread-safe front the application holds: [`SessionRegistry::create`] can
//! be called from any thread (§4.1: "Thread-safe"), while the fields inside
//! a `Session` are only ever mutated from the event-loop thread (§5).

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::ConnectionHandle;
use crate::message::Message;

/// Stable identifier for a [`Session`], handed to the application by
/// [`SessionRegistry::create`] and passed back into every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub(crate) usize);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Mirrors the §4.5 state table. Derived alongside (not instead of) the
/// structural fields below — `id`/`connection`/`terminating` are what the
/// dispatch and correlation algorithms actually branch on; `phase` exists
/// so callers and tests can assert a transition happened without
/// reconstructing it from those fields by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Detached,
    Pending,
    Established,
    Terminating,
    Terminated,
}

/// A logical RTSP session (§3).
///
/// `T` is the opaque application object the caller attached at creation —
/// the per-session analogue of `rtsp_client_session_object_get/set` in the
/// source this core is modeled on.
pub struct Session<T> {
    pub handle: SessionHandle,
    pub server_ip: String,
    pub server_port: u16,
    pub resource_location: String,
    pub application_object: T,

    /// Server-assigned Session-ID, set on promotion (§4.3).
    pub id: Option<String>,
    pub last_cseq: u32,
    /// Invariant: `active_request.is_some() implies last_cseq == active_request.cseq`.
    pub active_request: Option<Message>,
    pub request_queue: VecDeque<Message>,
    pub terminating: bool,
    pub connection: Option<ConnectionHandle>,
    pub phase: SessionPhase,
}

impl<T> Session<T> {
    fn new(handle: SessionHandle, server_ip: String, server_port: u16, resource_location: String, application_object: T) -> Self {
        Session {
            handle,
            server_ip,
            server_port,
            resource_location,
            application_object,
            id: None,
            last_cseq: 0,
            active_request: None,
            request_queue: VecDeque::new(),
            terminating: false,
            connection: None,
            phase: SessionPhase::Detached,
        }
    }

    /// Compose the absolute URL for `resource_name` (§4.2 step 4).
    pub fn build_url(&self, resource_name: &str) -> String {
        if self.resource_location.is_empty() {
            format!("rtsp://{}:{}/{}", self.server_ip, self.server_port, resource_name)
        } else {
            format!(
                "rtsp://{}:{}/{}/{}",
                self.server_ip, self.server_port, self.resource_location, resource_name
            )
        }
    }
}

/// Thread-safe registry of sessions, shared between the application-facing
/// handle and the event-loop-owned core.
///
/// Modeled directly on the corpus's `SessionManager`: an
/// `Arc<RwLock<HashMap<_, _>>>` plus an atomic counter minting stable keys.
/// The key type is `usize`, not the corpus's session-ID `String`, because a
/// client-side session has no string identity at all until it is promoted
/// (§3: "dynamic name binding").
#[derive(Clone)]
pub struct SessionRegistry<T> {
    sessions: Arc<RwLock<HashMap<usize, Session<T>>>>,
    next_handle: Arc<AtomicUsize>,
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_handle: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Construct a detached session and register it. Safe to call from any
    /// thread (§4.1).
    pub fn create(
        &self,
        server_ip: impl Into<String>,
        server_port: u16,
        resource_location: impl Into<String>,
        application_object: T,
    ) -> SessionHandle {
        let server_ip = server_ip.into();
        let resource_location = resource_location.into();
        let handle = SessionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .write()
            .insert(handle.0, Session::new(handle, server_ip, server_port, resource_location, application_object));
        tracing::debug!(session = %handle, "session created");
        handle
    }

    /// Remove a session's bookkeeping. The caller must ensure it is no
    /// longer referenced by any connection (§4.1, §7 contract violation).
    pub fn destroy(&self, handle: SessionHandle) {
        if self.sessions.write().remove(&handle.0).is_some() {
            tracing::debug!(session = %handle, "session destroyed");
        } else {
            tracing::warn!(session = %handle, "destroy called on unknown session");
        }
    }

    pub fn contains(&self, handle: SessionHandle) -> bool {
        self.sessions.read().contains_key(&handle.0)
    }

    pub fn with<R>(&self, handle: SessionHandle, f: impl FnOnce(&Session<T>) -> R) -> Option<R> {
        self.sessions.read().get(&handle.0).map(f)
    }

    pub fn with_mut<R>(&self, handle: SessionHandle, f: impl FnOnce(&mut Session<T>) -> R) -> Option<R> {
        self.sessions.write().get_mut(&handle.0).map(f)
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_starts_detached() {
        let registry: SessionRegistry<()> = SessionRegistry::new();
        let handle = registry.create("10.0.0.1", 554, "media", ());
        let phase = registry.with(handle, |s| s.phase).unwrap();
        assert_eq!(phase, SessionPhase::Detached);
    }

    #[test]
    fn build_url_with_and_without_resource_location() {
        let registry: SessionRegistry<()> = SessionRegistry::new();
        let with_loc = registry.create("10.0.0.1", 554, "media", ());
        let without_loc = registry.create("10.0.0.1", 554, "", ());
        assert_eq!(
            registry.with(with_loc, |s| s.build_url("audio")).unwrap(),
            "rtsp://10.0.0.1:554/media/audio"
        );
        assert_eq!(
            registry.with(without_loc, |s| s.build_url("audio")).unwrap(),
            "rtsp://10.0.0.1:554/audio"
        );
    }

    #[test]
    fn destroy_then_contains_is_false() {
        let registry: SessionRegistry<()> = SessionRegistry::new();
        let handle = registry.create("10.0.0.1", 554, "media", ());
        registry.destroy(handle);
        assert!(!registry.contains(handle));
    }
}
