//! Client Core (§4) — owns the connection pool, dispatches requests,
//! correlates responses, and drives the application callback vtable.
//!
//! [`ClientCore`] is the cheap-to-clone handle the application holds;
//! [`Worker`] is the event-loop-thread-only state it hands off to
//! `start()`. Splitting the two is the idiomatic-Rust reading of §9's
//! "single-threaded event loop" note: the handle is `Send + Clone` so every
//! caller thread gets its own, while the mutable Connection/Session
//! bookkeeping the spec restricts to "the event-loop thread" only ever
//! lives inside the `Worker` that thread owns.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::codec::{MessageCodec, TextCodec};
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionHandle};
use crate::control::{self, ControlChannel, CoreEvent, NetEventSender, TaskMsg};
use crate::error::{CoreError, Result};
use crate::message::{Message, Method};
use crate::net::NetTask;
use crate::session::{SessionHandle, SessionPhase, SessionRegistry};

/// Application callback vtable (§4.1).
///
/// `core` is handed back on every call so a handler can submit further
/// requests or terminate the session from inside a callback — safe because
/// those methods only enqueue onto the Control Channel (§5: "re-entrant
/// control submissions are legal because they are enqueued, not executed
/// inline").
pub trait ClientHandler<T>: Send {
    fn on_session_response(
        &mut self,
        core: &ClientCore<T>,
        session: SessionHandle,
        original_request: &Message,
        response: &Message,
    );

    fn on_session_event(&mut self, core: &ClientCore<T>, session: SessionHandle, server_request: &Message);

    fn on_session_terminate_response(&mut self, core: &ClientCore<T>, session: SessionHandle);
}

enum CoreRuntime {
    NotStarted(Box<dyn FnOnce() + Send>),
    Running(JoinHandle<()>),
    Terminated,
}

/// Application-facing front of the client core (§4.1).
///
/// Cloning is cheap: every clone shares the same session registry and
/// control channel. Construct with [`create`]; drive the event loop with
/// [`ClientCore::start`]; stop it with [`ClientCore::terminate`].
pub struct ClientCore<T> {
    sessions: SessionRegistry<T>,
    control: ControlChannel,
    max_connections: usize,
    runtime: Arc<Mutex<CoreRuntime>>,
}

impl<T> Clone for ClientCore<T> {
    fn clone(&self) -> Self {
        ClientCore {
            sessions: self.sessions.clone(),
            control: self.control.clone(),
            max_connections: self.max_connections,
            runtime: self.runtime.clone(),
        }
    }
}

/// Construct the core and its bound net task (§4.1 `create`).
///
/// `net_factory` receives the [`NetEventSender`] the net task implementation
/// should use to publish connect/disconnect/readable events — it cannot be
/// handed a `NetEventSender` before the control channel exists, hence the
/// factory indirection instead of a plain `Box<dyn NetTask>` argument.
pub fn create<T, H, F>(config: ClientConfig, handler: H, net_factory: F) -> Result<ClientCore<T>>
where
    T: Send + 'static,
    H: ClientHandler<T> + 'static,
    F: FnOnce(NetEventSender) -> Box<dyn NetTask>,
{
    config.validate()?;

    let sessions = SessionRegistry::new();
    let (control, rx) = control::channel(config.control_channel_capacity);
    let net = net_factory(control.net_sender());
    let codec: Box<dyn MessageCodec> = Box::new(TextCodec::new(config.max_message_size));

    let core = ClientCore {
        sessions: sessions.clone(),
        control,
        max_connections: config.max_connections,
        runtime: Arc::new(Mutex::new(CoreRuntime::Terminated)),
    };

    let worker = Worker {
        sessions,
        connections: HashMap::new(),
        net,
        codec,
        handler,
        rx,
        core: core.clone(),
        max_connections: config.max_connections,
    };

    let run: Box<dyn FnOnce() + Send> = Box::new(move || worker.run());
    *core.runtime.lock() = CoreRuntime::NotStarted(run);

    tracing::info!(max_connections = config.max_connections, "RTSP client core created");
    Ok(core)
}

impl<T> ClientCore<T> {
    /// Spawn the event-loop thread (§4.1 `start`).
    pub fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock();
        match std::mem::replace(&mut *runtime, CoreRuntime::Terminated) {
            CoreRuntime::NotStarted(run) => {
                let join = thread::Builder::new()
                    .name("rtsp-client-core".to_string())
                    .spawn(run)
                    .map_err(CoreError::Io)?;
                *runtime = CoreRuntime::Running(join);
                Ok(())
            }
            CoreRuntime::Running(join) => {
                *runtime = CoreRuntime::Running(join);
                Err(CoreError::ContractViolation {
                    detail: "start called on an already-running core".to_string(),
                })
            }
            CoreRuntime::Terminated => Err(CoreError::ContractViolation {
                detail: "start called after terminate".to_string(),
            }),
        }
    }

    /// Stop the event-loop thread and join it (§4.1 `terminate`).
    pub fn terminate(&self) -> Result<()> {
        self.control.shutdown();
        let mut runtime = self.runtime.lock();
        match std::mem::replace(&mut *runtime, CoreRuntime::Terminated) {
            CoreRuntime::Running(join) => {
                drop(runtime);
                let _ = join.join();
                Ok(())
            }
            CoreRuntime::NotStarted(_) | CoreRuntime::Terminated => Ok(()),
        }
    }

    /// Construct a detached session (§4.1 `session_create`). Thread-safe.
    pub fn session_create(
        &self,
        server_ip: impl Into<String>,
        server_port: u16,
        resource_location: impl Into<String>,
        application_object: T,
    ) -> SessionHandle {
        self.sessions
            .create(server_ip, server_port, resource_location, application_object)
    }

    /// Release a session's bookkeeping (§4.1 `session_destroy`, §7 contract).
    pub fn session_destroy(&self, session: SessionHandle) {
        self.sessions.destroy(session);
    }

    /// Enqueue `TaskMsg::SendMessage` (§4.1 `session_request`). Returns
    /// `true` on successful enqueue.
    pub fn session_request(&self, session: SessionHandle, message: Message) -> bool {
        self.control.send_message(session, message)
    }

    /// Enqueue `TaskMsg::TerminateSession` (§4.1 `session_terminate`).
    pub fn session_terminate(&self, session: SessionHandle) -> bool {
        self.control.terminate_session(session)
    }

    /// Run a closure against a session's current state, for diagnostics and
    /// tests. Returns `None` if the session is unknown.
    pub fn inspect_session<R>(&self, session: SessionHandle, f: impl FnOnce(&crate::session::Session<T>) -> R) -> Option<R> {
        self.sessions.with(session, f)
    }
}

/// Event-loop-thread-only state (§5). Never shared; moved wholesale into
/// the thread `start()` spawns.
struct Worker<T, H> {
    sessions: SessionRegistry<T>,
    connections: HashMap<ConnectionHandle, Connection>,
    net: Box<dyn NetTask>,
    codec: Box<dyn MessageCodec>,
    handler: H,
    rx: Receiver<CoreEvent>,
    core: ClientCore<T>,
    max_connections: usize,
}

impl<T, H: ClientHandler<T>> Worker<T, H> {
    fn run(mut self) {
        tracing::debug!("event loop started");
        while let Ok(event) = self.rx.recv() {
            match event {
                CoreEvent::Control(TaskMsg::Shutdown) => break,
                CoreEvent::Control(TaskMsg::SendMessage { session, message }) => {
                    self.process_send(session, message)
                }
                CoreEvent::Control(TaskMsg::TerminateSession { session }) => {
                    self.process_terminate(session)
                }
                CoreEvent::NetConnect { conn, status } => self.process_connect(conn, status),
                CoreEvent::NetDisconnect { conn, status } => self.process_disconnect(conn, status),
                CoreEvent::NetReadable { conn, data } => self.process_readable(conn, data),
            }
        }
        tracing::debug!("event loop exited");
    }

    /// §4.2 steps 1-2: queue discipline.
    fn process_send(&mut self, session: SessionHandle, message: Message) {
        let has_active = match self.sessions.with(session, |s| s.active_request.is_some()) {
            Some(v) => v,
            None => {
                tracing::warn!(%session, "session_request for unknown session");
                return;
            }
        };

        if has_active {
            self.sessions.with_mut(session, |s| s.request_queue.push_back(message));
            tracing::trace!(%session, "request queued behind an outstanding one");
            return;
        }

        self.sessions.with_mut(session, |s| s.active_request = Some(message));
        self.dispatch(session);
    }

    /// §4.2 steps 3-6, assuming `active_request` is already set to the
    /// message to send (by `process_send` or `advance_pipeline`).
    fn dispatch(&mut self, session: SessionHandle) {
        let conn = match self.ensure_connection(session) {
            Some(c) => c,
            None => return,
        };

        self.sessions.with_mut(session, |s| {
            let cseq = s.last_cseq + 1;
            s.last_cseq = cseq;

            let resource_name = s.active_request.as_ref().and_then(|m| match &m.kind {
                crate::message::MessageKind::Request { resource_name, .. } => Some(resource_name.clone()),
                crate::message::MessageKind::Response { .. } => None,
            });
            if let Some(resource_name) = resource_name {
                let url = s.build_url(&resource_name);
                if let Some(req) = s.active_request.as_mut() {
                    req.set_url(url);
                }
            }
            if let Some(req) = s.active_request.as_mut() {
                req.cseq = Some(cseq);
                if let Some(id) = &s.id {
                    req.session_id = Some(id.clone());
                }
            }
        });

        let message = match self.sessions.with(session, |s| s.active_request.clone()).flatten() {
            Some(m) => m,
            None => return,
        };

        let bytes = match self.codec.encode(&message) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(%session, error = %e, "failed to encode outbound message");
                return;
            }
        };

        if !self.net.send(conn, &bytes) {
            let error = CoreError::SendFailed { conn };
            tracing::warn!(%session, %conn, %error, "send failed; session stays active pending disconnect");
        }
    }

    /// §4.2 step 3: bind a detached session to a connection, creating one
    /// on demand.
    fn ensure_connection(&mut self, session: SessionHandle) -> Option<ConnectionHandle> {
        let existing = self.sessions.with(session, |s| s.connection)?;
        if let Some(conn) = existing {
            return Some(conn);
        }

        let (server_ip, server_port, is_setup) = self.sessions.with(session, |s| {
            let is_setup = matches!(s.active_request.as_ref().and_then(|m| m.method()), Some(Method::Setup));
            (s.server_ip.clone(), s.server_port, is_setup)
        })?;

        if !is_setup {
            tracing::warn!(
                %session,
                "non-SETUP request on a session without a server-assigned ID; expecting a 4xx"
            );
        }

        if self.connections.len() >= self.max_connections {
            tracing::error!(%session, max_connections = self.max_connections, "connection cap reached");
            self.fail_active_request(session, CoreError::ConnectFailed { server_ip, server_port });
            return None;
        }

        let conn = match self.net.connect(&server_ip, server_port) {
            Some(c) => c,
            None => {
                tracing::error!(%session, server_ip, server_port, "net_connect failed");
                self.fail_active_request(session, CoreError::ConnectFailed { server_ip, server_port });
                return None;
            }
        };

        self.connections.entry(conn).or_insert_with(|| Connection::new(conn));
        self.sessions.with_mut(session, |s| s.connection = Some(conn));

        if is_setup {
            if let Some(c) = self.connections.get_mut(&conn) {
                c.pending_session_queue.push_back(session);
            }
            self.sessions.with_mut(session, |s| s.phase = SessionPhase::Pending);
            tracing::info!(%session, %conn, "session added to pending queue");
        }

        Some(conn)
    }

    /// §7 connect failure: surface it as a synthetic response so the app
    /// learns about it through the same callback as any other correlation.
    fn fail_active_request(&mut self, session: SessionHandle, error: CoreError) {
        let original = self.sessions.with_mut(session, |s| s.active_request.take()).flatten();
        let Some(original) = original else {
            return;
        };
        let synthetic = Message::response(503, "Service Unavailable").with_header("X-Core-Error", error.to_string());
        self.handler.on_session_response(&self.core, session, &original, &synthetic);
        self.advance_pipeline(session);
    }

    /// §4.3 step 5: pop the next queued request, if any, and dispatch it.
    fn advance_pipeline(&mut self, session: SessionHandle) {
        let has_next = self
            .sessions
            .with_mut(session, |s| {
                s.active_request = s.request_queue.pop_front();
                s.active_request.is_some()
            })
            .unwrap_or(false);
        if has_next {
            self.dispatch(session);
        }
    }

    /// §4.4 `TaskMsg::TerminateSession`.
    fn process_terminate(&mut self, session: SessionHandle) {
        let state = self
            .sessions
            .with(session, |s| (s.terminating, s.id.clone(), s.connection));
        let Some((terminating, id, connection)) = state else {
            tracing::warn!(%session, "terminate for unknown session");
            return;
        };

        if terminating {
            return;
        }

        if id.is_some() {
            self.sessions.with_mut(session, |s| {
                s.terminating = true;
                s.phase = SessionPhase::Terminating;
            });
            let teardown = Message::request(Method::Teardown, String::new());
            self.process_send(session, teardown);
            return;
        }

        if let Some(conn) = connection {
            if let Some(c) = self.connections.get_mut(&conn) {
                c.pending_session_queue.retain(|s| *s != session);
            }
        }

        self.sessions.with_mut(session, |s| {
            s.terminating = true;
            s.phase = SessionPhase::Terminated;
        });
        self.handler.on_session_terminate_response(&self.core, session);
    }

    fn process_connect(&mut self, conn: ConnectionHandle, status: bool) {
        if status {
            tracing::debug!(%conn, "connection established");
        } else {
            tracing::warn!(%conn, "connect reported failure; tearing down as a disconnect");
            self.process_disconnect(conn, false);
        }
    }

    /// §4.4 `on_disconnect`. A Connection's resources are only meant to be
    /// released once every Session it held has been drained (§3 Connection
    /// lifecycle) — `connection.is_drained()` is the check that confirms
    /// this handler actually emptied both collections before letting the
    /// `Connection` value drop, rather than assuming it did.
    fn process_disconnect(&mut self, conn: ConnectionHandle, _status: bool) {
        let Some(mut connection) = self.connections.remove(&conn) else {
            tracing::warn!(%conn, "disconnect for unknown connection");
            return;
        };

        let orphaned: Vec<SessionHandle> = connection
            .session_table
            .values()
            .copied()
            .chain(connection.pending_session_queue.iter().copied())
            .collect();

        tracing::info!(%conn, orphaned = orphaned.len(), "connection disconnected");

        for session in orphaned {
            connection.session_table.retain(|_, s| *s != session);
            connection.pending_session_queue.retain(|s| *s != session);

            let already_terminating = self.sessions.with(session, |s| s.terminating).unwrap_or(true);
            if already_terminating {
                continue;
            }
            self.sessions.with_mut(session, |s| {
                s.terminating = true;
                s.phase = SessionPhase::Terminated;
                s.connection = None;
            });
            self.handler.on_session_terminate_response(&self.core, session);
        }

        if connection.is_drained() {
            tracing::debug!(%conn, "connection resources released");
        } else {
            tracing::error!(%conn, "connection released with sessions still attached");
        }
    }

    /// §4.3: decode zero or more messages out of newly-arrived bytes.
    fn process_readable(&mut self, conn: ConnectionHandle, data: Vec<u8>) {
        let Some(connection) = self.connections.get_mut(&conn) else {
            tracing::warn!(%conn, "readable event for unknown connection");
            return;
        };
        connection.read_buffer.extend_from_slice(&data);

        loop {
            let buffer = match self.connections.get(&conn) {
                Some(c) => c.read_buffer.clone(),
                None => return,
            };

            match self.codec.decode(&buffer) {
                Ok(Some((message, consumed))) => {
                    if let Some(c) = self.connections.get_mut(&conn) {
                        c.read_buffer.drain(..consumed);
                    }
                    self.handle_incoming(conn, message);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "parse failure; responding 400 Bad Request");
                    let response = Message::bad_request();
                    if let Ok(bytes) = self.codec.encode(&response) {
                        self.net.send(conn, &bytes);
                    }
                    if let Some(c) = self.connections.get_mut(&conn) {
                        c.read_buffer.clear();
                    }
                    break;
                }
            }
        }
    }

    fn handle_incoming(&mut self, conn: ConnectionHandle, message: Message) {
        if message.is_request() {
            self.handle_server_event(conn, message);
        } else {
            self.handle_server_response(conn, message);
        }
    }

    /// §4.3 "Server request (message.type == request)".
    fn handle_server_event(&mut self, conn: ConnectionHandle, message: Message) {
        let session = message
            .session_id
            .as_ref()
            .and_then(|id| self.connections.get(&conn).and_then(|c| c.session_table.get(id).copied()));

        let response = match session {
            Some(session) => {
                let mut resp = Message::ok();
                if let Some(id) = &message.session_id {
                    resp.session_id = Some(id.clone());
                }
                if let Some(cseq) = message.cseq {
                    resp.cseq = Some(cseq);
                }
                self.handler.on_session_event(&self.core, session, &message);
                resp
            }
            None => {
                let error = CoreError::UnknownSession;
                tracing::warn!(%conn, session_id = ?message.session_id, %error, "server event for unknown session");
                let mut resp = Message::not_found();
                if let Some(cseq) = message.cseq {
                    resp.cseq = Some(cseq);
                }
                resp
            }
        };

        match self.codec.encode(&response) {
            Ok(bytes) => {
                self.net.send(conn, &bytes);
            }
            Err(e) => tracing::error!(%conn, error = %e, "failed to encode server-event response"),
        }
    }

    /// §4.3 "Server response (message.type == response)".
    fn handle_server_response(&mut self, conn: ConnectionHandle, message: Message) {
        let Some(session_id) = message.session_id.clone() else {
            tracing::warn!(%conn, "response carries no Session-ID; dropping");
            return;
        };

        let mut target = self
            .connections
            .get(&conn)
            .and_then(|c| c.session_table.get(&session_id).copied());

        if target.is_none() {
            if let Some(cseq) = message.cseq {
                let pending: Vec<SessionHandle> = self
                    .connections
                    .get(&conn)
                    .map(|c| c.pending_session_queue.iter().copied().collect())
                    .unwrap_or_default();

                for candidate in pending {
                    let matches_cseq = self.sessions.with(candidate, |s| s.last_cseq == cseq).unwrap_or(false);
                    if !matches_cseq {
                        continue;
                    }
                    self.sessions.with_mut(candidate, |s| {
                        s.id = Some(session_id.clone());
                        s.phase = SessionPhase::Established;
                    });
                    if let Some(c) = self.connections.get_mut(&conn) {
                        c.promote(candidate, session_id.clone());
                    }
                    tracing::info!(session = %candidate, session_id, "session promoted from pending to established");
                    target = Some(candidate);
                    break;
                }
            }
        }

        let Some(session) = target else {
            let error = CoreError::UnknownSession;
            tracing::warn!(%conn, session_id, %error, "response for unknown session; dropping");
            return;
        };

        let original = self.sessions.with(session, |s| s.active_request.clone()).flatten();
        let Some(original) = original else {
            tracing::warn!(%session, cseq = ?message.cseq, "spurious response, no outstanding request");
            return;
        };

        self.handler.on_session_response(&self.core, session, &original, &message);

        let teardown_acked = matches!(original.method(), Some(Method::Teardown)) && message.is_success();
        if teardown_acked {
            if let Some(id) = self.sessions.with(session, |s| s.id.clone()).flatten() {
                if let Some(c) = self.connections.get_mut(&conn) {
                    c.session_table.remove(&id);
                }
            }
            self.sessions.with_mut(session, |s| s.phase = SessionPhase::Terminated);
            self.handler.on_session_terminate_response(&self.core, session);
        }

        self.advance_pipeline(session);
    }
}
