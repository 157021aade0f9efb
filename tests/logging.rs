//! Exercises the structured-logging convention SPEC_FULL.md §11 prescribes:
//! state-changing log lines carry a `session` or `conn` field rather than an
//! interpolated message string, so log aggregation can key on identity.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rtsp_client_core::client::{self, ClientCore, ClientHandler};
use rtsp_client_core::config::ClientConfig;
use rtsp_client_core::connection::ConnectionHandle;
use rtsp_client_core::message::{Message, Method};
use rtsp_client_core::net::NetTask;
use rtsp_client_core::session::SessionHandle;

/// An `io::Write` sink backed by a shared buffer, handed to
/// `tracing_subscriber::fmt` as its writer so the test can inspect rendered
/// log lines instead of guessing at internal event structure.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn snapshot(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct NoopHandler;

impl ClientHandler<()> for NoopHandler {
    fn on_session_response(&mut self, _core: &ClientCore<()>, _session: SessionHandle, _original_request: &Message, _response: &Message) {}
    fn on_session_event(&mut self, _core: &ClientCore<()>, _session: SessionHandle, _server_request: &Message) {}
    fn on_session_terminate_response(&mut self, _core: &ClientCore<()>, _session: SessionHandle) {}
}

struct FakeNet {
    next_id: usize,
}

impl NetTask for FakeNet {
    fn connect(&mut self, _server_ip: &str, _server_port: u16) -> Option<ConnectionHandle> {
        let handle = ConnectionHandle::new(self.next_id);
        self.next_id += 1;
        Some(handle)
    }

    fn send(&mut self, _conn: ConnectionHandle, _bytes: &[u8]) -> bool {
        true
    }
}

fn wait_until(buf: &SharedBuf, needle: &str, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;
    loop {
        let text = buf.snapshot();
        if text.contains(needle) || Instant::now() >= deadline {
            return text;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// §8 property 8: session-create and connection-binding log lines carry
/// structured `session`/`conn` fields rather than burying identity in text.
#[test]
fn session_and_connection_events_log_structured_fields() {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    // This test binary's only test; a global default is the simplest way to
    // capture events from the core's own event-loop thread, which never
    // installs a thread-local override of its own.
    tracing::subscriber::set_global_default(subscriber).expect("install test subscriber");

    let core = client::create::<(), _, _>(ClientConfig::default(), NoopHandler, |_events| Box::new(FakeNet { next_id: 0 }))
        .expect("core construction");

    // session_create runs synchronously on this thread (§4.1: "Thread-safe"),
    // so its log line is already in the buffer with no event-loop round trip.
    let session = core.session_create("10.0.0.1", 554, "media", ());
    let after_create = buf.snapshot();
    assert!(after_create.contains("session created"), "missing session-create log line: {after_create}");
    assert!(after_create.contains("session="), "session-create log line missing a session field: {after_create}");
    assert!(after_create.contains(&format!("{session}")), "session-create log line missing this session's identity: {after_create}");

    core.start().expect("event loop start");
    assert!(core.session_request(session, Message::request(Method::Setup, "audio")));

    let after_dispatch = wait_until(&buf, "added to pending queue", Duration::from_secs(2));
    assert!(after_dispatch.contains("added to pending queue"), "missing pending-queue log line: {after_dispatch}");
    assert!(after_dispatch.contains("conn="), "pending-queue log line missing a conn field: {after_dispatch}");
    assert!(after_dispatch.contains("session="), "pending-queue log line missing a session field: {after_dispatch}");

    core.terminate().unwrap();
}
