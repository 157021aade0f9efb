//! Control Channel (§2, §5) — the only safe way for an application thread
//! to hand work to the event-loop thread.
//!
//! `CoreEvent` is the single queue the event loop actually blocks on. Both
//! application control submissions (`TaskMsg`, wrapped in
//! `CoreEvent::Control`) and the net task's connect/disconnect/readable
//! callbacks feed the same channel, so the loop has exactly one suspension
//! point (§5: "suspends at exactly one place").

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};

use crate::connection::ConnectionHandle;
use crate::error::CoreError;
use crate::message::Message;
use crate::session::SessionHandle;

/// Tagged control messages the application can enqueue (§9 REDESIGN FLAGS:
/// "Inline task-message dispatch").
#[derive(Debug)]
pub enum TaskMsg {
    SendMessage {
        session: SessionHandle,
        message: Message,
    },
    TerminateSession {
        session: SessionHandle,
    },
    Shutdown,
}

/// Everything that can wake the event loop: application control messages
/// and net task events, funneled into one channel.
#[derive(Debug)]
pub enum CoreEvent {
    Control(TaskMsg),
    NetConnect { conn: ConnectionHandle, status: bool },
    NetDisconnect { conn: ConnectionHandle, status: bool },
    NetReadable { conn: ConnectionHandle, data: Vec<u8> },
}

/// Either side of the bounded/unbounded choice in §10's
/// `control_channel_capacity`.
#[derive(Clone)]
enum EventSender {
    Unbounded(Sender<CoreEvent>),
    Bounded(SyncSender<CoreEvent>),
}

impl EventSender {
    fn send(&self, event: CoreEvent) -> bool {
        match self {
            EventSender::Unbounded(tx) => tx.send(event).is_ok(),
            EventSender::Bounded(tx) => tx.send(event).is_ok(),
        }
    }
}

/// Application-facing handle for submitting control messages. Cheap to
/// clone; every clone shares the same underlying channel.
#[derive(Clone)]
pub struct ControlChannel {
    tx: EventSender,
}

impl ControlChannel {
    /// Submit `TaskMsg::SendMessage`. Returns `true` on successful enqueue
    /// (§4.1: "Returns true on successful enqueue").
    pub fn send_message(&self, session: SessionHandle, message: Message) -> bool {
        let enqueued = self
            .tx
            .send(CoreEvent::Control(TaskMsg::SendMessage { session, message }));
        if !enqueued {
            let error = CoreError::ChannelClosed;
            tracing::warn!(%session, %error, "failed to enqueue send request; event loop has exited");
        }
        enqueued
    }

    pub fn terminate_session(&self, session: SessionHandle) -> bool {
        let enqueued = self
            .tx
            .send(CoreEvent::Control(TaskMsg::TerminateSession { session }));
        if !enqueued {
            let error = CoreError::ChannelClosed;
            tracing::warn!(%session, %error, "failed to enqueue terminate request; event loop has exited");
        }
        enqueued
    }

    pub(crate) fn shutdown(&self) -> bool {
        self.tx.send(CoreEvent::Control(TaskMsg::Shutdown))
    }

    pub(crate) fn net_sender(&self) -> NetEventSender {
        NetEventSender { tx: self.tx.clone() }
    }
}

/// Handed to net task implementations so they can publish connect,
/// disconnect, and readable events onto the same queue the control channel
/// feeds, without giving them access to control submission methods.
#[derive(Clone)]
pub struct NetEventSender {
    tx: EventSender,
}

impl NetEventSender {
    pub fn notify_connect(&self, conn: ConnectionHandle, status: bool) -> bool {
        self.tx.send(CoreEvent::NetConnect { conn, status })
    }

    pub fn notify_disconnect(&self, conn: ConnectionHandle, status: bool) -> bool {
        self.tx.send(CoreEvent::NetDisconnect { conn, status })
    }

    pub fn notify_readable(&self, conn: ConnectionHandle, data: Vec<u8>) -> bool {
        self.tx.send(CoreEvent::NetReadable { conn, data })
    }
}

/// Build a linked `(ControlChannel, Receiver<CoreEvent>)` pair, bounded or
/// unbounded per `capacity` (§10: `control_channel_capacity`).
pub fn channel(capacity: Option<usize>) -> (ControlChannel, Receiver<CoreEvent>) {
    match capacity {
        Some(n) => {
            let (tx, rx) = mpsc::sync_channel(n);
            (ControlChannel { tx: EventSender::Bounded(tx) }, rx)
        }
        None => {
            let (tx, rx) = mpsc::channel();
            (ControlChannel { tx: EventSender::Unbounded(tx) }, rx)
        }
    }
}
