//! Net Task contract (§6) — the external TCP I/O and event loop substrate.
//!
//! This crate never touches a socket directly. It depends on a `NetTask`
//! implementation for the synchronous half of the contract (`connect`,
//! `send`) and expects that implementation to publish connect/disconnect/
//! readable events back through the [`crate::control::NetEventSender`] it
//! was constructed with — the real substrate would be a non-blocking
//! reactor thread; tests substitute an in-memory stand-in (§12).

use crate::connection::ConnectionHandle;

/// Synchronous half of the net task boundary. `connect` and `send` are
/// best-effort: a `None`/`false` result is the only failure signal, folded
/// into [`crate::error::CoreError::ConnectFailed`] /
/// [`crate::error::CoreError::SendFailed`] by the caller.
pub trait NetTask: Send {
    /// Attempt to open a connection to `server_ip:server_port`. Returns the
    /// handle the net task will use to tag every future event for this
    /// connection, or `None` if the attempt failed synchronously.
    fn connect(&mut self, server_ip: &str, server_port: u16) -> Option<ConnectionHandle>;

    /// Write `bytes` to `conn`. Returns `false` on failure (§7: "send
    /// failure... does not retry at this layer").
    fn send(&mut self, conn: ConnectionHandle, bytes: &[u8]) -> bool;
}
