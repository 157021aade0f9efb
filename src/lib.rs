//! Connection-multiplexed RTSP client signaling core.
//!
//! This crate owns the client-side half of an RTSP session's lifecycle:
//! correlating CSeq-tagged requests with their responses, promoting a
//! session from "pending" to "established" the moment the server hands back
//! a Session-ID, and pipelining at most one outstanding request per session
//! while multiple sessions share a small pool of TCP connections. It does
//! not open sockets itself — see [`net::NetTask`] for the boundary real I/O
//! plugs into — and it does not speak SDP or SIP; [`sip::SipSessionAgent`]
//! is a documented extension point only.
//!
//! Construct a core with [`client::create`], drive it with
//! [`client::ClientCore::start`], and submit work through the
//! [`client::ClientCore`] handle from any thread.

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod control;
pub mod error;
pub mod message;
pub mod net;
pub mod session;
pub mod sip;

pub use client::{create, ClientCore, ClientHandler};
pub use config::ClientConfig;
pub use connection::ConnectionHandle;
pub use error::{CoreError, Result};
pub use message::{Message, MessageKind, Method};
pub use net::NetTask;
pub use session::{Session, SessionHandle, SessionPhase};
