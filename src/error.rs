//! Error types for the RTSP client signaling core.

use std::fmt;

use crate::connection::ConnectionHandle;

/// Errors that can occur while driving the client core.
///
/// Variants map to the failure modes the core is specified to surface:
///
/// - **Protocol**: [`Parse`](Self::Parse), [`MessageTooLarge`](Self::MessageTooLarge) — malformed
///   or oversized RTSP messages.
/// - **Transport**: [`Io`](Self::Io), [`ConnectFailed`](Self::ConnectFailed),
///   [`SendFailed`](Self::SendFailed) — net task failures.
/// - **Correlation**: [`UnknownSession`](Self::UnknownSession),
///   [`SpuriousResponse`](Self::SpuriousResponse).
/// - **Programmer error**: [`ContractViolation`](Self::ContractViolation).
/// - **Construction**: [`InvalidConfig`](Self::InvalidConfig), [`ChannelClosed`](Self::ChannelClosed).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Underlying I/O error surfaced by a net task implementation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `net_connect` returned none for the given server.
    #[error("failed to connect to {server_ip}:{server_port}")]
    ConnectFailed { server_ip: String, server_port: u16 },

    /// A socket write failed on an established connection.
    #[error("failed to send on connection {conn}")]
    SendFailed { conn: ConnectionHandle },

    /// Failed to parse an RTSP message (RFC 2326 §6).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A message exceeded the configured per-message buffer cap.
    #[error("message exceeds the {limit}-byte buffer cap")]
    MessageTooLarge { limit: usize },

    /// A response or server request referenced a session this core has no record of.
    #[error("no session found for the incoming message")]
    UnknownSession,

    /// A response arrived for a session with no outstanding request.
    #[error("spurious response with CSeq {cseq}, no matching active request")]
    SpuriousResponse { cseq: u32 },

    /// Caller violated a documented precondition (e.g. destroying a referenced session).
    #[error("contract violation: {detail}")]
    ContractViolation { detail: String },

    /// `ClientConfig::validate` rejected the supplied configuration.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    /// The control channel's receiving end has been dropped (event loop exited).
    #[error("control channel closed")]
    ChannelClosed,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no start line).
    EmptyMessage,
    /// The start line did not match either the request or response grammar.
    InvalidStartLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidStartLine => write!(f, "invalid start line"),
            Self::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

/// Convenience alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// §8 property 9: every variant's `Display` names the session/connection/
    /// CSeq it concerns, not just a generic message.
    #[test]
    fn display_names_the_offending_identifier() {
        let conn = ConnectionHandle::new(7);

        let connect_failed = CoreError::ConnectFailed {
            server_ip: "10.0.0.1".to_string(),
            server_port: 554,
        };
        assert!(connect_failed.to_string().contains("10.0.0.1:554"));

        let send_failed = CoreError::SendFailed { conn };
        assert!(send_failed.to_string().contains(&conn.to_string()));

        let spurious = CoreError::SpuriousResponse { cseq: 42 };
        assert!(spurious.to_string().contains("42"));

        let too_large = CoreError::MessageTooLarge { limit: 2048 };
        assert!(too_large.to_string().contains("2048"));

        let contract = CoreError::ContractViolation {
            detail: "destroyed a referenced session".to_string(),
        };
        assert!(contract.to_string().contains("destroyed a referenced session"));

        let invalid_config = CoreError::InvalidConfig {
            detail: "max_connections must be greater than zero".to_string(),
        };
        assert!(invalid_config.to_string().contains("max_connections"));

        assert_eq!(CoreError::UnknownSession.to_string(), "no session found for the incoming message");
        assert_eq!(CoreError::ChannelClosed.to_string(), "control channel closed");

        for kind in [
            ParseErrorKind::EmptyMessage,
            ParseErrorKind::InvalidStartLine,
            ParseErrorKind::InvalidHeader,
        ] {
            let err = CoreError::Parse { kind };
            assert!(err.to_string().starts_with("RTSP parse error: "));
        }
    }
}
