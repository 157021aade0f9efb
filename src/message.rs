//! RTSP message model (RFC 2326 §4, §6, §7).
//!
//! A [`Message`] is deliberately opaque about wire format — encoding and
//! decoding are handled by the [`crate::codec`] boundary. This module only
//! models the fields the core's dispatch and correlation algorithms read or
//! write: method/status, CSeq, Session-ID, URL, and a header bag carried
//! through unmodified.

use std::fmt;

/// RTSP request method (RFC 2326 §10). `Other` preserves forward/vendor
/// methods without rejecting them outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
    Pause,
    Teardown,
    Announce,
    GetParameter,
    SetParameter,
    Record,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Options => "OPTIONS",
            Self::Describe => "DESCRIBE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
            Self::Announce => "ANNOUNCE",
            Self::GetParameter => "GET_PARAMETER",
            Self::SetParameter => "SET_PARAMETER",
            Self::Record => "RECORD",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "OPTIONS" => Self::Options,
            "DESCRIBE" => Self::Describe,
            "SETUP" => Self::Setup,
            "PLAY" => Self::Play,
            "PAUSE" => Self::Pause,
            "TEARDOWN" => Self::Teardown,
            "ANNOUNCE" => Self::Announce,
            "GET_PARAMETER" => Self::GetParameter,
            "SET_PARAMETER" => Self::SetParameter,
            "RECORD" => Self::Record,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request- or response-specific parts of a [`Message`].
#[derive(Debug, Clone)]
pub enum MessageKind {
    Request {
        method: Method,
        /// Relative resource path, e.g. `"audio"` in `SETUP .../media/audio`.
        resource_name: String,
        /// Absolute URL. Empty until the core's dispatch algorithm (§4.2
        /// step 4) fills it in for outbound requests; already populated for
        /// messages decoded off the wire.
        url: String,
    },
    Response {
        status_code: u16,
        status_text: String,
    },
}

/// A decoded (or about-to-be-encoded) RTSP message.
///
/// Headers beyond CSeq and Session-ID are preserved opaquely as ordered
/// `(name, value)` pairs; the core never interprets them.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    pub cseq: Option<u32>,
    pub session_id: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Message {
    /// Build a new outbound request. `url` starts empty; the dispatch
    /// algorithm fills it in before handing the message to the codec.
    pub fn request(method: Method, resource_name: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::Request {
                method,
                resource_name: resource_name.into(),
                url: String::new(),
            },
            cseq: None,
            session_id: None,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a response with the given status line.
    pub fn response(status_code: u16, status_text: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::Response {
                status_code,
                status_text: status_text.into(),
            },
            cseq: None,
            session_id: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::response(200, "OK")
    }

    pub fn not_found() -> Self {
        Self::response(404, "Not Found")
    }

    pub fn bad_request() -> Self {
        Self::response(400, "Bad Request")
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind, MessageKind::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.kind, MessageKind::Response { .. })
    }

    pub fn method(&self) -> Option<&Method> {
        match &self.kind {
            MessageKind::Request { method, .. } => Some(method),
            MessageKind::Response { .. } => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.kind {
            MessageKind::Response { status_code, .. } => Some(*status_code),
            MessageKind::Request { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status_code(), Some(code) if (200..300).contains(&code))
    }

    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Request { url, .. } => Some(url.as_str()),
            MessageKind::Response { .. } => None,
        }
    }

    /// Overwrite the request URL. No-op on a response.
    pub fn set_url(&mut self, url: impl Into<String>) {
        if let MessageKind::Request { url: slot, .. } = &mut self.kind {
            *slot = url.into();
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cseq(mut self, cseq: u32) -> Self {
        self.cseq = Some(cseq);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
