//! Message Codec Adapter — the boundary to the external RTSP wire grammar (§6).
//!
//! The core never parses or serializes RTSP itself beyond what this module's
//! [`MessageCodec`] trait exposes. [`TextCodec`] is the one concrete
//! implementation shipped here: RTSP/1.0 over a `\r\n`-delimited text
//! stream, the same grammar RFC 2326 §4 and §6-§7 describe.

use crate::error::{CoreError, ParseErrorKind, Result};
use crate::message::{Message, MessageKind, Method};

/// Default per-message buffer cap (§6, §9 note 4). Tunable via
/// [`crate::config::ClientConfig::max_message_size`].
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2048;

/// Encodes outbound messages and decodes inbound bytes.
///
/// `decode` parses at most one message per call and reports how many bytes
/// it consumed, so the caller can keep decoding a buffer that holds more
/// than one message back to back (§6: "remaining bytes beyond position
/// indicate more messages"). Returning `Ok(None)` means the buffer holds an
/// incomplete message and the caller should wait for more bytes.
pub trait MessageCodec: Send {
    fn encode(&self, message: &Message) -> Result<Vec<u8>>;
    fn decode(&self, buf: &[u8]) -> Result<Option<(Message, usize)>>;
}

/// RTSP/1.0 text codec.
pub struct TextCodec {
    max_message_size: usize,
}

impl TextCodec {
    pub fn new(max_message_size: usize) -> Self {
        TextCodec { max_message_size }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl MessageCodec for TextCodec {
    fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        let mut out = String::new();

        match &message.kind {
            MessageKind::Request {
                method, url, ..
            } => {
                out.push_str(&format!("{} {} RTSP/1.0\r\n", method.as_str(), url));
            }
            MessageKind::Response {
                status_code,
                status_text,
            } => {
                out.push_str(&format!("RTSP/1.0 {} {}\r\n", status_code, status_text));
            }
        }

        if let Some(cseq) = message.cseq {
            out.push_str(&format!("CSeq: {}\r\n", cseq));
        }
        if let Some(session_id) = &message.session_id {
            out.push_str(&format!("Session: {}\r\n", session_id));
        }
        for (name, value) in &message.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }

        if let Some(body) = &message.body {
            out.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
            out.push_str(body);
        } else {
            out.push_str("\r\n");
        }

        if out.len() > self.max_message_size {
            return Err(CoreError::MessageTooLarge {
                limit: self.max_message_size,
            });
        }
        Ok(out.into_bytes())
    }

    fn decode(&self, buf: &[u8]) -> Result<Option<(Message, usize)>> {
        if buf.len() > self.max_message_size {
            return Err(CoreError::MessageTooLarge {
                limit: self.max_message_size,
            });
        }

        let text = match std::str::from_utf8(buf) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };

        let header_end = match text.find("\r\n\r\n") {
            Some(pos) => pos + 4,
            None => return Ok(None),
        };

        let head = &text[..header_end];
        let mut lines = head.lines();

        let start_line = lines.next().ok_or(CoreError::Parse {
            kind: ParseErrorKind::EmptyMessage,
        })?;
        let parts: Vec<&str> = start_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(CoreError::Parse {
                kind: ParseErrorKind::InvalidStartLine,
            });
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let colon = line.find(':').ok_or(CoreError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            headers.push((line[..colon].trim().to_string(), line[colon + 1..].trim().to_string()));
        }

        let cseq = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("CSeq"))
            .and_then(|(_, v)| v.parse::<u32>().ok());
        let session_id = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Session"))
            .map(|(_, v)| v.split(';').next().unwrap_or(v).trim().to_string());
        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let total_len = header_end + content_length;
        if buf.len() < total_len {
            return Ok(None);
        }

        let body = if content_length > 0 {
            Some(text[header_end..total_len].to_string())
        } else {
            None
        };

        let kind = if parts[0].starts_with("RTSP/") {
            let status_code = parts[1].parse::<u16>().map_err(|_| CoreError::Parse {
                kind: ParseErrorKind::InvalidStartLine,
            })?;
            MessageKind::Response {
                status_code,
                status_text: parts[2..].join(" "),
            }
        } else {
            let method = Method::from(parts[0]);
            let resource_name = parts[1]
                .rsplit('/')
                .next()
                .unwrap_or(parts[1])
                .to_string();
            MessageKind::Request {
                method,
                resource_name,
                url: parts[1].to_string(),
            }
        };

        let message = Message {
            kind,
            cseq,
            session_id,
            headers,
            body,
        };
        Ok(Some((message, total_len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_setup_request() {
        let codec = TextCodec::default();
        let raw = b"SETUP rtsp://10.0.0.1:554/media/audio RTSP/1.0\r\nCSeq: 1\r\n\r\n";
        let (msg, consumed) = codec.decode(raw).unwrap().unwrap();
        assert_eq!(consumed, raw.len());
        assert_eq!(msg.method(), Some(&Method::Setup));
        assert_eq!(msg.cseq, Some(1));
    }

    #[test]
    fn decode_ok_response_with_session() {
        let codec = TextCodec::default();
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: ABC123\r\n\r\n";
        let (msg, consumed) = codec.decode(raw).unwrap().unwrap();
        assert_eq!(consumed, raw.len());
        assert!(msg.is_response());
        assert_eq!(msg.status_code(), Some(200));
        assert_eq!(msg.session_id.as_deref(), Some("ABC123"));
    }

    #[test]
    fn decode_incomplete_returns_none() {
        let codec = TextCodec::default();
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n";
        assert!(codec.decode(raw).unwrap().is_none());
    }

    #[test]
    fn decode_two_messages_back_to_back() {
        let codec = TextCodec::default();
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\nRTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n";
        let (first, consumed) = codec.decode(raw).unwrap().unwrap();
        assert_eq!(first.cseq, Some(1));
        let (second, consumed2) = codec.decode(&raw[consumed..]).unwrap().unwrap();
        assert_eq!(second.cseq, Some(2));
        assert_eq!(consumed + consumed2, raw.len());
    }

    #[test]
    fn encode_request_round_trips() {
        let codec = TextCodec::default();
        let mut msg = Message::request(Method::Setup, "audio").with_cseq(1);
        msg.set_url("rtsp://10.0.0.1:554/media/audio");
        let bytes = codec.encode(&msg).unwrap();
        let (decoded, _) = codec.decode(&bytes).unwrap().unwrap();
        assert_eq!(decoded.method(), Some(&Method::Setup));
        assert_eq!(decoded.cseq, Some(1));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let codec = TextCodec::new(16);
        let msg = Message::ok().with_cseq(1);
        assert!(matches!(
            codec.encode(&msg),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }
}
