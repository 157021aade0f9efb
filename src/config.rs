//! Typed construction-time configuration (§10).
//!
//! The core does not parse environment variables or config files itself —
//! that stays the embedding application's job, per the original Non-goal on
//! "configuration parsing." What lives here is the typed struct `create`
//! validates before it spawns anything.

use crate::codec::DEFAULT_MAX_MESSAGE_SIZE;
use crate::error::{CoreError, Result};

/// A minimal legal RTSP message: an empty request line plus the blank line
/// terminator. Anything smaller than this can never decode to a complete
/// message, so it is not a useful `max_message_size`.
const MIN_MESSAGE_SIZE: usize = "X RTSP/1.0\r\n\r\n".len();

/// Construction-time tuning for [`crate::client::ClientCore`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on concurrently open connections (§3, §4.5 S6).
    pub max_connections: usize,
    /// Per-message codec buffer cap (§6, §9 note 4).
    pub max_message_size: usize,
    /// `None` = unbounded control channel; `Some(n)` = bounded to `n` (§10).
    pub control_channel_capacity: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_connections: 8,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            control_channel_capacity: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(CoreError::InvalidConfig {
                detail: "max_connections must be greater than zero".to_string(),
            });
        }
        if self.max_message_size < MIN_MESSAGE_SIZE {
            return Err(CoreError::InvalidConfig {
                detail: format!(
                    "max_message_size must be at least {MIN_MESSAGE_SIZE} bytes"
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_connections_rejected() {
        let config = ClientConfig {
            max_connections: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn undersized_message_cap_rejected() {
        let config = ClientConfig {
            max_message_size: 4,
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
