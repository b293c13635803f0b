use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_REQUEST_END, DEFAULT_RESPONSE_END};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How requests and responses are delimited on the wire.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FramingConfig {
    /// Appended to every command.
    pub request_end: String,
    /// Marks the end of a response.
    pub response_end: String,
    /// Wait for a response after a command is written.
    pub read_response: bool,
    /// The device repeats the command (terminated by `request_end`) before its response.
    pub read_echo: bool,
}

impl FramingConfig {
    pub fn with_response_end(response_end: &str) -> FramingConfig {
        FramingConfig {
            response_end: response_end.to_string(),
            ..FramingConfig::default()
        }
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        FramingConfig {
            request_end: DEFAULT_REQUEST_END.to_string(),
            response_end: DEFAULT_RESPONSE_END.to_string(),
            read_response: true,
            read_echo: true,
        }
    }
}

/// Settings used when a transport is opened.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransportSettings {
    /// Baud rate of serial ports. Ignored by sockets.
    pub baud_rate: u32,
    /// Upper bound for one blocking read. `None` blocks until data arrives.
    pub read_timeout: Option<Duration>,
    /// Upper bound for establishing a socket connection.
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: None,
            connect_timeout: None,
        }
    }
}
