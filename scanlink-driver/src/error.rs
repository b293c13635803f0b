use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ScanlinkError {
    #[error("Not connected to a device.")]
    NotConnected,
    #[error("Failed to connect to \"{endpoint}\". {reason}")]
    ConnectionFailed { endpoint: String, reason: String },
    #[error("Connection error: {0}")]
    Connection(#[source] io::Error),
    #[error("Operation timed out")]
    Timeout,
    #[error("Invalid log: {0}")]
    InvalidLog(String),
    #[error("The log has been closed.")]
    LogClosed,
    #[error("No log is attached to the controller.")]
    NoLog,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid command template \"{template}\": {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("Unexpected response \"{0}\".")]
    UnexpectedResponse(String),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ScanlinkError {
    pub(crate) fn invalid_log(expected: &str, found: &str) -> ScanlinkError {
        ScanlinkError::InvalidLog(format!("expected {}, found {}", expected, found))
    }
}
