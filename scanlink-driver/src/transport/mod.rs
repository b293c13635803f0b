//! Byte stream transports the framing engine runs on.

use crate::config::TransportSettings;
use crate::error::ScanlinkError;

mod mock;
mod serial;
mod tcp;

pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

/// A duplex byte stream to a device.
pub trait Transport: Send {
    /// Reads at least one byte into `buffer`, blocking until data arrives.
    /// Returns 0 when the peer closed the stream.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ScanlinkError>;

    /// Writes the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> Result<(), ScanlinkError>;

    fn is_open(&self) -> bool;

    /// Address of the device, empty if not applicable.
    fn endpoint(&self) -> String;

    /// Closes the stream. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), ScanlinkError>;
}

/// Transports that can be opened from a textual endpoint.
pub trait Connect: Transport + Sized {
    fn connect(endpoint: &str, settings: &TransportSettings) -> Result<Self, ScanlinkError>;
}
