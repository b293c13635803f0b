use super::{Connect, Transport};
use crate::config::TransportSettings;
use crate::error::ScanlinkError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// In-memory transport for tests and offline use.
///
/// Clones share the same buffers, so a test can keep one handle while a
/// controller owns the other.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    // Released into `read_buffer` one per write
    responses: VecDeque<Vec<u8>>,
    endpoint: String,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    /// Makes `data` readable immediately.
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Makes `data` readable after the next write that has no response queued before it.
    pub fn queue_response(&self, data: &[u8]) {
        self.inner.lock().responses.push_back(data.to_vec());
    }

    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }
}

impl Connect for MockTransport {
    fn connect(endpoint: &str, _settings: &TransportSettings) -> Result<Self, ScanlinkError> {
        let transport = MockTransport::new();
        transport.inner.lock().endpoint = endpoint.to_string();
        Ok(transport)
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ScanlinkError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ScanlinkError::NotConnected);
        }
        let available = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }
        Ok(available)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ScanlinkError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ScanlinkError::NotConnected);
        }
        inner.write_buffer.extend_from_slice(data);
        if let Some(response) = inner.responses.pop_front() {
            inner.read_buffer.extend(response);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.inner.lock().closed
    }

    fn endpoint(&self) -> String {
        self.inner.lock().endpoint.clone()
    }

    fn close(&mut self) -> Result<(), ScanlinkError> {
        self.inner.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_response_follows_write() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        handle.queue_response(b"V\n0\n\n");

        let mut buffer = [0u8; 16];
        assert_eq!(transport.read(&mut buffer).unwrap(), 0);

        transport.write_all(b"V\n").unwrap();
        assert_eq!(handle.written(), b"V\n");

        let n = transport.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"V\n0\n\n");
    }

    #[test]
    fn test_injected_bytes_and_cleared_writes() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        handle.inject_read(b"0C0C");
        handle.queue_response(b"V\n");

        let mut buffer = [0u8; 2];
        assert_eq!(transport.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer, b"0C");

        transport.write_all(b"V\n").unwrap();
        handle.clear_written();
        assert!(handle.written().is_empty());
        transport.write_all(b"G\n").unwrap();
        assert_eq!(handle.written(), b"G\n");

        let mut buffer = [0u8; 8];
        let n = transport.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"0CV\n");
    }

    #[test]
    fn test_closed_transport() {
        let mut transport = MockTransport::connect("mock", &TransportSettings::default()).unwrap();
        assert_eq!(transport.endpoint(), "mock");
        transport.close().unwrap();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write_all(b"V\n"),
            Err(ScanlinkError::NotConnected)
        ));
    }
}
