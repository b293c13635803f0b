use super::{Connect, Transport};
use crate::config::TransportSettings;
use crate::error::ScanlinkError;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

// Port timeout used to poll when reads block without limit
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Transport over a serial port. Endpoints are device paths such as `/dev/ttyACM0`.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    read_timeout: Option<Duration>,
}

impl SerialTransport {
    pub fn from_port(
        port: Box<dyn SerialPort>,
        path: &str,
        read_timeout: Option<Duration>,
    ) -> SerialTransport {
        SerialTransport {
            port: Some(port),
            path: path.to_string(),
            read_timeout,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, ScanlinkError> {
        self.port.as_mut().ok_or(ScanlinkError::NotConnected)
    }
}

fn get_n_read(port: &mut Box<dyn SerialPort>) -> Result<usize, ScanlinkError> {
    let n_u32: u32 = port.bytes_to_read()?;
    Ok(n_u32.try_into().unwrap_or(0))
}

/// Discards bytes the device sent before the port was opened.
fn flush(port: &mut Box<dyn SerialPort>) -> Result<(), ScanlinkError> {
    let n_read: usize = get_n_read(port).unwrap_or(0);
    if n_read == 0 {
        return Ok(());
    }
    let mut stale: Vec<u8> = vec![0; n_read];
    port.read(stale.as_mut_slice())?;
    Ok(())
}

impl Connect for SerialTransport {
    fn connect(endpoint: &str, settings: &TransportSettings) -> Result<Self, ScanlinkError> {
        let mut port = serialport::new(endpoint, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .timeout(settings.read_timeout.unwrap_or(POLL_TIMEOUT))
            .open()
            .map_err(|e| ScanlinkError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        flush(&mut port)?;

        log::info!("Opened serial port {} at {} baud", endpoint, settings.baud_rate);
        Ok(SerialTransport::from_port(port, endpoint, settings.read_timeout))
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ScanlinkError> {
        let limited = self.read_timeout.is_some();
        let port = self.port()?;
        loop {
            match port.read(buffer) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    if limited {
                        return Err(ScanlinkError::Timeout);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ScanlinkError::Connection(e)),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ScanlinkError> {
        let port = self.port()?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(ScanlinkError::Connection)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn endpoint(&self) -> String {
        self.path.clone()
    }

    fn close(&mut self) -> Result<(), ScanlinkError> {
        if self.port.take().is_some() {
            log::info!("Closed serial port {}", self.path);
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::time::sleep_ms;
    use serialport::TTYPort;
    use std::io::{Read, Write};

    #[test]
    fn test_write_and_read() {
        let (mut master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let mut transport = SerialTransport::from_port(Box::new(slave), "pty", None);
        assert!(transport.is_open());
        assert_eq!(transport.endpoint(), "pty");

        transport.write_all(b"G0").unwrap();
        sleep_ms(10);
        let mut buf = [0u8; 2];
        master.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"G0");

        master.write_all(b"0C").unwrap();
        sleep_ms(10);
        let mut received = Vec::new();
        while received.len() < 2 {
            let n = transport.read(&mut buf).unwrap();
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"0C");
    }

    #[test]
    fn test_close() {
        let (_master, slave) = TTYPort::pair().expect("Unable to create ptty pair");
        let mut transport = SerialTransport::from_port(Box::new(slave), "pty", None);
        transport.close().unwrap();
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write_all(b"V"),
            Err(ScanlinkError::NotConnected)
        ));
        transport.close().unwrap();
    }
}
