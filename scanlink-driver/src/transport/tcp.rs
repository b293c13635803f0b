use super::{Connect, Transport};
use crate::config::TransportSettings;
use crate::error::ScanlinkError;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

/// Transport over a TCP socket. Endpoints have the form `host:port`.
pub struct TcpTransport {
    stream: TcpStream,
    open: bool,
}

impl TcpTransport {
    pub fn from_stream(stream: TcpStream) -> TcpTransport {
        TcpTransport { stream, open: true }
    }
}

fn resolve(endpoint: &str) -> Result<Vec<SocketAddr>, ScanlinkError> {
    if !endpoint.contains(':') {
        return Err(ScanlinkError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: "The endpoint must have the form host:port.".to_string(),
        });
    }
    endpoint
        .to_socket_addrs()
        .map(|addrs| addrs.collect())
        .map_err(|e| ScanlinkError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

impl Connect for TcpTransport {
    fn connect(endpoint: &str, settings: &TransportSettings) -> Result<Self, ScanlinkError> {
        let addrs = resolve(endpoint)?;
        let connected = match settings.connect_timeout {
            Some(timeout) => addrs
                .first()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "No address resolved."))
                .and_then(|addr| TcpStream::connect_timeout(addr, timeout)),
            None => TcpStream::connect(addrs.as_slice()),
        };
        let stream = connected.map_err(|e| ScanlinkError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        stream.set_read_timeout(settings.read_timeout)?;
        stream.set_nodelay(true)?;

        log::info!("Connected to {}", endpoint);
        Ok(TcpTransport::from_stream(stream))
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ScanlinkError> {
        match self.stream.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(ScanlinkError::Timeout)
            }
            Err(e) => Err(ScanlinkError::Connection(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ScanlinkError> {
        self.stream
            .write_all(data)
            .and_then(|_| self.stream.flush())
            .map_err(ScanlinkError::Connection)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn endpoint(&self) -> String {
        if !self.open {
            return String::new();
        }
        self.stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    }

    fn close(&mut self) -> Result<(), ScanlinkError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(ScanlinkError::Io(e)),
            _ => Ok(()),
        }
    }
}
