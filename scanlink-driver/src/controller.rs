//! Request/response framing over a byte transport.

use crate::command::{create_formatted_command, join_command, CommandArg};
use crate::config::{FramingConfig, TransportSettings};
use crate::constants::READ_CHUNK_SIZE;
use crate::delimiter::{find_delimiter_end, get_line};
use crate::error::ScanlinkError;
use crate::numeric::to_string;
use crate::record_log::SharedLog;
use crate::transport::{Connect, Transport};
use std::fmt::Display;
use std::io;
use std::str::FromStr;

/// Operations every device controller offers.
pub trait Controller {
    /// Opens the transport to `endpoint`, `host:port` for sockets or a device path
    /// for serial ports. A previously open transport is closed first.
    fn connect(&mut self, endpoint: &str) -> Result<(), ScanlinkError>;

    fn is_connected(&self) -> bool;

    /// Address of the connected device, empty when not connected.
    fn endpoint(&self) -> String;

    fn log(&self) -> Option<SharedLog>;

    /// Attaches, replaces or (with `None`) detaches the log mirroring every exchange.
    /// A log opened for replay is never written to.
    fn set_log(&mut self, log: Option<SharedLog>);

    /// Sends `command` and returns the raw response payload.
    fn send_command(&mut self, command: &str) -> Result<String, ScanlinkError>;
}

/// Sends commands terminated by `request_end` and reads responses up to `response_end`.
pub struct StreamController<T: Transport> {
    transport: Option<T>,
    input: Vec<u8>,
    framing: FramingConfig,
    settings: TransportSettings,
    log: Option<SharedLog>,
}

impl<T: Transport> StreamController<T> {
    /// A controller that is not connected yet.
    pub fn new(framing: FramingConfig) -> StreamController<T> {
        StreamController {
            transport: None,
            input: Vec::new(),
            framing,
            settings: TransportSettings::default(),
            log: None,
        }
    }

    /// A controller running on an already open transport.
    pub fn with_transport(transport: T, framing: FramingConfig) -> StreamController<T> {
        let mut controller = StreamController::new(framing);
        controller.transport = Some(transport);
        controller
    }

    pub fn framing(&self) -> &FramingConfig {
        &self.framing
    }

    pub fn framing_mut(&mut self) -> &mut FramingConfig {
        &mut self.framing
    }

    pub fn transport_settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Settings applied by the next `connect`.
    pub fn set_transport_settings(&mut self, settings: TransportSettings) {
        self.settings = settings;
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    pub fn endpoint(&self) -> String {
        self.transport
            .as_ref()
            .map(|t| t.endpoint())
            .unwrap_or_default()
    }

    pub fn log(&self) -> Option<SharedLog> {
        self.log.clone()
    }

    pub fn set_log(&mut self, log: Option<SharedLog>) {
        self.log = log;
    }

    /// Closes the transport. Unread input is discarded.
    pub fn disconnect(&mut self) -> Result<(), ScanlinkError> {
        self.input.clear();
        match self.transport.take() {
            Some(mut transport) => {
                log::info!("Disconnecting from {}", transport.endpoint());
                transport.close()
            }
            None => Ok(()),
        }
    }

    pub fn send_command(&mut self, command: &str) -> Result<String, ScanlinkError> {
        let request = format!("{}{}", command, self.framing.request_end);
        let transport = match self.transport.as_mut() {
            Some(transport) if transport.is_open() => transport,
            _ => return Err(ScanlinkError::NotConnected),
        };

        log::debug!("Request \"{}\"", to_string(request.as_bytes()));
        transport.write_all(request.as_bytes())?;

        let payload = match self.framing.read_response {
            true => self.read_response()?,
            false => String::new(),
        };
        log::debug!("Response \"{}\"", to_string(payload.as_bytes()));

        if let Some(log) = self.log.as_ref().filter(|log| log.is_writable()) {
            log.write(&request, &payload)?;
        }
        Ok(payload)
    }

    /// Sends `command` and parses the trimmed payload as `V`.
    pub fn send_command_as<V: FromStr>(&mut self, command: &str) -> Result<V, ScanlinkError> {
        let payload = self.send_command(command)?;
        payload
            .trim()
            .parse::<V>()
            .map_err(|_| ScanlinkError::UnexpectedResponse(payload))
    }

    /// Sends `command` followed by its space separated `params`.
    pub fn send_command_with(
        &mut self,
        command: &str,
        params: &[&dyn Display],
    ) -> Result<String, ScanlinkError> {
        self.send_command(&join_command(command, params))
    }

    /// Renders `template` with `args` and sends the result.
    pub fn send_formatted_command(
        &mut self,
        template: &str,
        args: &[CommandArg],
    ) -> Result<String, ScanlinkError> {
        let command = create_formatted_command(template, args)?;
        self.send_command(&command)
    }

    fn read_response(&mut self) -> Result<String, ScanlinkError> {
        let transport = self.transport.as_mut().ok_or(ScanlinkError::NotConnected)?;
        if self.framing.read_echo {
            let request_end = self.framing.request_end.as_bytes();
            let end = fill_until(transport, &mut self.input, request_end)?;
            self.input.drain(..end);
        }

        let response_end = self.framing.response_end.as_bytes();
        let end = fill_until(transport, &mut self.input, response_end)?;
        let frame: Vec<u8> = self.input.drain(..end).collect();
        let payload = get_line(&mut &frame[..], response_end)?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }
}

/// Reads from `transport` into `input` until `delimiter` is buffered.
/// Returns the position just past the delimiter.
fn fill_until<T: Transport>(
    transport: &mut T,
    input: &mut Vec<u8>,
    delimiter: &[u8],
) -> Result<usize, ScanlinkError> {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        if let Some(end) = find_delimiter_end(input, delimiter) {
            return Ok(end);
        }
        let n_read = transport.read(&mut chunk)?;
        if n_read == 0 {
            return Err(ScanlinkError::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "the device closed the stream in the middle of a response",
            )));
        }
        input.extend_from_slice(&chunk[..n_read]);
    }
}

impl<T: Connect> Controller for StreamController<T> {
    fn connect(&mut self, endpoint: &str) -> Result<(), ScanlinkError> {
        self.disconnect()?;
        self.transport = Some(T::connect(endpoint, &self.settings)?);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        StreamController::is_connected(self)
    }

    fn endpoint(&self) -> String {
        StreamController::endpoint(self)
    }

    fn log(&self) -> Option<SharedLog> {
        StreamController::log(self)
    }

    fn set_log(&mut self, log: Option<SharedLog>) {
        StreamController::set_log(self, log)
    }

    fn send_command(&mut self, command: &str) -> Result<String, ScanlinkError> {
        StreamController::send_command(self, command)
    }
}

impl<T: Transport> Drop for StreamController<T> {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            log::warn!("Failed to close the transport: {}", e);
        }
    }
}
