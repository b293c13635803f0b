//! A fake device on localhost answering from a recorded log.

use crate::config::FramingConfig;
use crate::constants::{READ_CHUNK_SIZE, SIMULATOR_POLL_MS};
use crate::delimiter::find_delimiter_end;
use crate::error::ScanlinkError;
use crate::numeric::to_string;
use crate::record_log::SharedLog;
use crate::time::sleep_ms;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

/// Serves one TCP client on a background thread, replaying the exchanges of a log.
///
/// Each request must equal the next logged command. The simulator then writes the
/// echo (when `read_echo` is set), the logged response and `response_end`.
pub struct DeviceSimulator {
    endpoint: String,
    terminator_tx: Sender<bool>,
    thread: Option<JoinHandle<Result<bool, ScanlinkError>>>,
}

impl DeviceSimulator {
    /// Listens on an ephemeral localhost port and starts serving.
    pub fn serve(log: SharedLog, framing: FramingConfig) -> Result<DeviceSimulator, ScanlinkError> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let endpoint = listener.local_addr()?.to_string();
        log::info!("Simulating a device on {}", endpoint);

        let (terminator_tx, terminator_rx) = bounded(1);
        let thread = Some(std::thread::spawn(move || {
            serve_log(listener, log, framing, terminator_rx)
        }));

        Ok(DeviceSimulator {
            endpoint,
            terminator_tx,
            thread,
        })
    }

    /// `host:port` to connect to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Waits until the log is exhausted or the client leaves.
    /// Returns true when every request matched its logged command.
    pub fn join(mut self) -> Result<bool, ScanlinkError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| {
                ScanlinkError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "the simulator thread panicked",
                ))
            })?,
            None => Ok(false),
        }
    }
}

impl Drop for DeviceSimulator {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            // The thread may already be gone
            let _ = self.terminator_tx.send(true);
            match thread.join() {
                Ok(Err(e)) => log::warn!("Simulator on {} failed: {}", self.endpoint, e),
                Err(_) => log::warn!("Simulator thread on {} panicked", self.endpoint),
                Ok(Ok(_)) => {}
            }
        }
    }
}

fn do_terminate(terminator_rx: &Receiver<bool>) -> bool {
    terminator_rx.try_recv().unwrap_or(false)
}

fn serve_log(
    listener: TcpListener,
    log: SharedLog,
    framing: FramingConfig,
    terminator_rx: Receiver<bool>,
) -> Result<bool, ScanlinkError> {
    let mut stream = loop {
        if do_terminate(&terminator_rx) {
            return Ok(false);
        }
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => sleep_ms(SIMULATOR_POLL_MS),
            Err(e) => return Err(e.into()),
        }
    };
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_millis(SIMULATOR_POLL_MS)))?;

    let request_end = framing.request_end.as_bytes();
    let mut input = Vec::new();
    let mut served = false;
    while let Some(entry) = log.read()? {
        let request = match read_request(&mut stream, &mut input, request_end, &terminator_rx)? {
            Some(request) => request,
            None => return Ok(false),
        };
        if request != entry.command.as_bytes() {
            log::warn!(
                "Simulator expected \"{}\", received \"{}\"",
                to_string(entry.command.as_bytes()),
                to_string(&request)
            );
            return Ok(false);
        }

        let mut reply = Vec::new();
        if framing.read_echo {
            reply.extend_from_slice(&request);
        }
        reply.extend_from_slice(entry.response.as_bytes());
        reply.extend_from_slice(framing.response_end.as_bytes());
        stream.write_all(&reply)?;
        stream.flush()?;
        served = true;
    }
    Ok(served)
}

/// Reads the next request including its terminator.
/// `None` when the client left or the simulator is stopping.
fn read_request(
    stream: &mut TcpStream,
    input: &mut Vec<u8>,
    request_end: &[u8],
    terminator_rx: &Receiver<bool>,
) -> Result<Option<Vec<u8>>, ScanlinkError> {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        if let Some(end) = find_delimiter_end(input, request_end) {
            return Ok(Some(input.drain(..end).collect()));
        }
        if do_terminate(terminator_rx) {
            return Ok(None);
        }
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(None),
            Ok(n_read) => input.extend_from_slice(&chunk[..n_read]),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }
}
