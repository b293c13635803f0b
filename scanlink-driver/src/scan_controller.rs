use crate::config::FramingConfig;
use crate::controller::{Controller, StreamController};
use crate::error::ScanlinkError;
use crate::record_log::SharedLog;
use crate::time::epoch_millis;
use crate::transport::{Connect, Transport};
use scanlink_data::ScanData;

/// Device specific part of a scanner: the scan request and the decoding of its response.
pub trait ScanDecoder {
    /// Command requesting one scan, without the request terminator.
    fn scan_command(&self) -> Result<String, ScanlinkError>;

    /// Decodes a scan response payload.
    /// A payload the device marked as failed gives an empty scan.
    fn parse_scan_data(&self, payload: &str) -> ScanData;
}

/// Controllers producing scans, live or replayed from their log.
pub trait ScanSource: Controller {
    /// Gets a scan from the device when `from_device` is true, from the attached log otherwise.
    ///
    /// Non-empty scans are numbered from zero. An empty scan means no usable data,
    /// including the end of the log.
    fn get_scan(&mut self, from_device: bool) -> Result<ScanData, ScanlinkError>;
}

/// A framing engine paired with a scan decoder.
pub struct ScanController<T: Transport, D: ScanDecoder> {
    stream: StreamController<T>,
    decoder: D,
    next_scan_id: usize,
}

impl<T: Transport, D: ScanDecoder> ScanController<T, D> {
    pub fn from_parts(decoder: D, framing: FramingConfig, transport: Option<T>) -> Self {
        let stream = match transport {
            Some(transport) => StreamController::with_transport(transport, framing),
            None => StreamController::new(framing),
        };
        ScanController {
            stream,
            decoder,
            next_scan_id: 0,
        }
    }

    pub fn stream(&self) -> &StreamController<T> {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut StreamController<T> {
        &mut self.stream
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn send_command(&mut self, command: &str) -> Result<String, ScanlinkError> {
        self.stream.send_command(command)
    }

    pub fn get_scan(&mut self, from_device: bool) -> Result<ScanData, ScanlinkError> {
        let command = self.decoder.scan_command()?;
        let mut scan = if from_device {
            let payload = self.stream.send_command(&command)?;
            let time = epoch_millis();
            let mut scan = self.decoder.parse_scan_data(&payload);
            scan.time = time;
            scan
        } else {
            let log = self.replay_log()?;
            match log.read_command(&command)? {
                Some(entry) => {
                    let mut scan = self.decoder.parse_scan_data(&entry.response);
                    if let Some(timed) = log.as_timed() {
                        scan.time = timed.last_command_time().as_millis() as i64;
                    }
                    scan
                }
                None => {
                    log::debug!("No \"{}\" left in the log", command);
                    ScanData::new()
                }
            }
        };

        if !scan.is_empty() {
            scan.scan_id = self.next_scan_id;
            self.next_scan_id += 1;
        }
        Ok(scan)
    }

    fn replay_log(&self) -> Result<SharedLog, ScanlinkError> {
        self.stream.log().ok_or(ScanlinkError::NoLog)
    }

    pub(crate) fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }
}

impl<T: Connect, D: ScanDecoder> Controller for ScanController<T, D> {
    fn connect(&mut self, endpoint: &str) -> Result<(), ScanlinkError> {
        self.stream.connect(endpoint)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    fn endpoint(&self) -> String {
        self.stream.endpoint()
    }

    fn log(&self) -> Option<SharedLog> {
        self.stream.log()
    }

    fn set_log(&mut self, log: Option<SharedLog>) {
        self.stream.set_log(log)
    }

    fn send_command(&mut self, command: &str) -> Result<String, ScanlinkError> {
        self.stream.send_command(command)
    }
}

impl<T: Connect, D: ScanDecoder> ScanSource for ScanController<T, D> {
    fn get_scan(&mut self, from_device: bool) -> Result<ScanData, ScanlinkError> {
        ScanController::get_scan(self, from_device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_log::Log;
    use crate::transport::MockTransport;
    use scanlink_data::ScanRecord;
    use std::io::Cursor;
    use std::sync::Arc;

    /// One record per comma separated distance, empty unless the payload starts with "ok".
    struct ListDecoder;

    impl ScanDecoder for ListDecoder {
        fn scan_command(&self) -> Result<String, ScanlinkError> {
            Ok("scan".to_string())
        }

        fn parse_scan_data(&self, payload: &str) -> ScanData {
            let mut scan = ScanData::new();
            if let Some(values) = payload.strip_prefix("ok ") {
                for (id, value) in values.split(',').enumerate() {
                    let distance = value.parse::<f64>().unwrap_or(-1.);
                    scan.push(ScanRecord::new(id as i32, 0., distance, -1, 0, false));
                }
            }
            scan
        }
    }

    fn scanner(handle: &MockTransport) -> ScanController<MockTransport, ListDecoder> {
        ScanController::from_parts(ListDecoder, FramingConfig::default(), Some(handle.clone()))
    }

    #[test]
    fn test_scan_ids_skip_empty_scans() {
        let handle = MockTransport::new();
        let mut controller = scanner(&handle);
        for response in ["ok 1,2", "failed", "ok 3", "ok 4,5,6"] {
            handle.queue_response(format!("scan\n{}\n", response).as_bytes());
        }

        let scan = controller.get_scan(true).unwrap();
        assert_eq!(scan.scan_id, 0);
        assert_eq!(scan.len(), 2);
        assert!(scan.time > 0);

        let scan = controller.get_scan(true).unwrap();
        assert!(scan.is_empty());

        assert_eq!(controller.get_scan(true).unwrap().scan_id, 1);
        let scan = controller.get_scan(true).unwrap();
        assert_eq!(scan.scan_id, 2);
        assert_eq!(scan.records[2].distance, 6.);
        assert_eq!(handle.written(), b"scan\nscan\nscan\nscan\n");
    }

    #[test]
    fn test_scan_from_log() {
        let text = "type log\nversion 2\n\n\
            c 5 scan\n\nr 6 ok 1,2\n\n\
            c 5 stop\n\nr 2 ok\n\n\
            c 5 scan\n\nr 4 ok 7\n\n";
        let mut controller = ScanController::<MockTransport, _>::from_parts(
            ListDecoder,
            FramingConfig::default(),
            None,
        );
        assert!(matches!(controller.get_scan(false), Err(ScanlinkError::NoLog)));

        let log = Log::from_reader(Cursor::new(text.as_bytes().to_vec()));
        controller.set_log(Some(Arc::new(log)));
        let scan = controller.get_scan(false).unwrap();
        assert_eq!(scan.scan_id, 0);
        assert_eq!(scan.len(), 2);
        assert_eq!(scan.time, 0);

        let scan = controller.get_scan(false).unwrap();
        assert_eq!(scan.scan_id, 1);
        assert_eq!(scan.records[0].distance, 7.);

        assert!(controller.get_scan(false).unwrap().is_empty());
    }

    #[test]
    fn test_scan_source_object() {
        let handle = MockTransport::new();
        let mut source: Box<dyn ScanSource> = Box::new(scanner(&handle));
        handle.queue_response(b"scan\nok 9\n");
        assert!(source.is_connected());
        assert_eq!(source.get_scan(true).unwrap().len(), 1);
    }
}
