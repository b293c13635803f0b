//! Neato XV robot vacuums and their laser distance sensor.

use crate::config::FramingConfig;
use crate::error::ScanlinkError;
use crate::numeric::degree_to_radian;
use crate::scan_controller::{ScanController, ScanDecoder};
use crate::transport::{SerialTransport, TcpTransport, Transport};
use scanlink_data::{ScanData, ScanRecord};

/// Decoder of `getldsscan` responses.
///
/// Also mirrors the modes last set through the controller, the robot does not report them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeatoDecoder {
    test_mode: bool,
    lds_rotation: bool,
}

impl NeatoDecoder {
    pub const ON: &'static str = "on";
    pub const OFF: &'static str = "off";
    pub const LDS_SCAN_HEADER: &'static str = "AngleInDegrees,DistInMM,Intensity,ErrorCodeHEX";
    pub const LDS_SCAN_FOOTER: &'static str = "ROTATION_SPEED,";

    pub const CMD_TEST_MODE: &'static str = "testmode %s";
    pub const CMD_SET_LDS_ROTATION: &'static str = "setldsrotation %s";
    pub const CMD_SET_MOTOR: &'static str = "setmotor %d %d %d";
    pub const CMD_GET_TIME: &'static str = "gettime";
    pub const CMD_GET_LDS_SCAN: &'static str = "getldsscan";

    /// Ctrl-Z ends every response.
    pub const RESPONSE_END: &'static str = "\u{1a}";

    pub fn framing() -> FramingConfig {
        FramingConfig::with_response_end(NeatoDecoder::RESPONSE_END)
    }

    fn switch(on: bool) -> &'static str {
        match on {
            true => NeatoDecoder::ON,
            false => NeatoDecoder::OFF,
        }
    }
}

/// `angle,distance,intensity,error` with a hexadecimal error code.
fn parse_record(id: i32, line: &str) -> Option<ScanRecord> {
    let mut fields = line.split(',').map(str::trim);
    let angle = fields.next()?.parse::<f64>().ok()?;
    let distance = fields.next()?.parse::<f64>().ok()?;
    let intensity = fields.next()?.parse::<i32>().ok()?;
    let error_code = i32::from_str_radix(fields.next()?, 16).ok()?;

    let error = error_code != 0;
    let distance = if error { -1. } else { distance };
    Some(ScanRecord::new(
        id,
        degree_to_radian(angle),
        distance,
        intensity,
        error_code,
        error,
    ))
}

impl ScanDecoder for NeatoDecoder {
    fn scan_command(&self) -> Result<String, ScanlinkError> {
        Ok(NeatoDecoder::CMD_GET_LDS_SCAN.to_string())
    }

    fn parse_scan_data(&self, payload: &str) -> ScanData {
        let mut scan = ScanData::new();
        let mut lines = payload.lines().map(str::trim);
        if lines.next() != Some(NeatoDecoder::LDS_SCAN_HEADER) {
            log::warn!("Scan response does not start with the LDS header");
            return scan;
        }

        for line in lines {
            if line.starts_with(NeatoDecoder::LDS_SCAN_FOOTER) {
                match line.split(',').nth(1).map(str::trim).map(str::parse::<f64>) {
                    Some(Ok(speed)) => scan.rotation_speed = speed,
                    _ => log::warn!("Invalid rotation speed in \"{}\"", line),
                }
                break;
            }
            if line.is_empty() {
                continue;
            }
            match parse_record(scan.len() as i32, line) {
                Some(record) => scan.push(record),
                None => log::warn!("Skipping malformed scan line \"{}\"", line),
            }
        }
        scan
    }
}

pub type NeatoController<T> = ScanController<T, NeatoDecoder>;
pub type NeatoSerialController = NeatoController<SerialTransport>;
pub type NeatoSocketController = NeatoController<TcpTransport>;

impl<T: Transport> ScanController<T, NeatoDecoder> {
    pub fn new() -> Self {
        ScanController::from_parts(NeatoDecoder::default(), NeatoDecoder::framing(), None)
    }

    pub fn with_transport(transport: T) -> Self {
        ScanController::from_parts(
            NeatoDecoder::default(),
            NeatoDecoder::framing(),
            Some(transport),
        )
    }

    pub fn test_mode(&self) -> bool {
        self.decoder().test_mode
    }

    pub fn set_test_mode(&mut self, test_mode: bool) -> Result<(), ScanlinkError> {
        self.stream_mut().send_formatted_command(
            NeatoDecoder::CMD_TEST_MODE,
            &[NeatoDecoder::switch(test_mode).into()],
        )?;
        self.decoder_mut().test_mode = test_mode;
        Ok(())
    }

    pub fn lds_rotation(&self) -> bool {
        self.decoder().lds_rotation
    }

    pub fn set_lds_rotation(&mut self, lds_rotation: bool) -> Result<(), ScanlinkError> {
        self.stream_mut().send_formatted_command(
            NeatoDecoder::CMD_SET_LDS_ROTATION,
            &[NeatoDecoder::switch(lds_rotation).into()],
        )?;
        self.decoder_mut().lds_rotation = lds_rotation;
        Ok(())
    }

    /// Drives the wheels by `left` and `right` millimeters at `speed` mm/s.
    pub fn set_motor(&mut self, left: i32, right: i32, speed: i32) -> Result<(), ScanlinkError> {
        self.stream_mut().send_formatted_command(
            NeatoDecoder::CMD_SET_MOTOR,
            &[left.into(), right.into(), speed.into()],
        )?;
        Ok(())
    }

    /// Robot clock as `DayOfWeek HH:MM:SS`.
    pub fn get_time(&mut self) -> Result<String, ScanlinkError> {
        let payload = self.send_command(NeatoDecoder::CMD_GET_TIME)?;
        Ok(payload.trim().to_string())
    }

    /// Enters test mode and spins up the laser distance sensor.
    pub fn start_scanner(&mut self) -> Result<(), ScanlinkError> {
        self.set_test_mode(true)?;
        self.set_lds_rotation(true)
    }

    pub fn stop_scanner(&mut self) -> Result<(), ScanlinkError> {
        self.set_lds_rotation(false)?;
        self.set_test_mode(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::record_log::Log;
    use crate::transport::MockTransport;
    use std::io::Cursor;
    use std::sync::Arc;

    const SCAN_RESPONSE: &str = "getldsscan\n\
        AngleInDegrees,DistInMM,Intensity,ErrorCodeHEX\r\n\
        0,221,1400,0\r\n\
        1,223,1396,0\r\n\
        2,0,0,8035\r\n\
        3,not a number,0,0\r\n\
        4,230,1010,0\r\n\
        ROTATION_SPEED,25.6\r\n\u{1a}";

    #[test]
    fn test_defaults() {
        let controller = NeatoController::<MockTransport>::new();
        assert_eq!(controller.stream().framing().response_end, "\u{1a}");
        assert!(!controller.test_mode());
        assert!(!controller.lds_rotation());
        assert_eq!(controller.decoder().scan_command().unwrap(), "getldsscan");
    }

    #[test]
    fn test_decode_scan() {
        let payload = &SCAN_RESPONSE["getldsscan\n".len()..SCAN_RESPONSE.len() - 1];
        let scan = NeatoDecoder::default().parse_scan_data(payload);
        assert_eq!(scan.rotation_speed, 25.6);
        assert_eq!(scan.len(), 4);

        let ids: Vec<i32> = scan.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let record = &scan.records[1];
        assert_eq!(record.distance, 223.);
        assert_eq!(record.intensity, 1396);
        assert!((record.angle - std::f64::consts::PI / 180.).abs() < 1e-12);
        assert!(!record.error);

        let record = &scan.records[2];
        assert!(record.error);
        assert_eq!(record.error_code, 0x8035);
        assert_eq!(record.distance, -1.);

        assert_eq!(scan.records[3].distance, 230.);
    }

    #[test]
    fn test_decode_without_header() {
        let decoder = NeatoDecoder::default();
        assert!(decoder.parse_scan_data("0,221,1400,0\r\nROTATION_SPEED,5.0\r\n").is_empty());
        assert!(decoder.parse_scan_data("").is_empty());

        let scan = decoder.parse_scan_data("AngleInDegrees,DistInMM,Intensity,ErrorCodeHEX\r\n");
        assert!(scan.is_empty());
        assert_eq!(scan.rotation_speed, -1.);
    }

    #[test]
    fn test_scanner_session() {
        let handle = MockTransport::new();
        let mut controller = NeatoController::with_transport(handle.clone());
        handle.queue_response(b"testmode on\n\x1a");
        handle.queue_response(b"setldsrotation on\n\x1a");
        handle.queue_response(SCAN_RESPONSE.as_bytes());
        handle.queue_response(b"setmotor 100 100 50\n\x1a");
        handle.queue_response(b"gettime\nSunday 13:57:09\r\n\x1a");
        handle.queue_response(b"setldsrotation off\n\x1a");
        handle.queue_response(b"testmode off\n\x1a");

        controller.start_scanner().unwrap();
        assert!(controller.test_mode());
        assert!(controller.lds_rotation());

        let scan = controller.get_scan(true).unwrap();
        assert_eq!(scan.scan_id, 0);
        assert_eq!(scan.len(), 4);
        assert_eq!(scan.rotation_speed, 25.6);

        controller.set_motor(100, 100, 50).unwrap();
        assert_eq!(controller.get_time().unwrap(), "Sunday 13:57:09");

        controller.stop_scanner().unwrap();
        assert!(!controller.test_mode());
        assert!(!controller.lds_rotation());

        assert_eq!(
            String::from_utf8(handle.written()).unwrap(),
            "testmode on\nsetldsrotation on\ngetldsscan\nsetmotor 100 100 50\ngettime\n\
             setldsrotation off\ntestmode off\n"
        );
    }

    #[test]
    fn test_failed_command_keeps_mode() {
        let handle = MockTransport::new();
        let mut controller = NeatoController::with_transport(handle.clone());
        // no response queued, the stream ends before the echo
        assert!(controller.set_test_mode(true).is_err());
        assert!(!controller.test_mode());
    }

    #[test]
    fn test_scan_from_log_without_header() {
        let mut controller = NeatoController::<MockTransport>::new();
        let text = "type log\nversion 2\n\nc 11 getldsscan\n\nr 13 AngleInDegre\n\n\n";
        let log = Log::from_reader(Cursor::new(text.as_bytes().to_vec()));
        controller.set_log(Some(Arc::new(log)));

        let scan = controller.get_scan(false).unwrap();
        assert!(scan.is_empty());
    }
}
