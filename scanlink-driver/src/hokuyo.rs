//! Hokuyo URG scanners speaking SCIP 1.0.

use crate::command::create_formatted_command;
use crate::config::{FramingConfig, TransportSettings};
use crate::error::ScanlinkError;
use crate::numeric::decode_6bit_pair;
use crate::scan_controller::{ScanController, ScanDecoder};
use crate::transport::{SerialTransport, TcpTransport, Transport};
use scanlink_data::{ScanData, ScanRecord, VersionInfo};
use std::f64::consts::PI;

/// Decoder of `G` responses, holding the scanned step range.
#[derive(Clone, Debug, PartialEq)]
pub struct HokuyoDecoder {
    from_step: usize,
    to_step: usize,
    cluster_count: usize,
}

impl HokuyoDecoder {
    pub const CMD_GET_VERSION: &'static str = "V";
    pub const CMD_GET_SCAN: &'static str = "G%03d%03d%02d";
    pub const RESPONSE_END: &'static str = "\n\n";
    pub const BAUD_RATE: u32 = 115200;

    pub const MAX_STEP: usize = 768;
    pub const VALID_FROM_STEP: usize = 44;
    pub const VALID_TO_STEP: usize = 725;
    pub const MAX_CLUSTER_COUNT: usize = 99;
    /// Angle of step 0 in radians.
    pub const START_ANGLE: f64 = -135. * PI / 180.;
    /// Angle between two steps in radians.
    pub const STEP_RESOLUTION: f64 = PI / 512.;

    const STATUS_OK: &'static str = "0";
    // Values below are error codes, not distances
    const MIN_DISTANCE: i32 = 20;

    pub fn framing() -> FramingConfig {
        FramingConfig::with_response_end(HokuyoDecoder::RESPONSE_END)
    }

    pub fn scan_parameters(&self) -> (usize, usize, usize) {
        (self.from_step, self.to_step, self.cluster_count)
    }

    /// Validates and stores the range used by the next scan.
    pub fn set_scan_parameters(
        &mut self,
        from_step: usize,
        to_step: usize,
        cluster_count: usize,
    ) -> Result<(), ScanlinkError> {
        if from_step > HokuyoDecoder::MAX_STEP {
            return Err(ScanlinkError::InvalidArgument(format!(
                "from step {} is above {}",
                from_step,
                HokuyoDecoder::MAX_STEP
            )));
        }
        if to_step > HokuyoDecoder::MAX_STEP {
            return Err(ScanlinkError::InvalidArgument(format!(
                "to step {} is above {}",
                to_step,
                HokuyoDecoder::MAX_STEP
            )));
        }
        if cluster_count > HokuyoDecoder::MAX_CLUSTER_COUNT {
            return Err(ScanlinkError::InvalidArgument(format!(
                "cluster count {} is above {}",
                cluster_count,
                HokuyoDecoder::MAX_CLUSTER_COUNT
            )));
        }
        if from_step > to_step {
            return Err(ScanlinkError::InvalidArgument(format!(
                "from step {} is above to step {}",
                from_step, to_step
            )));
        }

        self.from_step = from_step;
        self.to_step = to_step;
        self.cluster_count = cluster_count;
        Ok(())
    }
}

impl Default for HokuyoDecoder {
    fn default() -> Self {
        HokuyoDecoder {
            from_step: 0,
            to_step: HokuyoDecoder::MAX_STEP,
            cluster_count: 1,
        }
    }
}

impl ScanDecoder for HokuyoDecoder {
    fn scan_command(&self) -> Result<String, ScanlinkError> {
        create_formatted_command(
            HokuyoDecoder::CMD_GET_SCAN,
            &[
                self.from_step.into(),
                self.to_step.into(),
                self.cluster_count.into(),
            ],
        )
    }

    fn parse_scan_data(&self, payload: &str) -> ScanData {
        let mut chars = payload.bytes().filter(|b| !b.is_ascii_whitespace());
        let status = chars.next();
        if status != Some(b'0') {
            log::warn!(
                "Scan rejected with status {:?}",
                status.map(char::from).unwrap_or(' ')
            );
            return ScanData::new();
        }

        let valid_steps = HokuyoDecoder::VALID_FROM_STEP..=HokuyoDecoder::VALID_TO_STEP;
        let mut scan = ScanData::new();
        let mut step = self.from_step;
        while let (Some(high), Some(low)) = (chars.next(), chars.next()) {
            let current = step;
            step += 1;
            if !valid_steps.contains(&current) {
                continue;
            }

            let value = decode_6bit_pair(high, low);
            let angle = current as f64 * HokuyoDecoder::STEP_RESOLUTION + HokuyoDecoder::START_ANGLE;
            let id = scan.len() as i32;
            let record = if value < HokuyoDecoder::MIN_DISTANCE {
                ScanRecord::new(id, angle, -1., -1, value, true)
            } else {
                ScanRecord::new(id, angle, value as f64, -1, 0, false)
            };
            scan.push(record);
        }
        scan
    }
}

/// Parses the `name:value` lines following the status line of a `V` response.
fn parse_version_info(payload: &str) -> VersionInfo {
    let mut info = VersionInfo::new();
    let mut lines = payload.lines();
    let status = lines.next().map(str::trim);
    if status != Some(HokuyoDecoder::STATUS_OK) {
        log::warn!("Version request rejected with status {:?}", status);
        return info;
    }

    for line in lines.filter(|line| !line.trim().is_empty()) {
        let (name, value) = line.split_once(':').unwrap_or((line, ""));
        info.insert(name.trim().to_string(), value.trim().to_string());
    }
    info
}

pub type HokuyoController<T> = ScanController<T, HokuyoDecoder>;
pub type HokuyoSerialController = HokuyoController<SerialTransport>;
pub type HokuyoSocketController = HokuyoController<TcpTransport>;

impl<T: Transport> ScanController<T, HokuyoDecoder> {
    pub fn new() -> Self {
        let mut controller = ScanController::from_parts(
            HokuyoDecoder::default(),
            HokuyoDecoder::framing(),
            None,
        );
        controller
            .stream_mut()
            .set_transport_settings(TransportSettings {
                baud_rate: HokuyoDecoder::BAUD_RATE,
                ..TransportSettings::default()
            });
        controller
    }

    pub fn with_transport(transport: T) -> Self {
        ScanController::from_parts(
            HokuyoDecoder::default(),
            HokuyoDecoder::framing(),
            Some(transport),
        )
    }

    /// Vendor, product, firmware, protocol, serial number and status of the device.
    /// Empty when the device rejects the request.
    pub fn get_version_info(&mut self) -> Result<VersionInfo, ScanlinkError> {
        let payload = self.send_command(HokuyoDecoder::CMD_GET_VERSION)?;
        Ok(parse_version_info(&payload))
    }

    /// Sets the steps `from_step..=to_step` scanned next, grouped by `cluster_count`.
    pub fn set_scan_parameters(
        &mut self,
        from_step: usize,
        to_step: usize,
        cluster_count: usize,
    ) -> Result<(), ScanlinkError> {
        self.decoder_mut()
            .set_scan_parameters(from_step, to_step, cluster_count)
    }
}
