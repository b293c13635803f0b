//! Client library for laser rangefinders driven by text commands over a byte stream,
//! such as the Hokuyo URG scanners and the Neato XV laser distance sensor.
//!
//! Every exchange can be mirrored into a log, which can later stand in for the device.

mod command;
mod config;
mod constants;
mod controller;
mod delimiter;
mod error;
mod hokuyo;
mod neato;
mod numeric;
pub mod record_log;
mod scan_controller;
mod simulator;
mod time;
pub mod transport;

pub use crate::command::{create_formatted_command, join_command, CommandArg};
pub use crate::config::{FramingConfig, TransportSettings};
pub use crate::controller::{Controller, StreamController};
pub use crate::delimiter::get_line;
pub use crate::error::ScanlinkError;
pub use crate::hokuyo::{
    HokuyoController, HokuyoDecoder, HokuyoSerialController, HokuyoSocketController,
};
pub use crate::neato::{
    NeatoController, NeatoDecoder, NeatoSerialController, NeatoSocketController,
};
pub use crate::record_log::{
    ExchangeLog, Log, LogEntry, LogMetadata, SharedLog, TimeResolution, TimedLog, TimedReplay,
};
pub use crate::scan_controller::{ScanController, ScanDecoder, ScanSource};
pub use crate::simulator::DeviceSimulator;
pub use crate::transport::{Connect, Transport};
pub use scanlink_data::{ScanData, ScanRecord, VersionInfo};
