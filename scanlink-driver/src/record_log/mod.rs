//! Recording of command/response exchanges and their replay.
//!
//! A log is a line oriented text file:
//!
//! ```text
//! type timedlog
//! version 2
//! timeres 1 1000
//!
//! c 10 G00076801
//!
//! r 22 0
//! 0C0C0C0C0C0C0C0C0C0C
//! t 0
//!
//! ```
//!
//! Payloads are length prefixed, so they may contain any byte. Lines starting
//! with `#` before a metadata or record line are comments.

use crate::error::ScanlinkError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod format;
mod plain;
mod timed;

pub use plain::Log;
pub use timed::TimedLog;

/// Unit of the timestamps stored in a timed log, as a fraction of a second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeResolution {
    pub numerator: i64,
    pub denominator: i64,
}

const NANOS_PER_SECOND: i128 = 1_000_000_000;

impl TimeResolution {
    pub const NANOSECONDS: TimeResolution = TimeResolution::new(1, 1_000_000_000);
    pub const MICROSECONDS: TimeResolution = TimeResolution::new(1, 1_000_000);
    pub const MILLISECONDS: TimeResolution = TimeResolution::new(1, 1_000);
    pub const SECONDS: TimeResolution = TimeResolution::new(1, 1);

    pub const fn new(numerator: i64, denominator: i64) -> TimeResolution {
        TimeResolution {
            numerator,
            denominator,
        }
    }

    /// Whole ticks contained in `duration` (rounded down), saturating at `i64::MAX`.
    pub fn ticks_from_duration(&self, duration: Duration) -> i64 {
        let ticks = (duration.as_nanos() as i128)
            .checked_mul(self.denominator as i128)
            .and_then(|n| n.checked_div(self.numerator as i128 * NANOS_PER_SECOND))
            .unwrap_or(i128::MAX);
        ticks.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Duration of `ticks` ticks. Negative tick counts give a zero duration.
    pub fn duration_from_ticks(&self, ticks: i64) -> Duration {
        if ticks <= 0 {
            return Duration::ZERO;
        }
        let nanos = (ticks as i128)
            .checked_mul(self.numerator as i128)
            .and_then(|n| n.checked_mul(NANOS_PER_SECOND))
            .and_then(|n| n.checked_div(self.denominator as i128))
            .unwrap_or(i128::MAX);
        Duration::from_nanos(nanos.clamp(0, u64::MAX as i128) as u64)
    }

    /// Converts `ticks` of this resolution into ticks of `target`, rounded to the nearest tick.
    ///
    /// `None` when the result does not fit an `i64` or either resolution is degenerate.
    pub fn rescale(&self, ticks: i64, target: TimeResolution) -> Option<i64> {
        let n = (ticks as i128)
            .checked_mul(self.numerator as i128)?
            .checked_mul(target.denominator as i128)?;
        let d = (self.denominator as i128).checked_mul(target.numerator as i128)?;
        let rounded = n
            .checked_mul(2)?
            .checked_add(d)?
            .checked_div_euclid(d.checked_mul(2)?)?;
        i64::try_from(rounded).ok()
    }
}

impl Default for TimeResolution {
    fn default() -> Self {
        TimeResolution::MILLISECONDS
    }
}

/// Header of a log. Read once and cached, written before the first record.
#[derive(Clone, Debug, PartialEq)]
pub struct LogMetadata {
    pub log_type: String,
    pub version: u32,
    /// Present in timed logs only.
    pub time_resolution: Option<TimeResolution>,
}

impl LogMetadata {
    pub fn new(log_type: &str, version: u32, time_resolution: Option<TimeResolution>) -> LogMetadata {
        LogMetadata {
            log_type: log_type.to_string(),
            version,
            time_resolution,
        }
    }
}

/// One recorded exchange. The command includes its request terminator.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub command: String,
    pub response: String,
}

/// A log of exchanges that can be shared between controllers.
///
/// Every operation holds the log's internal lock for its whole duration.
pub trait ExchangeLog: Send + Sync {
    /// Path of the underlying file, if the log was opened from one.
    fn file_path(&self) -> Option<PathBuf>;

    /// The log header, read from the stream on first access.
    fn metadata(&self) -> Result<LogMetadata, ScanlinkError>;

    /// True when no further record can be read.
    fn is_end(&self) -> bool;

    /// Reads the next exchange, `None` at the end of the log.
    fn read(&self) -> Result<Option<LogEntry>, ScanlinkError>;

    /// Reads exchanges until one whose command starts with `command`.
    /// The skipped exchanges are discarded.
    fn read_command(&self, command: &str) -> Result<Option<LogEntry>, ScanlinkError> {
        while let Some(entry) = self.read()? {
            if entry.command.starts_with(command) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// False for logs opened for replay. Controllers only mirror exchanges into writable logs.
    fn is_writable(&self) -> bool;

    fn write(&self, command: &str, response: &str) -> Result<(), ScanlinkError>;

    /// Flushes and releases the stream. Closing twice is a no-op.
    fn close(&self) -> Result<(), ScanlinkError>;

    /// Timing controls, for logs that store timestamps.
    fn as_timed(&self) -> Option<&dyn TimedReplay> {
        None
    }
}

/// Timing controls of a log that stores a timestamp with every exchange.
pub trait TimedReplay {
    /// Paces reads to the recorded timing when `sync` is true,
    /// reads as fast as possible otherwise.
    fn sync_time(&self, sync: bool);

    /// Timestamp of the last read exchange in ticks of [`TimedReplay::resolution`].
    fn last_command_ticks(&self) -> i64;

    fn last_command_time(&self) -> Duration {
        self.resolution()
            .duration_from_ticks(self.last_command_ticks())
    }

    /// Unit the log works in.
    fn resolution(&self) -> TimeResolution;
}

pub type SharedLog = Arc<dyn ExchangeLog>;

#[cfg(test)]
pub(crate) mod fixtures {
    /// Two rounds of a Hokuyo scan followed by a version request.
    pub(crate) const REPLAY_LOG: &str = "type log\nversion 2\n\n\
        c 10 G00076801\n\nr 22 0\n0C0C0C0C0C0C0C0C0C0C\n\n\
        c 2 V\n\nr 10 0\nVERSION1\n\n\
        c 10 G00076801\n\nr 22 0\n0C0C0C0C0C0C0C0C0C0C\n\n\
        c 2 V\n\nr 10 0\nVERSION2\n\n";

    /// Same exchanges, one nanosecond apart.
    pub(crate) const TIMED_REPLAY_LOG: &str = "type timedlog\nversion 2\ntimeres 1 1000000000\n\n\
        c 10 G00076801\n\nr 22 0\n0C0C0C0C0C0C0C0C0C0C\nt 103203758\n\n\
        c 2 V\n\nr 10 0\nVERSION1\nt 103203759\n\n\
        c 10 G00076801\n\nr 22 0\n0C0C0C0C0C0C0C0C0C0C\nt 103203760\n\n\
        c 2 V\n\nr 10 0\nVERSION2\nt 103203761\n\n";
}
