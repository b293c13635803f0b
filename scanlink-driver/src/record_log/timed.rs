use super::format::LogStream;
use super::{ExchangeLog, LogEntry, LogMetadata, TimeResolution, TimedReplay};
use crate::constants::TIMED_LOG_TYPE;
use crate::error::ScanlinkError;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Pacing {
    Disabled,
    /// The next read starts the replay clock.
    Armed,
    Running(Instant),
}

struct TimedState {
    stream: LogStream,
    resolution: TimeResolution,
    last_command_ticks: i64,
    pacing: Pacing,
    write_epoch: Option<Instant>,
}

/// Log storing, with every exchange, the time elapsed since the first recorded one.
///
/// Timestamps are read back in the resolution the log was constructed with,
/// whatever the resolution stored in the file.
pub struct TimedLog {
    state: Mutex<TimedState>,
}

impl TimedLog {
    pub fn open<P: AsRef<Path>>(
        path: P,
        resolution: TimeResolution,
    ) -> Result<TimedLog, ScanlinkError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("Replaying timed log {}", path.display());
        Ok(TimedLog::from_stream(
            LogStream::reading(file, Some(path.to_path_buf()), TIMED_LOG_TYPE, true),
            resolution,
        ))
    }

    pub fn create<P: AsRef<Path>>(
        path: P,
        resolution: TimeResolution,
    ) -> Result<TimedLog, ScanlinkError> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);
        log::debug!("Recording timed log {}", path.display());
        Ok(TimedLog::from_stream(
            LogStream::writing(file, Some(path.to_path_buf()), TIMED_LOG_TYPE, true),
            resolution,
        ))
    }

    pub fn from_reader<R: Read + Send + 'static>(
        reader: R,
        resolution: TimeResolution,
    ) -> TimedLog {
        TimedLog::from_stream(
            LogStream::reading(reader, None, TIMED_LOG_TYPE, true),
            resolution,
        )
    }

    pub fn from_writer<W: Write + Send + 'static>(
        writer: W,
        resolution: TimeResolution,
    ) -> TimedLog {
        TimedLog::from_stream(
            LogStream::writing(writer, None, TIMED_LOG_TYPE, true),
            resolution,
        )
    }

    fn from_stream(stream: LogStream, resolution: TimeResolution) -> TimedLog {
        TimedLog {
            state: Mutex::new(TimedState {
                stream,
                resolution,
                last_command_ticks: 0,
                pacing: Pacing::Disabled,
                write_epoch: None,
            }),
        }
    }

    /// Time left before an exchange stamped `ticks` is due, zero when not pacing.
    pub fn time_until_due(&self, ticks: i64) -> Duration {
        let state = self.state.lock();
        match state.pacing {
            Pacing::Running(epoch) => state
                .resolution
                .duration_from_ticks(ticks)
                .saturating_sub(epoch.elapsed()),
            Pacing::Disabled | Pacing::Armed => Duration::ZERO,
        }
    }
}

fn wait_until_due(epoch: Instant, ticks: i64, resolution: TimeResolution) {
    loop {
        let elapsed = resolution.ticks_from_duration(epoch.elapsed());
        if elapsed >= ticks {
            return;
        }
        std::thread::sleep(resolution.duration_from_ticks(ticks - elapsed));
    }
}

impl ExchangeLog for TimedLog {
    fn file_path(&self) -> Option<PathBuf> {
        self.state.lock().stream.path()
    }

    fn metadata(&self) -> Result<LogMetadata, ScanlinkError> {
        let mut state = self.state.lock();
        let resolution = state.resolution;
        state.stream.metadata(Some(resolution))
    }

    fn is_end(&self) -> bool {
        self.state.lock().stream.is_end()
    }

    fn read(&self) -> Result<Option<LogEntry>, ScanlinkError> {
        let mut state = self.state.lock();
        let resolution = state.resolution;
        let Some(record) = state.stream.read_record()? else {
            return Ok(None);
        };
        let stored = state
            .stream
            .metadata(Some(resolution))?
            .time_resolution
            .unwrap_or(resolution);
        let stored_ticks = record.ticks.unwrap_or(0);
        let ticks = stored.rescale(stored_ticks, resolution).ok_or_else(|| {
            ScanlinkError::InvalidLog(format!(
                "time stamp {} is out of range for the time resolution",
                stored_ticks
            ))
        })?;
        state.last_command_ticks = ticks;

        let pacing = state.pacing;
        match pacing {
            Pacing::Disabled => {}
            Pacing::Armed => state.pacing = Pacing::Running(Instant::now()),
            Pacing::Running(epoch) => wait_until_due(epoch, ticks, resolution),
        }

        Ok(Some(LogEntry {
            command: record.command,
            response: record.response,
        }))
    }

    fn is_writable(&self) -> bool {
        self.state.lock().stream.is_writable()
    }

    fn write(&self, command: &str, response: &str) -> Result<(), ScanlinkError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let epoch = *state.write_epoch.get_or_insert(now);
        let resolution = state.resolution;
        let ticks = resolution.ticks_from_duration(now.duration_since(epoch));
        state
            .stream
            .write_record(Some(resolution), command, response, Some(ticks))
    }

    fn close(&self) -> Result<(), ScanlinkError> {
        self.state.lock().stream.close()
    }

    fn as_timed(&self) -> Option<&dyn TimedReplay> {
        Some(self)
    }
}

impl TimedReplay for TimedLog {
    fn sync_time(&self, sync: bool) {
        self.state.lock().pacing = if sync { Pacing::Armed } else { Pacing::Disabled };
    }

    fn last_command_ticks(&self) -> i64 {
        self.state.lock().last_command_ticks
    }

    fn resolution(&self) -> TimeResolution {
        self.state.lock().resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_log::fixtures::TIMED_REPLAY_LOG;
    use std::fs;
    use std::io::Cursor;

    fn timed_log(text: &str, resolution: TimeResolution) -> TimedLog {
        TimedLog::from_reader(Cursor::new(text.as_bytes().to_vec()), resolution)
    }

    #[test]
    fn test_read_rescaled_ticks() {
        let log = timed_log(TIMED_REPLAY_LOG, TimeResolution::MILLISECONDS);
        let metadata = log.metadata().unwrap();
        assert_eq!(metadata.log_type, "timedlog");
        assert_eq!(metadata.time_resolution, Some(TimeResolution::NANOSECONDS));

        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "G00076801\n");
        assert_eq!(log.last_command_ticks(), 103);
        assert_eq!(log.last_command_time(), Duration::from_millis(103));

        let entry = log.read_command("V").unwrap().unwrap();
        assert_eq!(entry.response, "0\nVERSION1");
    }

    #[test]
    fn test_read_native_ticks() {
        let log = timed_log(TIMED_REPLAY_LOG, TimeResolution::NANOSECONDS);
        let mut ticks = Vec::new();
        while log.read().unwrap().is_some() {
            ticks.push(log.last_command_ticks());
        }
        assert_eq!(ticks, vec![103203758, 103203759, 103203760, 103203761]);
        assert!(log.is_end());
    }

    #[test]
    fn test_as_timed() {
        let log: Box<dyn ExchangeLog> =
            Box::new(timed_log(TIMED_REPLAY_LOG, TimeResolution::MILLISECONDS));
        let timed = log.as_timed().unwrap();
        assert_eq!(timed.resolution(), TimeResolution::MILLISECONDS);

        let plain: Box<dyn ExchangeLog> =
            Box::new(crate::record_log::Log::from_reader(Cursor::new(Vec::new())));
        assert!(plain.as_timed().is_none());
    }

    #[test]
    fn test_plain_log_is_rejected() {
        let log = timed_log(
            "type log\nversion 2\n\nc 1 V\nr 1 0\n\n",
            TimeResolution::MILLISECONDS,
        );
        assert!(matches!(log.read(), Err(ScanlinkError::InvalidLog(_))));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timed.log");
        let log = TimedLog::create(&path, TimeResolution::SECONDS).unwrap();
        log.write("cmd1", "response1").unwrap();
        log.write("cmd2", "response2").unwrap();
        log.close().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "type timedlog\nversion 2\ntimeres 1 1\n\nc 4 cmd1\nr 9 response1\nt 0\n\nc 4 cmd2\nr 9 response2\nt 0\n\n"
        );

        let log = TimedLog::open(&path, TimeResolution::MILLISECONDS).unwrap();
        assert_eq!(log.file_path(), Some(path));
        assert!(!log.is_writable());
        for (command, response) in [("cmd1", "response1"), ("cmd2", "response2")] {
            let entry = log.read().unwrap().unwrap();
            assert_eq!(entry.command, command);
            assert_eq!(entry.response, response);
            assert_eq!(log.last_command_ticks(), 0);
        }
        assert!(log.read().unwrap().is_none());
        assert!(log.is_end());
    }

    #[test]
    fn test_read_with_comments() {
        let text = "# recorded on the bench\ntype timedlog\nversion 2\n# nanoseconds\ntimeres 1 1000000000\n\n\
            # first exchange\nc 2 V\n\nr 10 0\nVERSION1\n# stamp follows\nt 1500000000\n\n\
            # second exchange\nc 10 G00076801\n# between command and response\nr 22 0\n0C0C0C0C0C0C0C0C0C0C\nt 2000000000\n\n\
            # trailing\n";
        let log = timed_log(text, TimeResolution::MILLISECONDS);
        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "V\n");
        assert_eq!(entry.response, "0\nVERSION1");
        assert_eq!(log.last_command_ticks(), 1500);

        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "G00076801\n");
        assert_eq!(entry.response, "0\n0C0C0C0C0C0C0C0C0C0C");
        assert_eq!(log.last_command_ticks(), 2000);

        assert!(log.is_end());
        assert!(log.read().unwrap().is_none());
    }

    #[test]
    fn test_time_stamp_out_of_range() {
        let text = "type timedlog\nversion 2\ntimeres 9223372036854775807 1\n\n\
            c 1 V\nr 1 0\nt 9223372036854775807\n\n";
        let log = timed_log(text, TimeResolution::NANOSECONDS);
        assert!(matches!(log.read(), Err(ScanlinkError::InvalidLog(_))));
    }

    #[test]
    fn test_write_ticks_increase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timed.log");
        let log = TimedLog::create(&path, TimeResolution::MILLISECONDS).unwrap();
        log.write("a", "1").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        log.write("b", "2").unwrap();
        log.close().unwrap();

        let log = TimedLog::open(&path, TimeResolution::MILLISECONDS).unwrap();
        log.read().unwrap();
        assert_eq!(log.last_command_ticks(), 0);
        log.read().unwrap();
        assert!(log.last_command_ticks() >= 30);
    }

    const PACED_LOG: &str = "type timedlog\nversion 2\ntimeres 1 1000\n\n\
        c 1 a\nr 1 1\nt 0\n\n\
        c 1 b\nr 1 2\nt 100\n\n\
        c 1 c\nr 1 3\nt 200\n\n";

    #[test]
    fn test_sync_time_paces_reads() {
        let log = timed_log(PACED_LOG, TimeResolution::MILLISECONDS);
        log.sync_time(true);
        let start = Instant::now();
        while log.read().unwrap().is_some() {}
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_reads_without_sync_do_not_wait() {
        let log = timed_log(PACED_LOG, TimeResolution::MILLISECONDS);
        let start = Instant::now();
        while log.read().unwrap().is_some() {}
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(log.last_command_ticks(), 200);

        let log = timed_log(PACED_LOG, TimeResolution::MILLISECONDS);
        log.sync_time(true);
        log.sync_time(false);
        let start = Instant::now();
        while log.read().unwrap().is_some() {}
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_time_until_due() {
        let log = timed_log(PACED_LOG, TimeResolution::MILLISECONDS);
        assert_eq!(log.time_until_due(100), Duration::ZERO);
        log.sync_time(true);
        assert_eq!(log.time_until_due(100), Duration::ZERO);
        log.read().unwrap();
        let remaining = log.time_until_due(100);
        assert!(remaining > Duration::ZERO && remaining <= Duration::from_millis(100));
        assert_eq!(log.time_until_due(0), Duration::ZERO);
    }
}
