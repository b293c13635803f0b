use super::format::LogStream;
use super::{ExchangeLog, LogEntry, LogMetadata};
use crate::constants::LOG_TYPE;
use crate::error::ScanlinkError;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Log of exchanges without timing information.
pub struct Log {
    stream: Mutex<LogStream>,
}

impl Log {
    /// Opens an existing log file for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Log, ScanlinkError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("Replaying log {}", path.display());
        Ok(Log::from_stream(LogStream::reading(
            file,
            Some(path.to_path_buf()),
            LOG_TYPE,
            false,
        )))
    }

    /// Creates (or truncates) a log file for recording.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Log, ScanlinkError> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);
        log::debug!("Recording log {}", path.display());
        Ok(Log::from_stream(LogStream::writing(
            file,
            Some(path.to_path_buf()),
            LOG_TYPE,
            false,
        )))
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Log {
        Log::from_stream(LogStream::reading(reader, None, LOG_TYPE, false))
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Log {
        Log::from_stream(LogStream::writing(writer, None, LOG_TYPE, false))
    }

    /// Uses `log_type` instead of `log` as the type written to and expected in the header.
    pub fn with_log_type(self, log_type: &str) -> Log {
        self.stream.lock().set_log_type(log_type);
        self
    }

    fn from_stream(stream: LogStream) -> Log {
        Log {
            stream: Mutex::new(stream),
        }
    }
}

impl ExchangeLog for Log {
    fn file_path(&self) -> Option<PathBuf> {
        self.stream.lock().path()
    }

    fn metadata(&self) -> Result<LogMetadata, ScanlinkError> {
        self.stream.lock().metadata(None)
    }

    fn is_end(&self) -> bool {
        self.stream.lock().is_end()
    }

    fn read(&self) -> Result<Option<LogEntry>, ScanlinkError> {
        let record = self.stream.lock().read_record()?;
        Ok(record.map(|record| LogEntry {
            command: record.command,
            response: record.response,
        }))
    }

    fn is_writable(&self) -> bool {
        self.stream.lock().is_writable()
    }

    fn write(&self, command: &str, response: &str) -> Result<(), ScanlinkError> {
        self.stream
            .lock()
            .write_record(None, command, response, None)
    }

    fn close(&self) -> Result<(), ScanlinkError> {
        self.stream.lock().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_log::fixtures::REPLAY_LOG;
    use std::fs;
    use std::io::Cursor;

    fn replay() -> Log {
        Log::from_reader(Cursor::new(REPLAY_LOG.as_bytes().to_vec()))
    }

    #[test]
    fn test_read() {
        let log = replay();
        let metadata = log.metadata().unwrap();
        assert_eq!(metadata.log_type, "log");
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.time_resolution, None);

        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "G00076801\n");
        assert_eq!(entry.response, "0\n0C0C0C0C0C0C0C0C0C0C");
        for _ in 0..3 {
            assert!(!log.is_end());
            assert!(log.read().unwrap().is_some());
        }
        assert!(log.is_end());
        assert!(log.read().unwrap().is_none());
    }

    #[test]
    fn test_read_command() {
        let log = replay();
        let entry = log.read_command("V").unwrap().unwrap();
        assert_eq!(entry.response, "0\nVERSION1");
        let entry = log.read_command("V").unwrap().unwrap();
        assert_eq!(entry.response, "0\nVERSION2");
        assert!(log.read_command("V").unwrap().is_none());
    }

    #[test]
    fn test_comments() {
        let text = "# First line comment\ntype log\n# Comment in metadata\nversion 2\n\nc 2 V\n\nr 2 2\n\n\n";
        let log = Log::from_reader(Cursor::new(text.as_bytes().to_vec()));
        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "V\n");
        assert_eq!(entry.response, "2\n");
        assert!(log.is_end());
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchanges.log");
        let log = Log::create(&path).unwrap();
        assert_eq!(log.file_path(), Some(path.clone()));
        assert!(log.is_writable());
        log.write("cmd1", "response1").unwrap();
        log.write("cmd2", "response2").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "type log\nversion 2\n\nc 4 cmd1\nr 9 response1\n\nc 4 cmd2\nr 9 response2\n\n"
        );
        log.close().unwrap();
        log.close().unwrap();
        assert!(matches!(log.write("cmd3", "r"), Err(ScanlinkError::LogClosed)));

        let log = Log::open(&path).unwrap();
        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "cmd1");
        assert_eq!(entry.response, "response1");
        let entry = log.read().unwrap().unwrap();
        assert_eq!(entry.command, "cmd2");
        assert!(log.read().unwrap().is_none());
    }

    #[test]
    fn test_custom_log_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.log");
        let log = Log::create(&path).unwrap().with_log_type("custom");
        log.write("a", "b").unwrap();
        log.close().unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("type custom\n"));

        let log = Log::open(&path).unwrap();
        assert!(matches!(log.read(), Err(ScanlinkError::InvalidLog(_))));

        let log = Log::open(&path).unwrap().with_log_type("custom");
        assert_eq!(log.read().unwrap().unwrap().response, "b");
    }

    #[test]
    fn test_oversized_payload_length() {
        let text = "type log\nversion 2\n\nc 18446744073709551615 V\nr 1 0\n\n";
        let log = Log::from_reader(Cursor::new(text.as_bytes().to_vec()));
        assert!(matches!(log.read(), Err(ScanlinkError::InvalidLog(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Log::open(dir.path().join("missing.log")),
            Err(ScanlinkError::Io(_))
        ));
    }
}
