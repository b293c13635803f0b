use super::{LogMetadata, TimeResolution};
use crate::constants::{
    COMMENT_MARK, LOG_VERSION, METADATA_TIME_RESOLUTION, METADATA_TYPE, METADATA_VERSION,
    RECORD_COMMAND, RECORD_RESPONSE, RECORD_TIME,
};
use crate::error::ScanlinkError;
use crate::numeric::to_string;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

/// A record as stored in the stream, before any time conversion.
#[derive(Debug, PartialEq)]
pub(crate) struct RawRecord {
    pub command: String,
    pub response: String,
    pub ticks: Option<i64>,
}

/// Reader/writer state shared by the plain and the timed log.
pub(crate) struct LogStream {
    path: Option<PathBuf>,
    log_type: String,
    timed: bool,
    reader: Option<Box<dyn BufRead + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    metadata: Option<LogMetadata>,
    metadata_written: bool,
    unusable: bool,
    closed: bool,
}

impl LogStream {
    pub fn reading<R: Read + Send + 'static>(
        reader: R,
        path: Option<PathBuf>,
        log_type: &str,
        timed: bool,
    ) -> LogStream {
        let mut stream = LogStream::empty(path, log_type, timed);
        stream.reader = Some(Box::new(BufReader::new(reader)));
        stream
    }

    pub fn writing<W: Write + Send + 'static>(
        writer: W,
        path: Option<PathBuf>,
        log_type: &str,
        timed: bool,
    ) -> LogStream {
        let mut stream = LogStream::empty(path, log_type, timed);
        stream.writer = Some(Box::new(writer));
        stream
    }

    fn empty(path: Option<PathBuf>, log_type: &str, timed: bool) -> LogStream {
        LogStream {
            path,
            log_type: log_type.to_string(),
            timed,
            reader: None,
            writer: None,
            metadata: None,
            metadata_written: false,
            unusable: false,
            closed: false,
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    pub fn set_log_type(&mut self, log_type: &str) {
        self.log_type = log_type.to_string();
    }

    fn check_usable(&self) -> Result<(), ScanlinkError> {
        if self.closed {
            return Err(ScanlinkError::LogClosed);
        }
        if self.unusable {
            return Err(ScanlinkError::InvalidLog(
                "the log is unusable after a previous format error".to_string(),
            ));
        }
        Ok(())
    }

    /// Marks the stream unusable when `result` is a failure.
    fn track<T>(&mut self, result: Result<T, ScanlinkError>) -> Result<T, ScanlinkError> {
        if result.is_err() {
            self.unusable = true;
        }
        result
    }

    /// Metadata of the stream, parsed on first call.
    /// A write-only stream reports the metadata it writes.
    pub fn metadata(
        &mut self,
        time_resolution: Option<TimeResolution>,
    ) -> Result<LogMetadata, ScanlinkError> {
        self.check_usable()?;
        if let Some(metadata) = &self.metadata {
            return Ok(metadata.clone());
        }
        if self.reader.is_none() {
            return Ok(LogMetadata::new(&self.log_type, LOG_VERSION, time_resolution));
        }
        let result = self.read_metadata();
        self.track(result)
    }

    fn read_metadata(&mut self) -> Result<LogMetadata, ScanlinkError> {
        let reader = self.reader.as_mut().ok_or(ScanlinkError::LogClosed)?;
        let mut fields = Vec::new();
        loop {
            skip_comments(reader)?;
            match read_line(reader)? {
                None if fields.is_empty() => {
                    return Err(ScanlinkError::invalid_log(METADATA_TYPE, "end of log"))
                }
                None => return Err(ScanlinkError::invalid_log("blank line", "end of log")),
                Some(line) if line.is_empty() => break,
                Some(line) => fields.push(line),
            }
        }

        let mut fields = fields.iter().map(|line| match line.split_once(' ') {
            Some((key, value)) => (key, value.trim()),
            None => (line.as_str(), ""),
        });

        let log_type = match fields.next() {
            Some((METADATA_TYPE, value)) => value.to_string(),
            Some((key, _)) => return Err(ScanlinkError::invalid_log(METADATA_TYPE, key)),
            None => return Err(ScanlinkError::invalid_log(METADATA_TYPE, "blank line")),
        };
        if log_type != self.log_type {
            return Err(ScanlinkError::invalid_log(
                &format!("log type \"{}\"", self.log_type),
                &format!("\"{}\"", log_type),
            ));
        }

        let version = match fields.next() {
            Some((METADATA_VERSION, value)) => value.parse::<u32>().map_err(|_| {
                ScanlinkError::invalid_log("version number", &format!("\"{}\"", value))
            })?,
            Some((key, _)) => return Err(ScanlinkError::invalid_log(METADATA_VERSION, key)),
            None => return Err(ScanlinkError::invalid_log(METADATA_VERSION, "blank line")),
        };
        if version != LOG_VERSION {
            return Err(ScanlinkError::invalid_log(
                &format!("version {}", LOG_VERSION),
                &format!("version {}", version),
            ));
        }

        let mut time_resolution = None;
        for (key, value) in fields {
            if self.timed && key == METADATA_TIME_RESOLUTION && time_resolution.is_none() {
                time_resolution = Some(parse_time_resolution(value)?);
            } else {
                return Err(ScanlinkError::InvalidLog(format!(
                    "unexpected metadata \"{}\"",
                    key
                )));
            }
        }
        if self.timed && time_resolution.is_none() {
            return Err(ScanlinkError::invalid_log(
                METADATA_TIME_RESOLUTION,
                "blank line",
            ));
        }

        let metadata = LogMetadata {
            log_type,
            version,
            time_resolution,
        };
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    /// True when no record is left to read. Comments are consumed on the way.
    pub fn is_end(&mut self) -> bool {
        if self.closed || self.unusable {
            return true;
        }
        match self.reader.as_mut() {
            Some(reader) => at_end(reader).unwrap_or(true),
            None => true,
        }
    }

    /// Reads the next record. The metadata is parsed first when needed.
    pub fn read_record(&mut self) -> Result<Option<RawRecord>, ScanlinkError> {
        self.check_usable()?;
        let result = self.read_record_inner();
        self.track(result)
    }

    fn read_record_inner(&mut self) -> Result<Option<RawRecord>, ScanlinkError> {
        if self.metadata.is_none() {
            if self.is_end() {
                return Ok(None);
            }
            self.read_metadata()?;
        }
        let timed = self.timed;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| ScanlinkError::InvalidLog("the log is write only".to_string()))?;
        if at_end(reader)? {
            return Ok(None);
        }

        let command = read_payload(reader, RECORD_COMMAND)?;
        let response = read_payload(reader, RECORD_RESPONSE)?;
        let ticks = if timed {
            let value = read_value(reader, RECORD_TIME)?;
            let ticks = value.parse::<i64>().map_err(|_| {
                ScanlinkError::invalid_log("time value", &format!("\"{}\"", value))
            })?;
            Some(ticks)
        } else {
            None
        };
        match read_line(reader)? {
            Some(line) if line.is_empty() => {}
            Some(line) => {
                return Err(ScanlinkError::invalid_log(
                    "blank line",
                    &format!("\"{}\"", line),
                ))
            }
            None => return Err(ScanlinkError::invalid_log("blank line", "end of log")),
        }

        Ok(Some(RawRecord {
            command,
            response,
            ticks,
        }))
    }

    /// Appends a record, preceded by the metadata on the first write, and flushes.
    pub fn write_record(
        &mut self,
        time_resolution: Option<TimeResolution>,
        command: &str,
        response: &str,
        ticks: Option<i64>,
    ) -> Result<(), ScanlinkError> {
        if self.closed {
            return Err(ScanlinkError::LogClosed);
        }
        let mut text = String::new();
        if !self.metadata_written {
            text.push_str(&format!("{} {}\n", METADATA_TYPE, self.log_type));
            text.push_str(&format!("{} {}\n", METADATA_VERSION, LOG_VERSION));
            if let Some(resolution) = time_resolution {
                text.push_str(&format!(
                    "{} {} {}\n",
                    METADATA_TIME_RESOLUTION, resolution.numerator, resolution.denominator
                ));
            }
            text.push('\n');
        }
        text.push_str(&format!("{} {} {}\n", RECORD_COMMAND, command.len(), command));
        text.push_str(&format!("{} {} {}\n", RECORD_RESPONSE, response.len(), response));
        if let Some(ticks) = ticks {
            text.push_str(&format!("{} {}\n", RECORD_TIME, ticks));
        }
        text.push('\n');

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ScanlinkError::InvalidLog("the log is read only".to_string()))?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        self.metadata_written = true;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), ScanlinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reader = None;
        match self.writer.take() {
            Some(mut writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}

fn parse_time_resolution(value: &str) -> Result<TimeResolution, ScanlinkError> {
    let invalid = || ScanlinkError::invalid_log("time resolution", &format!("\"{}\"", value));
    let mut parts = value.split_whitespace();
    let (Some(numerator), Some(denominator), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    let numerator = numerator.parse::<i64>().map_err(|_| invalid())?;
    let denominator = denominator.parse::<i64>().map_err(|_| invalid())?;
    if numerator <= 0 || denominator <= 0 {
        return Err(invalid());
    }
    Ok(TimeResolution::new(numerator, denominator))
}

fn skip_comments<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<()> {
    while reader.fill_buf()?.first() == Some(&COMMENT_MARK) {
        let mut comment = Vec::new();
        reader.read_until(b'\n', &mut comment)?;
    }
    Ok(())
}

fn at_end<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<bool> {
    skip_comments(reader)?;
    Ok(reader.fill_buf()?.is_empty())
}

/// A line without its `\n`, `None` at the end of the stream.
fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Reads `<key> <value>\n` and returns the value.
fn read_value<R: BufRead + ?Sized>(reader: &mut R, key: &str) -> Result<String, ScanlinkError> {
    skip_comments(reader)?;
    let line = read_line(reader)?
        .ok_or_else(|| ScanlinkError::invalid_log(key, "end of log"))?;
    match line.split_once(' ') {
        Some((found, value)) if found == key => Ok(value.trim().to_string()),
        Some((found, _)) => Err(ScanlinkError::invalid_log(key, &format!("\"{}\"", found))),
        None => Err(ScanlinkError::invalid_log(key, &format!("\"{}\"", line))),
    }
}

/// Reads `<key> <length> <bytes>\n` and returns the bytes.
fn read_payload<R: BufRead + ?Sized>(reader: &mut R, key: &str) -> Result<String, ScanlinkError> {
    skip_comments(reader)?;
    let found = read_token(reader)?;
    if found != key {
        return Err(ScanlinkError::invalid_log(key, &describe(&found)));
    }
    let length = read_token(reader)?;
    let length = length
        .parse::<usize>()
        .map_err(|_| ScanlinkError::invalid_log("payload length", &describe(&length)))?;

    // Untrusted length: grow with the bytes actually read.
    let mut payload = Vec::new();
    Read::take(&mut *reader, length as u64).read_to_end(&mut payload)?;
    if payload.len() != length {
        return Err(ScanlinkError::invalid_log(&format!("{} bytes", length), "end of log"));
    }

    let mut end = [0u8; 1];
    match reader.read(&mut end)? {
        0 => return Err(ScanlinkError::invalid_log("end of line", "end of log")),
        _ if end[0] != b'\n' => {
            return Err(ScanlinkError::invalid_log("end of line", &to_string(&end)))
        }
        _ => {}
    }
    String::from_utf8(payload)
        .map_err(|e| ScanlinkError::InvalidLog(format!("payload is not UTF-8: {}", e)))
}

/// Reads up to the next space. The space is consumed, not returned.
fn read_token<R: BufRead + ?Sized>(reader: &mut R) -> Result<String, ScanlinkError> {
    let mut token = Vec::new();
    reader.read_until(b' ', &mut token)?;
    if token.last() != Some(&b' ') {
        let found = if token.is_empty() {
            "end of log".to_string()
        } else {
            describe(&String::from_utf8_lossy(&token))
        };
        return Err(ScanlinkError::invalid_log("a space separated field", &found));
    }
    token.pop();
    Ok(String::from_utf8_lossy(&token).into_owned())
}

fn describe(token: &str) -> String {
    format!("\"{}\"", token.escape_debug())
}
