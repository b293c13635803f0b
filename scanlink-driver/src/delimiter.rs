//! Extraction of delimiter terminated lines from a byte stream.

use std::io::{self, BufRead};

/// Reads one line terminated by `delimiter` from `stream`.
///
/// The delimiter is consumed but not returned. An empty delimiter stands for `\n`.
/// If the stream ends before the delimiter is found, everything read so far is
/// returned. Bytes of a partially matched delimiter that turn out not to belong
/// to it are kept in the line.
pub fn get_line<R: BufRead + ?Sized>(stream: &mut R, delimiter: &[u8]) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    match delimiter.len() {
        0 => {
            stream.read_until(b'\n', &mut line)?;
            strip_suffix(&mut line, b"\n");
        }
        1 => {
            stream.read_until(delimiter[0], &mut line)?;
            strip_suffix(&mut line, delimiter);
        }
        _ => read_multi_byte(stream, delimiter, &mut line)?,
    }
    Ok(line)
}

fn strip_suffix(line: &mut Vec<u8>, suffix: &[u8]) {
    if line.ends_with(suffix) {
        line.truncate(line.len() - suffix.len());
    }
}

fn read_multi_byte<R: BufRead + ?Sized>(
    stream: &mut R,
    delimiter: &[u8],
    line: &mut Vec<u8>,
) -> io::Result<()> {
    // Bytes that may still turn out to be the beginning of the delimiter.
    let mut candidate: Vec<u8> = Vec::with_capacity(delimiter.len());
    loop {
        let byte = match next_byte(stream)? {
            Some(b) => b,
            None => {
                line.extend_from_slice(&candidate);
                return Ok(());
            }
        };

        candidate.push(byte);
        // Shift bytes out until the candidate is again a prefix of the delimiter.
        while !delimiter.starts_with(&candidate) {
            line.push(candidate.remove(0));
        }
        if candidate.len() == delimiter.len() {
            return Ok(());
        }
    }
}

fn next_byte<R: BufRead + ?Sized>(stream: &mut R) -> io::Result<Option<u8>> {
    let byte = match stream.fill_buf()?.first() {
        Some(b) => *b,
        None => return Ok(None),
    };
    stream.consume(1);
    Ok(Some(byte))
}

/// Position just past the first occurrence of `delimiter` in `data`.
pub(crate) fn find_delimiter_end(data: &[u8], delimiter: &[u8]) -> Option<usize> {
    let delimiter: &[u8] = if delimiter.is_empty() { b"\n" } else { delimiter };
    if data.len() < delimiter.len() {
        return None;
    }
    data.windows(delimiter.len())
        .position(|w| w == delimiter)
        .map(|i| i + delimiter.len())
}
