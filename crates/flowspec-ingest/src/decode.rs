// SPDX-License-Identifier: MIT OR Apache-2.0
//! Extension-based decoding and the bounded line scanner.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Bound on a single scanned line. Longer lines are a terminal error.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Open `path` for line-oriented reading, decompressing by extension:
/// `.gz` via gzip, `.zst` via zstandard, anything else as raw bytes.
pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    Ok(match ext.as_str() {
        "gz" => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        "zst" => Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)),
        _ => Box::new(BufReader::new(file)),
    })
}

/// Outcome of one bounded line read.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, newline and trailing `\r` stripped.
    Line(String),
    /// Clean end of input.
    Eof,
    /// The line exceeded the byte bound before a newline appeared.
    TooLong,
}

/// Read one newline-terminated line, refusing to buffer more than `max`
/// bytes.
pub fn read_line_capped(reader: &mut dyn BufRead, max: usize) -> io::Result<LineRead> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            if buf.is_empty() {
                return Ok(LineRead::Eof);
            }
            break;
        }
        if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&chunk[..pos]);
            reader.consume(pos + 1);
            break;
        }
        buf.extend_from_slice(chunk);
        let consumed = chunk.len();
        reader.consume(consumed);
        if buf.len() > max {
            return Ok(LineRead::TooLong);
        }
    }
    if buf.len() > max {
        return Ok(LineRead::TooLong);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
}
