//! Chunk metadata and its object-name codec
//!
//! Progress of an export run is never stored anywhere else: every uploaded
//! chunk is named after the rows it holds, and the name decodes back into the
//! exact same [`ChunkMetadata`]. Object names look like:
//!
//! ```text
//! <table>/<run_timestamp>__<zero-padded start>_<zero-padded end>.csv
//! users/20240301T101500__01_10.csv
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NameError;

/// Textual layout of a run timestamp (UTC, second resolution).
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Suffix of every chunk object.
pub const CHUNK_SUFFIX: &str = ".csv";

const RUN_SEPARATOR: &str = "__";
const SPAN_SEPARATOR: char = '_';

/// Identity of one export run, shared by all of its attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunTimestamp(NaiveDateTime);

impl RunTimestamp {
    /// Mint a run timestamp from a point in time, truncated to whole seconds
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let naive = at.naive_utc();
        Self(naive.with_nanosecond(0).unwrap_or(naive))
    }

    /// The timestamp as a UTC datetime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0.and_utc()
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(RUN_TIMESTAMP_FORMAT))
    }
}

impl FromStr for RunTimestamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = NaiveDateTime::parse_from_str(s, RUN_TIMESTAMP_FORMAT)
            .map_err(|e| format!("invalid run timestamp '{s}': {e}"))?;
        let ts = Self(parsed);
        // Reject spellings chrono tolerates but encode would never produce.
        if ts.to_string() != s {
            return Err(format!("non-canonical run timestamp '{s}'"));
        }
        Ok(ts)
    }
}

impl TryFrom<String> for RunTimestamp {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RunTimestamp> for String {
    fn from(ts: RunTimestamp) -> Self {
        ts.to_string()
    }
}

/// Number of decimal digits needed to print `count`.
pub fn digit_width(count: u64) -> usize {
    count.to_string().len()
}

/// Prefix shared by every chunk object of a table.
pub fn table_prefix(table: &str) -> String {
    format!("{table}/")
}

/// Prefix shared by every chunk object of one run of a table.
pub fn run_prefix(table: &str, run: &RunTimestamp) -> String {
    format!("{table}/{run}{RUN_SEPARATOR}")
}

/// Logical description of one uploaded chunk
///
/// Holds the 1-based inclusive row span `[start, end]` and the zero-padding
/// width used for both indices. The width is always wide enough for `end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkMetadata {
    table: String,
    run: RunTimestamp,
    start: u64,
    end: u64,
    digit_width: usize,
}

impl ChunkMetadata {
    /// Create validated chunk metadata
    ///
    /// # Arguments
    /// * `table` - Table identifier (non-empty)
    /// * `run` - Run timestamp
    /// * `start` - First row index, 1-based
    /// * `end` - Last row index, inclusive, `>= start`
    /// * `digit_width` - Padding width, at least the digit count of `end`
    pub fn new(
        table: impl Into<String>,
        run: RunTimestamp,
        start: u64,
        end: u64,
        digit_width: usize,
    ) -> Result<Self, NameError> {
        let table = table.into();
        if table.is_empty() {
            return Err(NameError::InvalidMetadata("table must not be empty".into()));
        }
        if start == 0 || start > end {
            return Err(NameError::InvalidMetadata(format!(
                "invalid row span [{start}, {end}]"
            )));
        }
        if digit_width < self::digit_width(end) {
            return Err(NameError::InvalidMetadata(format!(
                "digit width {digit_width} cannot hold index {end}"
            )));
        }
        Ok(Self {
            table,
            run,
            start,
            end,
            digit_width,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn run(&self) -> RunTimestamp {
        self.run
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn digit_width(&self) -> usize {
        self.digit_width
    }

    /// Number of rows the chunk holds
    pub fn rows(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Same chunk, padded to a different width
    pub fn with_digit_width(&self, digit_width: usize) -> Result<Self, NameError> {
        Self::new(self.table.clone(), self.run, self.start, self.end, digit_width)
    }

    /// Encode the metadata as an object name
    pub fn encode(&self) -> String {
        format!(
            "{table}/{run}{RUN_SEPARATOR}{start:0w$}{SPAN_SEPARATOR}{end:0w$}{CHUNK_SUFFIX}",
            table = self.table,
            run = self.run,
            start = self.start,
            end = self.end,
            w = self.digit_width,
        )
    }

    /// Decode an object name produced by [`ChunkMetadata::encode`]
    ///
    /// # Errors
    /// `NameError::MalformedName` when a separator or the suffix is missing,
    /// or a numeric field does not parse.
    pub fn decode(name: &str) -> Result<Self, NameError> {
        let malformed = |reason: &str| NameError::MalformedName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let (table, file) = name
            .rsplit_once('/')
            .ok_or_else(|| malformed("missing '/' between table and file name"))?;
        let stem = file
            .strip_suffix(CHUNK_SUFFIX)
            .ok_or_else(|| malformed("missing '.csv' suffix"))?;
        let (run, span) = stem
            .split_once(RUN_SEPARATOR)
            .ok_or_else(|| malformed("missing '__' run separator"))?;
        let (start, end) = span
            .split_once(SPAN_SEPARATOR)
            .ok_or_else(|| malformed("missing '_' span separator"))?;

        let run: RunTimestamp = run.parse().map_err(|e: String| malformed(&e))?;
        let start_n = parse_index(start).ok_or_else(|| malformed("start index is not a number"))?;
        let end_n = parse_index(end).ok_or_else(|| malformed("end index is not a number"))?;
        if start.len() != end.len() {
            return Err(malformed("start and end indices have different padding"));
        }

        Self::new(table, run, start_n, end_n, start.len()).map_err(|e| malformed(&e.to_string()))
    }
}

impl fmt::Display for ChunkMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_index(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
