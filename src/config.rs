//! Source configuration for a parse run.
//!
//! The source path is an explicit parameter; [`SourceConfig::from_env`] only
//! exists as a convenience for binaries.

use crate::{IngestError, IngestResult};
use std::path::PathBuf;

/// Environment variable naming the CSV file.
pub const SOURCE_ENV: &str = "CSV_FILE_PATH";
/// Environment variable naming the SQLite database file.
pub const DATABASE_ENV: &str = "DATABASE_PATH";
pub const DEFAULT_DATABASE: &str = "users.db";
/// Longest accepted physical line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Location of the CSV file. `None` fails the run before any reading.
    pub path: Option<PathBuf>,
    /// Character encoding of the file (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
    pub delimiter: u8,
    pub max_line_len: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            charset: encoding_rs::UTF_8,
            delimiter: b',',
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Path from `CSV_FILE_PATH`, other settings at their defaults.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os(SOURCE_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            ..Default::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: &str) -> IngestResult<Self> {
        self.delimiter = parse_delimiter(delimiter)?;
        Ok(self)
    }

    /// Charset by WHATWG label, e.g. `utf-8`, `latin1`, `windows-1252`.
    pub fn with_charset(mut self, label: &str) -> IngestResult<Self> {
        self.charset = encoding_rs::Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| IngestError::Config(format!("Unknown character encoding: {label}")))?;
        Ok(self)
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> IngestResult<Self> {
        if max_line_len == 0 {
            return Err(IngestError::Config(
                "Maximum line length must be greater than zero".into(),
            ));
        }
        self.max_line_len = max_line_len;
        Ok(self)
    }
}

/// A delimiter is one ASCII character other than the quote, `\r` or `\n`.
/// `\t` may be written as the two-character escape.
pub fn parse_delimiter(raw: &str) -> IngestResult<u8> {
    let bytes = match raw {
        "\\t" => b"\t".as_slice(),
        other => other.as_bytes(),
    };
    match bytes {
        [b] if b.is_ascii() && !matches!(*b, b'"' | b'\r' | b'\n') => Ok(*b),
        _ => Err(IngestError::Config(format!(
            "Delimiter must be a single ASCII character other than a quote or newline, got {raw:?}"
        ))),
    }
}
