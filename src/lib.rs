//! Streaming ingestion of dot-path CSV files into nested records.
//!
//! - Reader: line-at-a-time over local files, gzip or zstd, any `encoding_rs` charset.
//! - Records: `name.firstName,name.lastName,age` headers rebuild `{name: {..}, age}` trees.
//! - Loading: records become `users` rows in SQLite, followed by an age distribution report.
//!
//! Bad lines are logged and skipped; only configuration and stream I/O
//! failures surface as errors.
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod codec;
pub mod config;
mod io;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod report;
pub mod response;
pub mod split;
pub mod store;
pub mod validate;

pub use crate::codec::LineError;
pub use crate::config::SourceConfig;
pub use crate::io::{build_csv_reader, check_source, open_source, Compression, SourceMeta};
pub use crate::pipeline::{ingest, preview, IngestOutcome, NewUser, Preview};
pub use crate::reader::{parse_reader, parse_source, Header, ParseStats, Parsed, RecordReader};
pub use crate::record::{Fields, Node, Record, Scalar};
pub use crate::report::{AgeBand, AgeDistribution};
pub use crate::response::{Outcome, Response};
pub use crate::store::UserStore;

use thiserror::Error;

/// Error type returned by this crate when not using `anyhow`.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Source unset, missing, or otherwise unusable before reading starts.
    #[error("{0}")]
    Config(String),
    #[error("Error reading CSV file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IngestError {
    /// True for failures of a precondition checked before any parsing.
    pub fn is_precondition(&self) -> bool {
        matches!(self, IngestError::Config(_))
    }
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
