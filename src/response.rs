//! Caller-facing results: an outcome kind with its exit code, plus a JSON body.

use crate::pipeline::{IngestOutcome, Preview};
use crate::record::Record;
use crate::report::AgeDistribution;
use crate::{IngestError, IngestResult};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

const NO_RECORDS: &str = "No records found in CSV file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The source produced no records.
    NoInput,
    /// Source unset or missing, or other invalid configuration.
    BadPrecondition,
    /// I/O, database, or other unexpected failure.
    Internal,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Internal => 1,
            Outcome::BadPrecondition => 2,
            Outcome::NoInput => 3,
        }
    }

    pub fn of_error(err: &IngestError) -> Self {
        if err.is_precondition() {
            Outcome::BadPrecondition
        } else {
            Outcome::Internal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub outcome: Outcome,
    pub body: Value,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    message: &'static str,
    count: usize,
    distribution: &'a AgeDistribution,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewBody<'a> {
    success: bool,
    message: &'static str,
    total_records: usize,
    records: &'a [Record],
}

impl Response {
    pub fn upload(result: IngestResult<IngestOutcome>) -> IngestResult<Self> {
        let response = match result {
            Ok(IngestOutcome::Loaded {
                count,
                distribution,
                ..
            }) => Self {
                outcome: Outcome::Success,
                body: serde_json::to_value(UploadBody {
                    message: "Data uploaded & processed",
                    count,
                    distribution: &distribution,
                })?,
            },
            Ok(IngestOutcome::Empty { .. }) => Self {
                outcome: Outcome::NoInput,
                body: json!({ "message": NO_RECORDS }),
            },
            Err(err) => {
                error!("Error uploading CSV: {}", err);
                Self {
                    outcome: Outcome::of_error(&err),
                    body: json!({ "error": format!("Error uploading CSV data: {err}") }),
                }
            }
        };
        Ok(response)
    }

    pub fn preview(result: IngestResult<Preview>) -> IngestResult<Self> {
        let response = match result {
            Ok(preview) if preview.records.is_empty() => Self {
                outcome: Outcome::NoInput,
                body: json!({ "success": false, "message": NO_RECORDS }),
            },
            Ok(preview) => Self {
                outcome: Outcome::Success,
                body: serde_json::to_value(PreviewBody {
                    success: true,
                    message: "CSV parsed successfully",
                    total_records: preview.total_records,
                    records: &preview.records,
                })?,
            },
            Err(err) => {
                error!("Error previewing CSV: {}", err);
                Self {
                    outcome: Outcome::of_error(&err),
                    body: json!({
                        "success": false,
                        "error": format!("Error previewing CSV data: {err}"),
                    }),
                }
            }
        };
        Ok(response)
    }
}
