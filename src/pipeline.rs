//! Ingestion pipeline: parse, load into the store, report.

use crate::config::SourceConfig;
use crate::io::open_source;
use crate::reader::{parse_source, ParseStats, RecordReader};
use crate::record::{Node, Record};
use crate::report::AgeDistribution;
use crate::store::UserStore;
use crate::IngestResult;
use serde_json::{Map, Value};
use tracing::info;

/// Stored in place of a name when either part is missing.
pub const NAME_PLACEHOLDER: &str = "N/A";

/// One `users` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub age: i64,
    pub address: Option<Value>,
    /// Every top-level key other than `name`, `age` and `address`.
    pub additional_info: Option<Value>,
}

impl NewUser {
    pub fn from_record(mut record: Record) -> IngestResult<Self> {
        let name = record.remove("name");
        let age = record.remove("age");
        let address = record.remove("address");

        let name = name
            .as_ref()
            .and_then(Node::as_fields)
            .and_then(|parts| {
                let first = parts.get("firstName")?.as_text()?;
                let last = parts.get("lastName")?.as_text()?;
                (!first.is_empty() && !last.is_empty()).then(|| format!("{first} {last}"))
            })
            .unwrap_or_else(|| NAME_PLACEHOLDER.to_string());

        let address = match address {
            // an empty cell means no address
            Some(node) if node.as_text() == Some("") => None,
            Some(node) => Some(serde_json::to_value(&node)?),
            None => None,
        };

        let mut rest = Map::new();
        for (key, node) in record.fields().iter() {
            rest.insert(key.to_string(), serde_json::to_value(node)?);
        }

        Ok(Self {
            name,
            age: age.as_ref().and_then(Node::as_int).unwrap_or(0),
            address,
            additional_info: Some(Value::Object(rest)),
        })
    }
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The source held no records; nothing was written.
    Empty { stats: ParseStats },
    Loaded {
        count: usize,
        distribution: AgeDistribution,
        stats: ParseStats,
    },
}

/// Parse the configured source, load every record, then report.
///
/// Records are converted as they are read; the users batch is written in a
/// single transaction once the stream ends, on the blocking pool.
pub async fn ingest(config: &SourceConfig, store: &UserStore) -> IngestResult<IngestOutcome> {
    info!("CSV processing triggered...");
    let (reader, _meta) = open_source(config).await?;
    let mut rdr = RecordReader::new(reader, config);

    let mut users = Vec::new();
    while let Some(record) = rdr.next_record().await? {
        users.push(NewUser::from_record(record)?);
    }
    let stats = rdr.stats();

    if users.is_empty() {
        info!("No records found in CSV file.");
        return Ok(IngestOutcome::Empty { stats });
    }

    let store = store.clone();
    let (count, distribution) = tokio::task::spawn_blocking(move || -> IngestResult<_> {
        let count = store.insert_users(&users)?;
        info!("Successfully uploaded {} records.", count);
        Ok((count, store.age_distribution()?))
    })
    .await??;
    Ok(IngestOutcome::Loaded {
        count,
        distribution,
        stats,
    })
}

/// Parser output without touching the store.
#[derive(Debug, Clone)]
pub struct Preview {
    pub total_records: usize,
    pub records: Vec<Record>,
    pub stats: ParseStats,
    pub checksum: u32,
}

pub async fn preview(config: &SourceConfig) -> IngestResult<Preview> {
    info!("CSV preview triggered...");
    let parsed = parse_source(config).await?;
    Ok(Preview {
        total_records: parsed.records.len(),
        records: parsed.records,
        stats: parsed.stats,
        checksum: parsed.checksum,
    })
}
