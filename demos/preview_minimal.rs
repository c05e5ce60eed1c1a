use csv_nested_ingest::{open_source, RecordReader, SourceConfig};
use futures::TryStreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SourceConfig::new("./data/users.csv.gz");
    let (reader, _meta) = open_source(&config).await?;

    let mut records = Box::pin(RecordReader::new(reader, &config).into_stream());
    while let Some(record) = records.try_next().await? {
        let first = record.text("name.firstName").unwrap_or("");
        let age = record.int("age").unwrap_or_default();
        println!("{first} ({age}): {}", serde_json::to_string(&record)?);
    }
    Ok(())
}
