use clap::{Arg, Command};
use csv_nested_ingest::{open_source, RecordReader, SourceConfig};
use std::path::PathBuf;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("bench")
        .about("Measure record reader throughput over one file")
        .arg(
            Arg::new("path")
                .long("path")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(Arg::new("delimiter").long("delimiter").default_value(","))
        .arg(
            Arg::new("limit")
                .long("limit")
                .help("Stop after N records")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let path = matches
        .get_one::<PathBuf>("path")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Provide --path <file>"))?;
    let delimiter = matches
        .get_one::<String>("delimiter")
        .map_or(",", |s| s.as_str());
    let limit = matches.get_one::<u64>("limit").copied();
    let config = SourceConfig::new(&path).with_delimiter(delimiter)?;

    let start = Instant::now();
    let (reader, _meta) = open_source(&config).await?;
    let mut rdr = RecordReader::new(reader, &config);

    let mut records: u64 = 0;
    while rdr.next_record().await?.is_some() {
        records += 1;
        if limit.is_some_and(|lim| records >= lim) {
            break;
        }
    }

    let stats = rdr.stats();
    let elapsed = start.elapsed().as_secs_f64();
    let rps = (records as f64) / elapsed;
    println!(
        "source={} records={} skipped={} invalid={} crc=0x{:08x}\nelapsed={:.1}s records/sec={:.0}",
        path.display(),
        records,
        stats.skipped_lines,
        stats.invalid_records,
        rdr.checksum(),
        elapsed,
        rps
    );
    Ok(())
}
