use csv_nested_ingest::{parse_source, SourceConfig};
use std::{fs::File, io::Write, path::PathBuf, process::Command};

#[tokio::test]
async fn parses_gzip_and_counts_records() -> anyhow::Result<()> {
    // Create a large nested-header CSV
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("users.csv");
    let mut f = File::create(&csv_path)?;
    writeln!(f, "name.firstName,name.lastName,age,address.city")?;
    for i in 0..50_000 {
        writeln!(f, "F{i:06},L{i:06},{},\"City, {i}\"", i % 90)?;
    }
    drop(f);

    // gzip it (use system gzip for speed)
    let gz_path: PathBuf = dir.path().join("users.csv.gz");
    let status = Command::new("bash")
        .arg("-lc")
        .arg(format!(
            "gzip -c {} > {}",
            csv_path.display(),
            gz_path.display()
        ))
        .status()?;
    assert!(status.success());

    // Parse via library
    let parsed = parse_source(&SourceConfig::new(&gz_path)).await?;

    assert_eq!(parsed.records.len(), 50_000);
    assert_eq!(parsed.stats.skipped_lines, 0);
    let last = &parsed.records[49_999];
    assert_eq!(last.text("name.firstName"), Some("F049999"));
    assert_eq!(last.text("address.city"), Some("City, 49999"));
    assert_eq!(last.int("age"), Some(49_999 % 90));

    // same content uncompressed gives identical records
    let plain = parse_source(&SourceConfig::new(&csv_path)).await?;
    assert_eq!(plain.checksum, parsed.checksum);
    assert_eq!(plain.records, parsed.records);
    Ok(())
}

#[tokio::test]
async fn transcodes_latin1_source() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("latin1.csv");
    std::fs::write(&path, b"name.firstName,name.lastName,age\nZo\xeb,M\xfcller,30\n")?;

    let config = SourceConfig::new(&path).with_charset("latin1")?;
    let parsed = parse_source(&config).await?;
    assert_eq!(parsed.records[0].text("name.firstName"), Some("Zoë"));
    assert_eq!(parsed.records[0].text("name.lastName"), Some("Müller"));
    Ok(())
}
