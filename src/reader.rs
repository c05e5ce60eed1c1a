//! Streaming record reader.
//!
//! Reads one physical line at a time: the first non-blank line is the header,
//! every later non-blank line becomes one [`Record`]. Lines that cannot be
//! decoded are logged and skipped; only stream I/O errors end the parse.

use crate::codec::{LineDecoder, LineError, LineFrame};
use crate::config::SourceConfig;
use crate::io::open_source;
use crate::record::Record;
use crate::split::split_line;
use crate::validate::missing_mandatory;
use crate::{IngestError, IngestResult};
use crc32fast::Hasher as Crc32;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Dot-path column names, fixed for one parse run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    paths: Vec<String>,
}

/// Field values aligned with a [`Header`]: at least as many values as columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<String>,
}

impl Header {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Right-pad `values` with empty strings to the header width.
    /// Longer rows are kept whole; the extra values are never read.
    pub fn pad(&self, mut values: Vec<String>) -> Row {
        if values.len() < self.paths.len() {
            values.resize(self.paths.len(), String::new());
        }
        Row { values }
    }

    /// Assign each column of `row` into a fresh record.
    pub fn build(&self, row: &Row) -> Record {
        let mut record = Record::new();
        for (path, value) in self.paths.iter().zip(&row.values) {
            record.assign(path, value);
        }
        record
    }
}

impl Row {
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Counters for one parse run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    /// Physical lines read, including blank and skipped ones.
    pub lines: u64,
    pub blank_lines: u64,
    pub records: u64,
    /// Lines dropped because they could not be decoded.
    pub skipped_lines: u64,
    /// Records emitted with mandatory fields missing.
    pub invalid_records: u64,
}

#[derive(Debug)]
enum ReaderState {
    AwaitingHeader,
    ReadingRows(Header),
    Done,
}

/// Lazily turns a UTF-8 byte stream into records.
pub struct RecordReader<R> {
    lines: FramedRead<R, LineDecoder>,
    delimiter: u8,
    state: ReaderState,
    stats: ParseStats,
    crc: Crc32,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, config: &SourceConfig) -> Self {
        Self {
            lines: FramedRead::new(reader, LineDecoder::new(config.max_line_len)),
            delimiter: config.delimiter,
            state: ReaderState::AwaitingHeader,
            stats: ParseStats::default(),
            crc: Crc32::new(),
        }
    }

    /// The header, once the first non-blank line has been read.
    pub fn header(&self) -> Option<&Header> {
        match &self.state {
            ReaderState::ReadingRows(header) => Some(header),
            _ => None,
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// CRC32 over the field values of every record emitted so far.
    pub fn checksum(&self) -> u32 {
        self.crc.clone().finalize()
    }

    /// Next record, or `None` at end of input.
    ///
    /// Errors are stream-level I/O failures only; the reader is finished after one.
    pub async fn next_record(&mut self) -> IngestResult<Option<Record>> {
        loop {
            if matches!(self.state, ReaderState::Done) {
                return Ok(None);
            }

            let frame = match self.lines.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.state = ReaderState::Done;
                    return Err(e.into());
                }
                None => {
                    self.finish();
                    return Ok(None);
                }
            };
            self.stats.lines += 1;

            let line = match frame {
                LineFrame::Line(line) => line,
                LineFrame::Fault(err) => {
                    self.skip(err);
                    continue;
                }
            };
            if line.text.trim().is_empty() {
                self.stats.blank_lines += 1;
                continue;
            }

            if matches!(self.state, ReaderState::AwaitingHeader) {
                let header = Header::new(split_line(&line.text, self.delimiter));
                info!(line = line.number, "Parsed {} headers from CSV", header.len());
                self.state = ReaderState::ReadingRows(header);
                continue;
            }
            let ReaderState::ReadingRows(header) = &self.state else {
                return Ok(None);
            };

            let row = header.pad(split_line(&line.text, self.delimiter));
            for (i, value) in row.values.iter().take(header.len()).enumerate() {
                if i > 0 {
                    self.crc.update(&[0x1f]);
                }
                self.crc.update(value.as_bytes());
            }
            self.crc.update(&[0x1e]);

            let record = header.build(&row);
            let missing = missing_mandatory(&record);
            if !missing.is_empty() {
                self.stats.invalid_records += 1;
                warn!(
                    line = line.number,
                    missing = ?missing,
                    "Line {}: Missing mandatory fields (name.firstName, name.lastName, or age)",
                    line.number
                );
            }
            self.stats.records += 1;
            return Ok(Some(record));
        }
    }

    /// Records as a stream; it ends after the first I/O error.
    pub fn into_stream(self) -> impl Stream<Item = IngestResult<Record>> {
        futures::stream::try_unfold(self, |mut reader| async move {
            let next = reader.next_record().await?;
            Ok::<_, IngestError>(next.map(|record| (record, reader)))
        })
    }

    fn skip(&mut self, err: LineError) {
        self.stats.skipped_lines += 1;
        warn!(line = err.line(), error = %err, "Error parsing line {}, skipping", err.line());
    }

    fn finish(&mut self) {
        if matches!(self.state, ReaderState::AwaitingHeader) {
            debug!("reached end of input without a header line");
        }
        self.state = ReaderState::Done;
        info!(
            records = self.stats.records,
            skipped = self.stats.skipped_lines,
            invalid = self.stats.invalid_records,
            "Successfully parsed {} records from CSV",
            self.stats.records
        );
    }
}

/// All records of one run, plus counters.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub records: Vec<Record>,
    pub stats: ParseStats,
    pub checksum: u32,
}

/// Read every record from an already opened UTF-8 stream.
pub async fn parse_reader<R>(reader: R, config: &SourceConfig) -> IngestResult<Parsed>
where
    R: AsyncRead + Unpin,
{
    let mut rdr = RecordReader::new(reader, config);
    let mut records = Vec::new();
    while let Some(record) = rdr.next_record().await? {
        records.push(record);
    }
    Ok(Parsed {
        records,
        stats: rdr.stats(),
        checksum: rdr.checksum(),
    })
}

/// Open the configured source and read every record from it.
pub async fn parse_source(config: &SourceConfig) -> IngestResult<Parsed> {
    let (reader, _meta) = open_source(config).await?;
    parse_reader(reader, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, ReadBuf};

    struct FailingRead;

    impl AsyncRead for FailingRead {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("device went away")))
        }
    }

    async fn parse(input: &[u8]) -> Parsed {
        parse_reader(Cursor::new(input.to_vec()), &SourceConfig::default())
            .await
            .unwrap()
    }

    fn to_json(records: &[Record]) -> serde_json::Value {
        serde_json::to_value(records).unwrap()
    }

    #[test]
    fn pad_fills_to_header_width_and_never_truncates() {
        let header = Header::new(vec!["a".into(), "b".into(), "c".into()]);
        let short = header.pad(vec!["1".into()]);
        assert_eq!(short.values(), ["1", "", ""]);
        let long = header.pad(vec!["1".into(), "2".into(), "3".into(), "4".into()]);
        assert_eq!(long.len(), 4);
        let record = header.build(&long);
        assert_eq!(record.fields().len(), 3);
    }

    #[tokio::test]
    async fn builds_nested_records() {
        let parsed = parse(b"name.firstName,name.lastName,age\nJohn,Doe,30\n").await;
        assert_eq!(
            to_json(&parsed.records),
            json!([{"name": {"firstName": "John", "lastName": "Doe"}, "age": 30}])
        );
        assert_eq!(parsed.stats.records, 1);
        assert_eq!(parsed.stats.invalid_records, 0);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped_everywhere() {
        let parsed = parse(b"\n  \nname.firstName,age\n\nA,1\n \t \nB,2\n\n").await;
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.stats.blank_lines, 5);
        assert_eq!(parsed.stats.lines, 8);
    }

    #[tokio::test]
    async fn short_rows_are_padded_and_still_emitted() {
        let parsed = parse(b"name.firstName,name.lastName,age,address.city\nJane\n").await;
        assert_eq!(
            to_json(&parsed.records),
            json!([{
                "name": {"firstName": "Jane", "lastName": ""},
                "age": 0,
                "address": {"city": ""}
            }])
        );
        assert_eq!(parsed.stats.invalid_records, 1);
    }

    #[tokio::test]
    async fn undecodable_line_is_dropped_and_parsing_continues() {
        let mut input = b"name.firstName,name.lastName,age\nA,B,1\n".to_vec();
        input.extend_from_slice(b"\xC3\x28,bad,2\n");
        input.extend_from_slice(b"C,D,3\n");
        let parsed = parse(&input).await;
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.stats.skipped_lines, 1);
        assert_eq!(parsed.records[1].text("name.firstName"), Some("C"));
    }

    #[tokio::test]
    async fn header_only_yields_no_records() {
        let parsed = parse(b"name.firstName,name.lastName,age\n").await;
        assert!(parsed.records.is_empty());
        let parsed = parse(b"").await;
        assert!(parsed.records.is_empty());
    }

    #[tokio::test]
    async fn crlf_and_quoted_fields() {
        let parsed =
            parse(b"name.firstName,name.lastName,age,note\r\n\"Mary, Jr\",Ann,41,\"said \"\"hey\"\"\"\r\n")
                .await;
        let record = &parsed.records[0];
        assert_eq!(record.text("name.firstName"), Some("Mary, Jr"));
        assert_eq!(record.text("note"), Some("said \"hey\""));
        assert_eq!(record.int("age"), Some(41));
    }

    #[tokio::test]
    async fn checksum_is_stable_across_runs() {
        let input = b"name.firstName,name.lastName,age\nA,B,1\nC,D,2\n";
        let first = parse(input).await;
        let second = parse(input).await;
        assert_eq!(first.records, second.records);
        assert_eq!(first.checksum, second.checksum);
        let other = parse(b"name.firstName,name.lastName,age\nA,B,1\nC,D,3\n").await;
        assert_ne!(first.checksum, other.checksum);
    }

    #[tokio::test]
    async fn stream_yields_records_in_file_order() {
        let input = b"id,age\n1,10\n2,20\n3,30\n".to_vec();
        let rdr = RecordReader::new(Cursor::new(input), &SourceConfig::default());
        let records: Vec<Record> = rdr.into_stream().try_collect().await.unwrap();
        let ids: Vec<_> = records.iter().filter_map(|r| r.text("id")).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn header_is_available_after_first_record() {
        let input = b"a.b,c\n1,2\n".to_vec();
        let mut rdr = RecordReader::new(Cursor::new(input), &SourceConfig::default());
        assert!(rdr.header().is_none());
        rdr.next_record().await.unwrap().unwrap();
        assert_eq!(rdr.header().unwrap().paths(), ["a.b", "c"]);
        assert!(rdr.next_record().await.unwrap().is_none());
        assert!(rdr.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn carriage_return_only_input() {
        let parsed = parse(b"name.firstName,name.lastName,age\rJohn,Doe,30\rJane,Roe,41\r").await;
        assert_eq!(
            to_json(&parsed.records),
            json!([
                {"name": {"firstName": "John", "lastName": "Doe"}, "age": 30},
                {"name": {"firstName": "Jane", "lastName": "Roe"}, "age": 41}
            ])
        );
        assert_eq!(parsed.stats.lines, 3);
    }

    #[tokio::test]
    async fn read_failure_ends_the_parse() {
        let input = Cursor::new(b"name.firstName,name.lastName,age\nA,B,1\n".to_vec());
        let mut rdr = RecordReader::new(input.chain(FailingRead), &SourceConfig::default());
        assert!(rdr.next_record().await.unwrap().is_some());
        assert!(matches!(rdr.next_record().await, Err(IngestError::Io(_))));
        assert!(rdr.next_record().await.unwrap().is_none());
        assert_eq!(rdr.stats().records, 1);
    }
}
