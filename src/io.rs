use crate::config::SourceConfig;
use crate::{IngestError, IngestResult};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::codec::Transcoder;

/// Compression wrapped around the CSV bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

#[derive(Debug, Clone)]
pub struct SourceMeta {
    pub compression: Compression,
    /// just the file name, for logging
    pub name_hint: String,
    /// Which character encoding to expect (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            name_hint: String::new(),
            charset: encoding_rs::UTF_8,
        }
    }
}

impl SourceMeta {
    /// Compression from the file extension: `.gz` or `.zst`, anything else is plain.
    pub fn from_path(path: &Path, charset: &'static encoding_rs::Encoding) -> Self {
        let name_hint = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let compression = match ext.as_str() {
            "gz" => Compression::Gzip,
            "zst" => Compression::Zstd,
            _ => Compression::None,
        };
        Self {
            compression,
            name_hint,
            charset,
        }
    }
}

/// From a generic AsyncRead, wrap with optional decompression and UTF-8 transcoding.
/// The result yields UTF-8 bytes ready for line framing.
pub fn build_csv_reader<R>(raw: R, meta: SourceMeta) -> (impl AsyncRead + Unpin + Send, SourceMeta)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // 1 MiB reads keep syscalls down on large files
    let buf = BufReader::with_capacity(1 << 20, raw);
    let decompressed: Box<dyn AsyncRead + Unpin + Send> = match meta.compression {
        Compression::Gzip => Box::new(GzipDecoder::new(buf)),
        Compression::Zstd => Box::new(ZstdDecoder::new(buf)),
        Compression::None => Box::new(buf),
    };

    let utf8: Box<dyn AsyncRead + Unpin + Send> = if meta.charset == encoding_rs::UTF_8 {
        decompressed
    } else {
        let framed = FramedRead::new(decompressed, Transcoder::new(meta.charset));
        Box::new(StreamReader::new(framed))
    };

    debug!(
        source = %meta.name_hint,
        compression = ?meta.compression,
        charset = meta.charset.name(),
        "opened CSV source"
    );
    (utf8, meta)
}

/// Check that the configured source names an existing file.
///
/// An unset or nonexistent path is a [`IngestError::Config`]; other metadata
/// failures are I/O errors.
pub async fn check_source(config: &SourceConfig) -> IngestResult<&Path> {
    let path = config.path.as_deref().ok_or_else(|| {
        IngestError::Config(format!(
            "CSV source path is not set (use --source or {})",
            crate::config::SOURCE_ENV
        ))
    })?;

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(IngestError::Config(format!(
            "CSV source is not a file: {}",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IngestError::Config(format!(
            "CSV file not found at: {}",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Check the configured source and open it.
pub async fn open_source(
    config: &SourceConfig,
) -> IngestResult<(impl AsyncRead + Unpin + Send, SourceMeta)> {
    let path = check_source(config).await?;
    let file = File::open(path).await?;
    Ok(build_csv_reader(
        file,
        SourceMeta::from_path(path, config.charset),
    ))
}
