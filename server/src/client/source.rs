//! Readable sources of upload bytes

use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::plan::Fingerprint;

/// Something that can be uploaded part by part
#[async_trait]
pub trait PartSource: Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    /// Modification time in epoch milliseconds
    fn modified_millis(&self) -> i64;

    /// Read exactly the bytes of `range`
    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes>;

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.name(), self.size(), self.modified_millis())
    }
}

/// A file on local disk; each read opens its own handle
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    size: u64,
    modified_millis: i64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{:?} is not a regular file", path),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let modified_millis = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(Self {
            path,
            name,
            size: metadata.len(),
            modified_millis,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PartSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn modified_millis(&self) -> i64 {
        self.modified_millis
    }

    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(range.start)).await?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// An in-memory buffer
#[derive(Debug, Clone)]
pub struct BytesSource {
    name: String,
    data: Bytes,
    modified_millis: i64,
}

impl BytesSource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>, modified_millis: i64) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            modified_millis,
        }
    }
}

#[async_trait]
impl PartSource for BytesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn modified_millis(&self) -> i64 {
        self.modified_millis
    }

    async fn read_range(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if range.end > self.size() || range.start > range.end {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range {:?} outside {} bytes", range, self.size()),
            ));
        }
        Ok(self.data.slice(range.start as usize..range.end as usize))
    }
}
