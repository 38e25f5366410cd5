use anyhow::Result;
use async_trait::async_trait;

use crate::config::ESTIMATE_SAMPLE_BYTES;

/// Abstraction for byte-level I/O operations
/// This trait enables reading submitted files from different sources
/// with a unified interface
#[async_trait]
pub trait ByteReader: Send + Sync {
    /// Get the total size of the file/object in bytes
    async fn size(&self) -> Result<u64>;

    /// Read a range of bytes from the file/object
    /// Returns the bytes read (may be less than requested if EOF is reached)
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Read the whole file/object
    async fn read_all(&self) -> Result<Vec<u8>> {
        let size = self.size().await?;
        self.read_range(0, size).await
    }
}

/// ByteReader over bytes already held in memory (e.g. an upload body)
#[derive(Debug, Clone)]
pub struct MemoryByteReader {
    data: Vec<u8>,
}

impl MemoryByteReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteReader for MemoryByteReader {
    async fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let end = std::cmp::min(end as usize, self.data.len());
        let start = std::cmp::min(start as usize, end);
        Ok(self.data[start..end].to_vec())
    }

    async fn read_all(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

/// Estimate the number of rows in a byte range by sampling
pub async fn estimate_rows_in_range(
    reader: &dyn ByteReader,
    start: u64,
    end: u64,
) -> Result<Option<u64>> {
    if start >= end {
        return Ok(Some(0));
    }

    // Sample the first few KB to estimate average row size
    let sample_size = std::cmp::min(ESTIMATE_SAMPLE_BYTES as u64, end - start);
    let sample_end = start + sample_size;

    let buffer = reader.read_range(start, sample_end).await?;

    if buffer.is_empty() {
        return Ok(Some(0));
    }

    let newline_count = buffer.iter().filter(|&&b| b == b'\n').count();

    if newline_count == 0 {
        // Can't estimate if no newlines in sample
        return Ok(None);
    }

    let avg_bytes_per_row = (buffer.len() / newline_count).max(1);
    let total_bytes = end - start;
    let estimated_rows = total_bytes / avg_bytes_per_row as u64;

    Ok(Some(estimated_rows))
}
