use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};

use super::byte_reader::ByteReader;

/// ByteReader implementation for local files
#[derive(Clone)]
pub struct LocalFileByteReader {
    file_path: PathBuf,
}

impl LocalFileByteReader {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteReader for LocalFileByteReader {
    async fn size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.file_path)
            .await
            .with_context(|| format!("Failed to open {}", self.file_path.display()))?;
        Ok(metadata.len())
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let file = File::open(&self.file_path)
            .await
            .with_context(|| format!("Failed to open {} for reading", self.file_path.display()))?;

        let mut file = BufReader::new(file);
        file.seek(std::io::SeekFrom::Start(start)).await?;

        let mut buffer = Vec::with_capacity(end.saturating_sub(start) as usize);
        file.take(end.saturating_sub(start))
            .read_to_end(&mut buffer)
            .await
            .context("Failed to read file")?;

        Ok(buffer)
    }

    async fn read_all(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.file_path)
            .await
            .with_context(|| format!("Failed to read {}", self.file_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_local_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "id,name\n1,Alice\n").unwrap();
        temp_file.flush().unwrap();

        let reader = LocalFileByteReader::new(temp_file.path());
        assert_eq!(reader.size().await.unwrap(), 16);
        assert_eq!(reader.read_range(3, 7).await.unwrap(), b"name");
        assert_eq!(reader.read_all().await.unwrap(), b"id,name\n1,Alice\n");
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let reader = LocalFileByteReader::new("/definitely/not/here.csv");
        assert!(reader.read_all().await.is_err());
    }
}
