use std::io::SeekFrom;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::error::{UploadError, UploadResult};

/// Pulls fixed-size chunks sequentially from a seekable source until
/// exhaustion. Each chunk is exactly `chunk_size` bytes except possibly the
/// last, which holds the remainder. Not restartable; a mid-read error from
/// the source is fatal.
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    total_size: u64,
    exhausted: bool,
}

impl<R> ChunkReader<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    /// Determine the total size via seek-to-end, then rewind to the start
    pub async fn new(mut source: R, chunk_size: u64) -> UploadResult<Self> {
        let total_size = source
            .seek(SeekFrom::End(0))
            .await
            .map_err(UploadError::read)?;
        source
            .seek(SeekFrom::Start(0))
            .await
            .map_err(UploadError::read)?;

        Ok(Self {
            source,
            chunk_size: chunk_size as usize,
            total_size,
            exhausted: false,
        })
    }

    /// Total size of the source in bytes, known before reading begins
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Read the next chunk; `Ok(None)` once the source is exhausted
    pub async fn next_chunk(&mut self) -> UploadResult<Option<Bytes>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self
                .source
                .read(&mut buf[filled..])
                .await
                .map_err(UploadError::read)?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(Bytes::from(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn chunks_of(data: Vec<u8>, chunk_size: u64) -> (u64, Vec<usize>) {
        let mut reader = ChunkReader::new(Cursor::new(data), chunk_size)
            .await
            .unwrap();
        let total = reader.total_size();
        let mut sizes = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }
        (total, sizes)
    }

    #[tokio::test]
    async fn exact_multiple_yields_equal_chunks() {
        let (total, sizes) = chunks_of(vec![7u8; 12], 4).await;
        assert_eq!(total, 12);
        assert_eq!(sizes, vec![4, 4, 4]);
    }

    #[tokio::test]
    async fn remainder_lands_in_final_chunk() {
        let (total, sizes) = chunks_of(vec![7u8; 10], 4).await;
        assert_eq!(total, 10);
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(sizes.iter().sum::<usize>() as u64, total);
    }

    #[tokio::test]
    async fn source_smaller_than_chunk_is_one_chunk() {
        let (total, sizes) = chunks_of(vec![7u8; 3], 4).await;
        assert_eq!(total, 3);
        assert_eq!(sizes, vec![3]);
    }

    #[tokio::test]
    async fn empty_source_yields_no_chunks() {
        let (total, sizes) = chunks_of(Vec::new(), 4).await;
        assert_eq!(total, 0);
        assert!(sizes.is_empty());
    }

    #[tokio::test]
    async fn reader_rewinds_before_reading() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3, 4]);
        cursor.set_position(2);

        let mut reader = ChunkReader::new(cursor, 8).await.unwrap();
        assert_eq!(reader.total_size(), 4);
        let chunk = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(&chunk[..], &[1, 2, 3, 4]);
    }
}
