use std::io::SeekFrom;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::debug;

use crate::coordinator::UploadCoordinator;
use crate::error::{UploadError, UploadFailure, UploadResult};
use crate::progress::{ndjson, ByteStream, ProgressStream, UploadEvent};
use crate::record::{FileRecord, RecordStore};
use crate::types::UploadTarget;

/// Longest header line the validator will scan before giving up
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Validation rules for column-oriented (CSV) payloads: the header must
/// declare every required column, compared case-insensitively. An empty rule
/// set accepts any payload.
#[derive(Debug, Clone, Default)]
pub struct DatasetRules {
    required_columns: Vec<String>,
}

impl DatasetRules {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn requiring<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_columns: columns
                .into_iter()
                .map(|c| c.into().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Peek the header line of the source, check the required columns, and
    /// rewind to the start. Rejection never opens an upload session.
    pub async fn check<R>(&self, source: &mut R) -> UploadResult<()>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        if self.required_columns.is_empty() {
            return Ok(());
        }

        let mut header = Vec::new();
        let mut buf = [0u8; 4096];
        let mut terminated = false;
        'scan: loop {
            let n = source.read(&mut buf).await.map_err(UploadError::read)?;
            if n == 0 {
                // EOF ends the header line
                terminated = true;
                break;
            }
            for &byte in &buf[..n] {
                if byte == b'\n' {
                    terminated = true;
                    break 'scan;
                }
                if header.len() >= MAX_HEADER_BYTES {
                    break 'scan;
                }
                header.push(byte);
            }
        }
        source
            .seek(SeekFrom::Start(0))
            .await
            .map_err(UploadError::read)?;

        // Validating a truncated header could falsely reject a column that
        // straddles the cap, so an unterminated over-long header is an error.
        if !terminated {
            return Err(UploadError::invalid(format!(
                "dataset header exceeds {} bytes without a line break",
                MAX_HEADER_BYTES
            )));
        }

        let header = String::from_utf8_lossy(&header);
        let present: Vec<String> = header
            .trim_end_matches('\r')
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_ascii_lowercase())
            .collect();

        for required in &self.required_columns {
            if !present.iter().any(|c| c == required) {
                return Err(UploadError::invalid(format!(
                    "required column '{}' missing from dataset header",
                    required
                )));
            }
        }
        debug!(columns = present.len(), "dataset header validated");
        Ok(())
    }
}

/// Thin external-facing layer: validates the inbound payload, delegates to
/// the coordinator, and creates the persistence record on success. The
/// terminal event's stored-object reference carries the record id, so the
/// result rides the stream rather than a response header.
pub struct UploadHandler {
    coordinator: UploadCoordinator,
    records: Arc<dyn RecordStore>,
}

impl UploadHandler {
    pub fn new<S: RecordStore + 'static>(coordinator: UploadCoordinator, records: S) -> Self {
        Self {
            coordinator,
            records: Arc::new(records),
        }
    }

    pub fn with_shared_records(
        coordinator: UploadCoordinator,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            coordinator,
            records,
        }
    }

    /// Validate and run one upload, returning the live progress stream
    pub fn handle<R>(
        &self,
        mut source: R,
        target: UploadTarget,
        rules: DatasetRules,
    ) -> ProgressStream
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let coordinator = self.coordinator.clone();
        let records = self.records.clone();

        let events = async_stream::stream! {
            if let Err(e) = rules.check(&mut source).await {
                yield Err(UploadFailure::from(e));
                return;
            }

            let mut inner = coordinator.run(source, target);
            while let Some(item) = inner.next().await {
                match item {
                    Ok(UploadEvent::Completed { complete }) => {
                        match records.create(FileRecord::for_object(&complete)).await {
                            Ok(record) => {
                                yield Ok(UploadEvent::Completed {
                                    complete: complete.with_record_id(record.id),
                                });
                            }
                            // The object itself is stored; only the tracking
                            // record is missing.
                            Err(e) => yield Err(UploadFailure::from(e)),
                        }
                        return;
                    }
                    Ok(event) => yield Ok(event),
                    Err(failure) => {
                        yield Err(failure);
                        return;
                    }
                }
            }
        };
        Box::pin(events)
    }

    /// Same as [`handle`](Self::handle), framed as newline-delimited JSON
    pub fn handle_ndjson<R>(
        &self,
        source: R,
        target: UploadTarget,
        rules: DatasetRules,
    ) -> ByteStream
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        ndjson(self.handle(source, target, rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn header_check_is_case_insensitive_and_rewinds() {
        let rules = DatasetRules::requiring(["name", "phone", "email"]);
        let mut source = Cursor::new(b"Name,PHONE,Email\nalice,123,a@b.c\n".to_vec());

        rules.check(&mut source).await.unwrap();
        assert_eq!(source.position(), 0);
    }

    #[tokio::test]
    async fn missing_column_is_rejected() {
        let rules = DatasetRules::requiring(["name", "phone"]);
        let mut source = Cursor::new(b"name,email\nalice,a@b.c\n".to_vec());

        let err = rules.check(&mut source).await.unwrap_err();
        assert!(matches!(err, UploadError::Invalid { .. }));
        assert!(err.to_string().contains("phone"));
    }

    #[tokio::test]
    async fn quoted_and_padded_headers_are_accepted() {
        let rules = DatasetRules::requiring(["name"]);
        let mut source = Cursor::new(b"\"Name\" , age\r\n".to_vec());
        rules.check(&mut source).await.unwrap();
    }

    #[tokio::test]
    async fn overlong_header_without_line_break_is_rejected() {
        let rules = DatasetRules::requiring(["name"]);
        let mut source = Cursor::new(vec![b'x'; MAX_HEADER_BYTES + 10]);

        let err = rules.check(&mut source).await.unwrap_err();
        assert!(matches!(err, UploadError::Invalid { .. }));
        assert!(err.to_string().contains("header"));
    }

    #[tokio::test]
    async fn header_ended_by_eof_is_still_validated() {
        let rules = DatasetRules::requiring(["name", "age"]);
        let mut source = Cursor::new(b"name,age".to_vec());
        rules.check(&mut source).await.unwrap();
    }

    #[tokio::test]
    async fn empty_rules_accept_anything() {
        let rules = DatasetRules::any();
        let mut source = Cursor::new(b"\x00\x01binary".to_vec());
        rules.check(&mut source).await.unwrap();
    }
}
