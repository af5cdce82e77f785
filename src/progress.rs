use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::UploadFailure;
use crate::types::StoredObject;

/// Lazily-produced sequence of upload events, one per successfully uploaded
/// part plus a terminal completion message. Single-consumer, push-as-produced,
/// not restartable; it ends with either [`UploadEvent::Completed`] or one
/// error item.
pub type ProgressStream = Pin<Box<dyn Stream<Item = Result<UploadEvent, UploadFailure>> + Send>>;

/// Stream of wire-framed bytes, pluggable into any HTTP body type
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Snapshot of bytes transferred versus total size. `uploaded` is
/// monotonically non-decreasing across a session; the final progress event
/// has `uploaded == total_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub uploaded: u64,
    pub total_size: u64,
}

/// One item on the progress stream.
///
/// Serialization is untagged: progress events go on the wire exactly as
/// `{"uploaded": N, "total_size": M}`, and the terminal message as
/// `{"complete": {...}}` carrying the stored-object reference. Putting the
/// result on the stream (rather than a response header) keeps it deliverable
/// after body streaming has begun.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UploadEvent {
    Progress(ProgressEvent),
    Completed { complete: StoredObject },
}

#[derive(Serialize)]
struct ErrorFrame {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_error: Option<String>,
}

/// Frame a progress stream as newline-delimited JSON, one line per event.
/// A failure becomes one `{"error": ...}` line (with `abort_error` attached
/// when cleanup also failed) and ends the stream, so the consumer can read
/// the outcome without waiting for connection close.
pub fn ndjson(events: ProgressStream) -> ByteStream {
    let framed = async_stream::stream! {
        let mut events = events;
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => match serde_json::to_vec(&event) {
                    Ok(mut line) => {
                        line.push(b'\n');
                        yield Ok(Bytes::from(line));
                    }
                    Err(e) => {
                        yield Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                        return;
                    }
                },
                Err(failure) => {
                    let frame = ErrorFrame {
                        error: failure.error.to_string(),
                        abort_error: failure.abort.map(|a| a.to_string()),
                    };
                    let mut line = serde_json::to_vec(&frame)
                        .unwrap_or_else(|_| br#"{"error":"unserializable failure"}"#.to_vec());
                    line.push(b'\n');
                    yield Ok(Bytes::from(line));
                    return;
                }
            }
        }
    };
    Box::pin(framed)
}
