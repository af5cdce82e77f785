use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, error, info, warn};

use crate::chunk::ChunkReader;
use crate::config::UploadConfig;
use crate::error::{AbortFailure, UploadError, UploadFailure};
use crate::progress::{ProgressEvent, ProgressStream, UploadEvent};
use crate::types::{SessionId, StoredObject, UploadSession, UploadTarget};
use crate::StorageBackend;

/// Owns the lifecycle of upload sessions against an injected backend: drives
/// the chunk reader, uploads parts strictly in ascending order, accumulates
/// part records, and decides completion versus abort. There is no partial
/// success: either `complete` is reached with every part acknowledged, or the
/// session is aborted.
#[derive(Clone)]
pub struct UploadCoordinator {
    backend: Arc<dyn StorageBackend>,
    config: UploadConfig,
}

impl UploadCoordinator {
    pub fn new<B: StorageBackend + 'static>(backend: B, config: UploadConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    /// Create with a shared backend instance
    pub fn with_shared(backend: Arc<dyn StorageBackend>, config: UploadConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Run one upload session, emitting a progress event after each
    /// acknowledged part and a terminal [`UploadEvent::Completed`] carrying
    /// the stored-object reference.
    ///
    /// The returned stream is the session's pacing mechanism: the coordinator
    /// suspends at each yielded event and resumes only when the consumer
    /// polls again. If the consumer goes away mid-stream, the session is
    /// aborted (best effort) instead of being completed for nobody.
    ///
    /// Any failure triggers one abort attempt, then surfaces as a single
    /// `Err(UploadFailure)` item: the primary error plus the abort failure
    /// when cleanup itself failed.
    pub fn run<R>(&self, source: R, target: UploadTarget) -> ProgressStream
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let backend = self.backend.clone();
        let config = self.config.clone();

        let events = async_stream::stream! {
            if config.chunk_size == 0 {
                yield Err(UploadFailure::from(UploadError::invalid(
                    "chunk size must be non-zero",
                )));
                return;
            }
            if config.chunk_size < backend.min_part_size() {
                yield Err(UploadFailure::from(UploadError::invalid(format!(
                    "chunk size {} is below the backend minimum part size {}",
                    config.chunk_size,
                    backend.min_part_size()
                ))));
                return;
            }

            let mut reader = match ChunkReader::new(source, config.chunk_size).await {
                Ok(reader) => reader,
                Err(e) => {
                    yield Err(UploadFailure::from(e));
                    return;
                }
            };
            let total_size = reader.total_size();

            let expected_parts = total_size.div_ceil(config.chunk_size);
            if expected_parts > u64::from(config.max_parts) {
                yield Err(UploadFailure::from(UploadError::invalid(format!(
                    "upload needs {} parts but at most {} are allowed",
                    expected_parts, config.max_parts
                ))));
                return;
            }

            let session_id = match backend.begin(&target).await {
                Ok(id) => id,
                Err(e) => {
                    yield Err(UploadFailure::from(e));
                    return;
                }
            };
            debug!(session = %session_id, target = %target, total_size, "upload session opened");

            let mut session = UploadSession::new(session_id.clone(), target.clone(), total_size);
            let mut guard = AbortGuard::new(backend.clone(), target.clone(), session_id.clone());

            let mut part_number: u32 = 1;
            loop {
                let chunk = match reader.next_chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        let abort = guard.abort_now().await;
                        yield Err(UploadFailure { error: e, abort });
                        return;
                    }
                };

                let chunk_len = chunk.len() as u64;
                match backend.upload_part(&target, &session_id, part_number, chunk).await {
                    Ok(part) => {
                        session.record_part(part, chunk_len);
                        yield Ok(UploadEvent::Progress(ProgressEvent {
                            uploaded: session.uploaded_bytes,
                            total_size,
                        }));
                    }
                    Err(e) => {
                        warn!(session = %session_id, part_number, "part upload failed, aborting session");
                        let abort = guard.abort_now().await;
                        yield Err(UploadFailure { error: e, abort });
                        return;
                    }
                }
                part_number += 1;
            }

            // An empty source completes immediately with zero parts.
            if let Err(e) = backend.complete(&target, &session_id, session.parts()).await {
                warn!(session = %session_id, "complete rejected, aborting session");
                let abort = guard.abort_now().await;
                yield Err(UploadFailure { error: e, abort });
                return;
            }
            guard.disarm();

            info!(
                session = %session_id,
                target = %target,
                uploaded = session.uploaded_bytes,
                parts = session.parts().len(),
                "upload completed"
            );
            yield Ok(UploadEvent::Completed {
                complete: session.into_stored_object(),
            });
        };

        Box::pin(events)
    }

    /// Drive a session to its end, discarding progress events. For callers
    /// that do not forward live progress.
    pub async fn run_to_end<R>(
        &self,
        source: R,
        target: UploadTarget,
    ) -> Result<StoredObject, UploadFailure>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let mut events = self.run(source, target);
        let mut stored = None;
        while let Some(item) = events.next().await {
            if let UploadEvent::Completed { complete } = item? {
                stored = Some(complete);
            }
        }
        stored.ok_or_else(|| {
            UploadFailure::from(UploadError::backend_unavailable(
                "upload stream ended without a terminal event",
            ))
        })
    }
}

/// Ensures a begun session never outlives its coordinator run unresolved.
/// On explicit failure the guard runs abort inline; if the generator is
/// dropped at a suspension point (consumer disconnected), `Drop` spawns the
/// abort instead.
struct AbortGuard {
    backend: Arc<dyn StorageBackend>,
    target: UploadTarget,
    session_id: SessionId,
    armed: bool,
}

impl AbortGuard {
    fn new(backend: Arc<dyn StorageBackend>, target: UploadTarget, session_id: SessionId) -> Self {
        Self {
            backend,
            target,
            session_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Abort exactly once, surfacing a cleanup failure instead of hiding it
    async fn abort_now(&mut self) -> Option<AbortFailure> {
        self.armed = false;
        match self.backend.abort(&self.target, &self.session_id).await {
            Ok(()) => {
                debug!(session = %self.session_id, "session aborted");
                None
            }
            Err(failure) => {
                error!(session = %self.session_id, "abort failed, session orphaned on backend: {failure}");
                Some(failure)
            }
        }
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let backend = self.backend.clone();
        let target = self.target.clone();
        let session_id = self.session_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match backend.abort(&target, &session_id).await {
                        Ok(()) => {
                            debug!(session = %session_id, "session aborted after consumer disconnect")
                        }
                        Err(failure) => {
                            error!(session = %session_id, "abort after consumer disconnect failed: {failure}")
                        }
                    }
                });
            }
            Err(_) => {
                warn!(session = %session_id, "no runtime available to abort abandoned session");
            }
        }
    }
}
