use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AbortFailure, UploadError, UploadResult};
use crate::types::{PartRecord, SessionId, UploadTarget};
use crate::StorageBackend;

/// In-process backend for tests and demos. Records begun sessions, received
/// parts, completions, and abort attempts, and can inject failures at each
/// protocol step. Safe for concurrent use across sessions.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    min_part_size: u64,
    fail_part: Option<u32>,
    fail_complete: bool,
    fail_abort: bool,
    deny_begin: bool,
}

#[derive(Default)]
struct Inner {
    opened: u64,
    sessions: HashMap<String, SessionState>,
    completed: Vec<CompletedUpload>,
    abort_attempts: Vec<String>,
}

struct SessionState {
    target: UploadTarget,
    parts: Vec<PartRecord>,
    part_sizes: Vec<u64>,
}

/// One successfully completed upload, as the backend recorded it
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub session_id: String,
    pub target: UploadTarget,
    pub parts: Vec<PartRecord>,
    pub part_sizes: Vec<u64>,
    pub size_bytes: u64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            min_part_size: 0,
            fail_part: None,
            fail_complete: false,
            fail_abort: false,
            deny_begin: false,
        }
    }

    /// Enforce a minimum part size like a real object store would
    pub fn with_min_part_size(mut self, bytes: u64) -> Self {
        self.min_part_size = bytes;
        self
    }

    /// Fail `upload_part` for the given part number
    pub fn fail_part_at(mut self, part_number: u32) -> Self {
        self.fail_part = Some(part_number);
        self
    }

    /// Reject `complete`
    pub fn fail_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    /// Make `abort` itself fail, orphaning the session
    pub fn fail_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    /// Refuse to open sessions
    pub fn deny_begin(mut self) -> Self {
        self.deny_begin = true;
        self
    }

    /// Successfully completed uploads, in completion order
    pub fn completed(&self) -> Vec<CompletedUpload> {
        self.lock().completed.clone()
    }

    /// Session ids passed to `abort`, whether or not the abort succeeded
    pub fn abort_attempts(&self) -> Vec<String> {
        self.lock().abort_attempts.clone()
    }

    /// Sessions neither completed nor successfully aborted
    pub fn active_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Total sessions ever opened
    pub fn sessions_opened(&self) -> u64 {
        self.lock().opened
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn begin(&self, target: &UploadTarget) -> UploadResult<SessionId> {
        if self.deny_begin {
            return Err(UploadError::unauthorized("begin denied"));
        }
        let mut inner = self.lock();
        inner.opened += 1;
        let id = format!("mem-{}", inner.opened);
        inner.sessions.insert(
            id.clone(),
            SessionState {
                target: target.clone(),
                parts: Vec::new(),
                part_sizes: Vec::new(),
            },
        );
        Ok(SessionId::from_string(id))
    }

    async fn upload_part(
        &self,
        _target: &UploadTarget,
        session_id: &SessionId,
        part_number: u32,
        data: Bytes,
    ) -> UploadResult<PartRecord> {
        if self.fail_part == Some(part_number) {
            return Err(UploadError::transient_io(part_number, "injected part failure"));
        }
        let mut inner = self.lock();
        let state = inner
            .sessions
            .get_mut(session_id.as_str())
            .ok_or_else(|| UploadError::backend_unavailable("unknown session"))?;

        let part = PartRecord::new(
            part_number,
            format!("\"mem-{}-{}\"", part_number, data.len()),
        );
        state.parts.push(part.clone());
        state.part_sizes.push(data.len() as u64);
        Ok(part)
    }

    async fn complete(
        &self,
        _target: &UploadTarget,
        session_id: &SessionId,
        parts: &[PartRecord],
    ) -> UploadResult<()> {
        if self.fail_complete {
            return Err(UploadError::inconsistent_parts("injected complete failure"));
        }
        let mut inner = self.lock();
        let state = inner
            .sessions
            .get(session_id.as_str())
            .ok_or_else(|| UploadError::backend_unavailable("unknown session"))?;

        if state.parts != parts {
            return Err(UploadError::inconsistent_parts(format!(
                "submitted {} parts but session recorded {}",
                parts.len(),
                state.parts.len()
            )));
        }

        let state = inner
            .sessions
            .remove(session_id.as_str())
            .ok_or_else(|| UploadError::backend_unavailable("unknown session"))?;
        let size_bytes = state.part_sizes.iter().sum();
        inner.completed.push(CompletedUpload {
            session_id: session_id.as_str().to_string(),
            target: state.target,
            parts: state.parts,
            part_sizes: state.part_sizes,
            size_bytes,
        });
        Ok(())
    }

    async fn abort(
        &self,
        _target: &UploadTarget,
        session_id: &SessionId,
    ) -> Result<(), AbortFailure> {
        let mut inner = self.lock();
        inner.abort_attempts.push(session_id.as_str().to_string());
        if self.fail_abort {
            return Err(AbortFailure::new(
                session_id.as_str(),
                "injected abort failure",
            ));
        }
        inner.sessions.remove(session_id.as_str());
        Ok(())
    }

    fn min_part_size(&self) -> u64 {
        self.min_part_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_rejects_part_list_that_disagrees() {
        let backend = MemoryBackend::new();
        let target = UploadTarget::new("b", "k");
        let session = backend.begin(&target).await.unwrap();
        let part = backend
            .upload_part(&target, &session, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let forged = vec![PartRecord::new(1, "\"not-the-etag\"")];
        let err = backend.complete(&target, &session, &forged).await.unwrap_err();
        assert!(matches!(err, UploadError::InconsistentParts { .. }));

        backend.complete(&target, &session, &[part]).await.unwrap();
        assert_eq!(backend.completed().len(), 1);
        assert_eq!(backend.active_sessions(), 0);
    }
}
