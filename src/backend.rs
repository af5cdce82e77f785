use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AbortFailure, UploadResult};
use crate::types::{PartRecord, SessionId, UploadTarget};

/// Multipart-upload protocol of the destination object store. Each method is
/// one network call with no automatic retry at this layer; retry policy for
/// transient part failures belongs to the adapter or an enclosing wrapper.
///
/// Implementations must be safe for concurrent use by multiple independent
/// sessions, with every call scoped to one session id.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Open a multipart session for the target; the backend issues the handle
    async fn begin(&self, target: &UploadTarget) -> UploadResult<SessionId>;

    /// Upload one numbered part and return its proof-of-receipt
    async fn upload_part(
        &self,
        target: &UploadTarget,
        session_id: &SessionId,
        part_number: u32,
        data: Bytes,
    ) -> UploadResult<PartRecord>;

    /// Combine the uploaded parts into the final object. The submitted list
    /// must match the backend's view in count and order.
    async fn complete(
        &self,
        target: &UploadTarget,
        session_id: &SessionId,
        parts: &[PartRecord],
    ) -> UploadResult<()>;

    /// Best-effort cleanup of an unfinished session. Failure is surfaced
    /// distinctly, never swallowed: it orphans storage on the backend.
    async fn abort(
        &self,
        target: &UploadTarget,
        session_id: &SessionId,
    ) -> Result<(), AbortFailure>;

    /// Minimum size for all parts except the final one
    fn min_part_size(&self) -> u64 {
        5 * 1024 * 1024
    }
}
