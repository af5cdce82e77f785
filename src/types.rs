use serde::{Deserialize, Serialize};

/// Opaque handle for one multipart session, issued by the backend on `begin`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create from the backend-issued string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination bucket/key pair for an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
}

impl UploadTarget {
    pub fn new<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Proof-of-receipt for one uploaded part. The sequence handed to `complete`
/// must match, in count and order, the parts acknowledged by `upload_part`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    /// 1-based, strictly increasing, no gaps
    pub part_number: u32,
    /// Opaque token returned by the backend for this part
    pub etag: String,
}

impl PartRecord {
    pub fn new<E: Into<String>>(part_number: u32, etag: E) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// State of one in-flight multipart transfer. Owned exclusively by a single
/// coordinator run; logically closed on complete or abort.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub session_id: SessionId,
    pub target: UploadTarget,
    pub total_size: u64,
    pub uploaded_bytes: u64,
    parts: Vec<PartRecord>,
}

impl UploadSession {
    pub fn new(session_id: SessionId, target: UploadTarget, total_size: u64) -> Self {
        Self {
            session_id,
            target,
            total_size,
            uploaded_bytes: 0,
            parts: Vec::new(),
        }
    }

    /// Record one acknowledged part and the bytes it carried
    pub fn record_part(&mut self, part: PartRecord, size_bytes: u64) {
        self.parts.push(part);
        self.uploaded_bytes += size_bytes;
    }

    /// Parts acknowledged so far, in ascending part-number order
    pub fn parts(&self) -> &[PartRecord] {
        &self.parts
    }

    /// Build the stored-object reference once `complete` has succeeded
    pub fn into_stored_object(self) -> StoredObject {
        StoredObject {
            bucket: self.target.bucket,
            key: self.target.key,
            size_bytes: self.total_size,
            parts: self.parts.len() as u32,
            record_id: None,
        }
    }
}

/// Reference to the stored object, produced only when `complete` succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size_bytes: u64,
    pub parts: u32,
    /// Identifier of the persistence record tracking this object, when the
    /// ingest layer created one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl StoredObject {
    pub fn with_record_id<S: Into<String>>(mut self, record_id: S) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}
