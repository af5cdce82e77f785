/// Default chunk size: 5 MiB, the S3 minimum part size
pub const DEFAULT_CHUNK_SIZE: u64 = 5_242_880;

/// Configuration for upload runs
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Size of each part read from the source. All parts except the final one
    /// are exactly this size; must be at least the backend's minimum part size.
    pub chunk_size: u64,

    /// Upper bound on parts per session, to protect memory and backend state
    pub max_parts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_parts: 10_000,
        }
    }
}

impl UploadConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the part ceiling
    pub fn with_max_parts(mut self, max: u32) -> Self {
        self.max_parts = max;
        self
    }
}
