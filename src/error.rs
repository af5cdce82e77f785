use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur while driving an upload session
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to read source stream: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error("storage backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("not authorized to open upload session: {message}")]
    Unauthorized { message: String },

    #[error("upload of part {part_number} failed: {message}")]
    TransientIo { part_number: u32, message: String },

    #[error("backend rejected submitted part list: {message}")]
    InconsistentParts { message: String },

    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("persistence record could not be created: {message}")]
    Record { message: String },
}

impl UploadError {
    /// Create a read error from an I/O error on the source stream
    pub fn read(source: std::io::Error) -> Self {
        Self::Read { source }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable<S: Into<String>>(message: S) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Create an authorization error
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a transient I/O error for a single part
    pub fn transient_io<S: Into<String>>(part_number: u32, message: S) -> Self {
        Self::TransientIo {
            part_number,
            message: message.into(),
        }
    }

    /// Create an inconsistent parts error
    pub fn inconsistent_parts<S: Into<String>>(message: S) -> Self {
        Self::InconsistentParts {
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a persistence record error
    pub fn record<S: Into<String>>(message: S) -> Self {
        Self::Record {
            message: message.into(),
        }
    }
}

/// Failure of the best-effort abort call. Kept distinct from [`UploadError`]
/// because it leaves an orphaned session consuming backend storage.
#[derive(Error, Debug)]
#[error("abort of upload session {session_id} failed: {message}")]
pub struct AbortFailure {
    pub session_id: String,
    pub message: String,
}

impl AbortFailure {
    pub fn new<S: Into<String>, M: Into<String>>(session_id: S, message: M) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
        }
    }
}

/// Terminal failure of an upload run: the primary error, plus the abort
/// failure when cleanup itself also failed. The primary error is never
/// replaced by the abort outcome.
#[derive(Debug)]
pub struct UploadFailure {
    pub error: UploadError,
    pub abort: Option<AbortFailure>,
}

impl UploadFailure {
    pub fn new(error: UploadError) -> Self {
        Self { error, abort: None }
    }

    pub fn with_abort(error: UploadError, abort: AbortFailure) -> Self {
        Self {
            error,
            abort: Some(abort),
        }
    }

    /// True when the session could not be cleaned up and is orphaned
    pub fn session_orphaned(&self) -> bool {
        self.abort.is_some()
    }
}

impl From<UploadError> for UploadFailure {
    fn from(error: UploadError) -> Self {
        Self::new(error)
    }
}

impl std::fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(abort) = &self.abort {
            write!(f, "; cleanup also failed: {}", abort)?;
        }
        Ok(())
    }
}

impl std::error::Error for UploadFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_keeps_primary_error_first() {
        let failure = UploadFailure::with_abort(
            UploadError::transient_io(3, "connection reset"),
            AbortFailure::new("upl-1", "backend unreachable"),
        );

        let text = failure.to_string();
        assert!(text.starts_with("upload of part 3 failed"));
        assert!(text.contains("cleanup also failed"));
        assert!(text.contains("upl-1"));
    }

    #[test]
    fn failure_without_abort_is_just_the_primary_error() {
        let failure = UploadFailure::new(UploadError::backend_unavailable("down"));
        assert_eq!(failure.to_string(), "storage backend unavailable: down");
        assert!(!failure.session_orphaned());
    }
}
