//! # partstream: chunked, progress-streaming multipart uploads
//!
//! `partstream` moves a seekable byte source into an object store through a
//! multipart-upload protocol, reporting progress to a live consumer after
//! every acknowledged part and guaranteeing all-or-nothing cleanup on
//! failure: either the session completes with every part acknowledged, or it
//! is aborted.
//!
//! ## Key properties
//!
//! - **Streaming-first**: parts are read and uploaded one at a time; nothing
//!   close to the whole file is ever held in memory
//! - **Live progress**: the coordinator suspends after each emitted event, so
//!   a consumer renders progress in real time instead of after the fact
//! - **All-or-nothing**: any mid-session failure aborts the backend session
//!   before the error reaches the caller, and an abort failure is surfaced
//!   alongside the primary error, never in place of it
//! - **Storage agnostic**: the backend is an injected [`StorageBackend`]
//!   trait object (S3-compatible and in-memory implementations included)
//!
//! ## Quick start
//!
//! ```rust
//! use partstream::prelude::*;
//! use std::io::Cursor;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), UploadFailure> {
//! let backend = MemoryBackend::new();
//! let coordinator = UploadCoordinator::new(backend, UploadConfig::default());
//!
//! let source = Cursor::new(vec![0u8; 12_000_000]);
//! let target = UploadTarget::new("media", "videos/intro.mp4");
//!
//! let stored = coordinator.run_to_end(source, target).await?;
//! assert_eq!(stored.size_bytes, 12_000_000);
//! assert_eq!(stored.parts, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │   UploadHandler   │  ← validation + persistence record + wire framing
//! ├───────────────────┤
//! │ UploadCoordinator │  ← session lifecycle, progress, abort-on-failure
//! ├───────────────────┤
//! │  StorageBackend   │  ← begin / upload_part / complete / abort
//! └───────────────────┘
//! ```
//!
//! For live consumers, [`UploadCoordinator::run`] returns a
//! [`ProgressStream`]; [`ndjson`] frames it as newline-delimited JSON with a
//! terminal `{"complete": ...}` message carrying the stored-object reference.

pub mod backend;
mod chunk;
mod config;
mod coordinator;
mod error;
mod ingest;
mod memory;
mod progress;
mod record;
mod s3;
mod types;

pub use backend::StorageBackend;
pub use chunk::ChunkReader;
pub use config::{UploadConfig, DEFAULT_CHUNK_SIZE};
pub use coordinator::UploadCoordinator;
pub use error::{AbortFailure, UploadError, UploadFailure, UploadResult};
pub use ingest::{DatasetRules, UploadHandler};
pub use memory::{CompletedUpload, MemoryBackend};
pub use progress::{ndjson, ByteStream, ProgressEvent, ProgressStream, UploadEvent};
pub use record::{FileRecord, MemoryRecordStore, RecordStore};
pub use s3::{S3Backend, S3Config};
pub use types::{PartRecord, SessionId, StoredObject, UploadSession, UploadTarget};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        DatasetRules, MemoryBackend, ProgressEvent, ProgressStream, S3Backend, S3Config,
        StorageBackend, StoredObject, UploadConfig, UploadCoordinator, UploadError, UploadEvent,
        UploadFailure, UploadHandler, UploadResult, UploadTarget,
    };
}
