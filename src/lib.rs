pub mod api;
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod upload;

pub use config::ServerConfig;
pub use error::{Result, UploadError};
pub use metadata::{FileKind, FileMetadata};
pub use pipeline::{CompletionPipeline, CompletionReport};
pub use upload::{ChunkStore, SessionRegistry, UploadService};
