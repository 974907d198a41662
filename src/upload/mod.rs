/// Chunked Upload Engine
///
/// Everything between "client has chunks" and "server has one file":
/// atomic chunk persistence, session tracking, idempotent intake, and
/// deterministic reassembly.
pub mod service;
pub mod session;
pub mod storage;

pub use service::{ChunkReceipt, UploadService, UploadStatus};
pub use session::{SessionRegistry, UploadId, UploadSession};
pub use storage::ChunkStore;
