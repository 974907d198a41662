/// Upload Sessions & Registry
///
/// In-memory tracking of active uploads. The registry is the only holder
/// of session state; it is volatile, so after a restart status falls back
/// to on-disk chunk enumeration.
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Unique identifier for one upload session.
pub type UploadId = Uuid;

/// Server-side state for one logical upload.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: UploadId,
    /// Client-supplied name, used verbatim for the reassembled file.
    pub filename: String,
    pub total_size: u64,
    pub total_chunks: u32,
    pub chunk_size: u64,
    /// Client checksum hint; when non-empty, completion computes and
    /// returns a fresh whole-file SHA-256.
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Chunk indices known to be committed on disk.
    pub received_chunks: BTreeSet<u32>,
}

impl UploadSession {
    pub fn new(
        filename: String,
        total_size: u64,
        chunk_size: u64,
        checksum: Option<String>,
    ) -> Self {
        let total_chunks = total_size.div_ceil(chunk_size) as u32;
        Self {
            upload_id: Uuid::new_v4(),
            filename,
            total_size,
            total_chunks,
            chunk_size,
            checksum,
            created_at: Utc::now(),
            received_chunks: BTreeSet::new(),
        }
    }

    /// Whether every chunk has been received.
    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() as u64 == u64::from(self.total_chunks)
    }

    /// Chunk indices not yet received, ascending.
    pub fn missing_chunks(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|index| !self.received_chunks.contains(index))
            .collect()
    }
}

/// Process-wide map from upload id to session state.
///
/// All access goes through the lock so received-set updates are atomic
/// with respect to concurrent status and completion reads.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<UploadId, UploadSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: UploadSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.upload_id, session);
    }

    /// Snapshot of a session, if present.
    pub async fn get(&self, upload_id: &UploadId) -> Option<UploadSession> {
        let sessions = self.sessions.read().await;
        sessions.get(upload_id).cloned()
    }

    pub async fn remove(&self, upload_id: &UploadId) -> Option<UploadSession> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(upload_id)
    }

    /// Mutate a session under the registry write lock.
    pub async fn with_session_mut<F, R>(&self, upload_id: &UploadId, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut UploadSession) -> R,
    {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(upload_id).map(mutate)
    }

    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_chunks_rounds_up() {
        let session = UploadSession::new("a.bin".to_string(), 10, 4, None);
        assert_eq!(session.total_chunks, 3);

        let exact = UploadSession::new("b.bin".to_string(), 8, 4, None);
        assert_eq!(exact.total_chunks, 2);

        let tiny = UploadSession::new("c.bin".to_string(), 1, 1024 * 1024, None);
        assert_eq!(tiny.total_chunks, 1);
    }

    #[test]
    fn test_completeness_and_missing_chunks() {
        let mut session = UploadSession::new("a.bin".to_string(), 10, 4, None);
        assert!(!session.is_complete());
        assert_eq!(session.missing_chunks(), vec![0, 1, 2]);

        session.received_chunks.insert(1);
        assert_eq!(session.missing_chunks(), vec![0, 2]);

        session.received_chunks.insert(0);
        session.received_chunks.insert(2);
        assert!(session.is_complete());
        assert!(session.missing_chunks().is_empty());
    }

    #[tokio::test]
    async fn test_registry_insert_get_remove() {
        let registry = SessionRegistry::new();
        let session = UploadSession::new("a.bin".to_string(), 100, 10, None);
        let upload_id = session.upload_id;

        assert!(registry.is_empty().await);
        registry.insert(session).await;

        let snapshot = registry.get(&upload_id).await.unwrap();
        assert_eq!(snapshot.filename, "a.bin");
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(&upload_id).await.is_some());
        assert!(registry.get(&upload_id).await.is_none());
    }

    #[tokio::test]
    async fn test_registry_mutation_is_visible_to_readers() {
        let registry = SessionRegistry::new();
        let session = UploadSession::new("a.bin".to_string(), 100, 10, None);
        let upload_id = session.upload_id;
        registry.insert(session).await;

        let count = registry
            .with_session_mut(&upload_id, |session| {
                session.received_chunks.insert(7);
                session.received_chunks.len()
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let snapshot = registry.get(&upload_id).await.unwrap();
        assert!(snapshot.received_chunks.contains(&7));
    }
}
