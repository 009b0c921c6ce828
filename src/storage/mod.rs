//! Persisted meeting artifacts outside the ledger.
//!
//! Stage workers write their outputs into document collections and into
//! per-meeting directories on shared volumes. The orchestrator only ever
//! deletes them, once a meeting's pipeline is done.

pub mod documents;
pub mod volumes;

use async_trait::async_trait;

use crate::error::Result;

pub use documents::SqliteArtifactStore;
pub use volumes::VolumeSet;

/// Stage-output collections holding per-meeting documents.
pub const STAGE_COLLECTIONS: [&str; 4] = ["summaries", "ocr_results", "transcriptions", "embeddings"];

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Delete every document of `meeting_id` in `collection`, returning how
    /// many were removed.
    async fn delete_meeting_documents(&self, collection: &str, meeting_id: &str) -> Result<u64>;
}
