//! Log store - external persistence and similarity search.
//!
//! The core only ever issues three operations against the store: insert one
//! record, run a nearest-neighbor query, and read recent history. They are
//! expressed as the `LogStore` trait; the production implementation talks
//! to Supabase over its REST surface (PostgREST inserts plus the
//! `match_logs` pgvector RPC).

mod supabase;

use async_trait::async_trait;

use crate::models::StoredLog;

pub use supabase::SupabaseStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected store response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist one annotated record. The embedding may be null.
    async fn insert(&self, record: &StoredLog) -> Result<(), StoreError>;

    /// Records whose embeddings are closest to `query`, best match first,
    /// filtered by the similarity `threshold`, at most `count` rows.
    async fn nearest_neighbors(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<StoredLog>, StoreError>;

    /// The `limit` most recently persisted records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredLog>, StoreError>;
}
