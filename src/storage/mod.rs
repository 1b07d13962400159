//! Storage Module
//!
//! The seam between the store handle and the embedded engine.
//!
//! ## Responsibilities
//! - Point read/write/delete, each in its own transaction
//! - Ordered prefix scans over one consistent snapshot
//! - An on-demand "reclaim if beneficial" compaction primitive
//! - Closing the engine (only ever called by the lifecycle coordinator)
//!
//! ## Engine Choice
//! The production backend is [`RedbBackend`], built on `redb`:
//! - ACID transactions with serializable writes and snapshot reads
//! - Ordered B-tree keys (byte order for `&[u8]`)
//! - Exclusive file lock per open database
//! - `Database::compact` for returning free pages to the filesystem

mod backend;

pub use backend::RedbBackend;

use crate::error::Result;

/// Outcome of one call to [`StorageEngine::reclaim`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    /// One compaction ran; `bytes` is the reclaimable size measured before it
    Compacted { bytes: u64 },

    /// Not enough reclaimable space to be worth compacting
    NothingEligible,
}

/// Operations the store handle needs from an embedded engine
///
/// Every method is one self-contained transaction. Implementations must be
/// safe to call from the maintenance thread and caller threads at once.
pub trait StorageEngine: Send + Sync + 'static {
    /// Point lookup; `StoreError::NotFound` if the key is absent
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Insert or overwrite, committed atomically
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key; `StoreError::NotFound` (store unchanged) if it was absent
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Keys starting with `prefix`, ascending, without reading values
    fn scan_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Entries whose key starts with `prefix`, ascending
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Compact once if at least `discard_ratio` of a segment is reclaimable
    fn reclaim(&self, discard_ratio: f64) -> Result<Reclaim>;

    /// Release the engine; later calls fail with `StoreError::Closed`
    fn close(&self) -> Result<()>;
}
