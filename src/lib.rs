//! # kvshell
//!
//! An interactive shell over an embedded, persistent key-value store:
//! - One short transaction per command (get/set/delete/list/find)
//! - Background maintenance that reclaims space from the store file
//! - Optional value encryption at rest
//! - Orderly, idempotent shutdown
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Shell (REPL)                            │
//! │                get / set / list / find / del                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Store                                  │
//! │        (Access Layer + Lifecycle: Open → Closing → Closed)   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │  Access     │          │ Maintenance  │
//!   │  calls      │          │ Worker       │
//!   └──────┬──────┘          └──────┬───────┘
//!          │                        │ reclaim
//!          └───────────┬────────────┘
//!                      ▼
//!              ┌───────────────┐
//!              │ StorageEngine │
//!              │    (redb)     │
//!              └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod crypto;
pub mod storage;
pub mod maintenance;
pub mod store;
pub mod shell;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CloseError, OpenFailure, Result, StoreError};
pub use config::Config;
pub use storage::{Reclaim, RedbBackend, StorageEngine};
pub use store::{KeyValue, Lifecycle, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvshell
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
