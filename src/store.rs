//! Store Module
//!
//! The store handle: owns the engine, runs the maintenance worker beside
//! caller transactions, and shuts both down exactly once.
//!
//! ## Responsibilities
//! - Open the engine and start the maintenance worker
//! - Expose get/set/delete/list/find, one transaction each
//! - Close: stop the worker, wait for it, then close the engine
//!
//! ## Lifecycle
//! ```text
//!   Open ──close()──▶ Closing ──worker joined, engine closed──▶ Closed
//! ```
//! Only the caller whose compare-and-swap moves `Open → Closing` performs the
//! shutdown. Every other `close()` waits on the worker slot until that
//! shutdown has finished, then returns `Ok(())` without touching the engine.

use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{CloseError, Result, StoreError};
use crate::maintenance::{self, MaintenanceWorker, PassReport};
use crate::storage::{RedbBackend, StorageEngine};

/// Lifecycle state of a [`Store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl Lifecycle {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Lifecycle::Open,
            1 => Lifecycle::Closing,
            _ => Lifecycle::Closed,
        }
    }
}

/// A key and its value, as returned by [`Store::find`]
///
/// Both are raw bytes; nothing at this layer requires them to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Key decoded for display
    pub fn key_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.key)
    }

    /// Value decoded for display
    pub fn value_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Handle to an open store
///
/// ## Concurrency Model
///
/// - Access calls may come from any number of threads; each is one engine
///   transaction and the engine provides isolation between them
/// - The maintenance worker shares the engine through an `Arc` but never
///   closes it
/// - `lifecycle` decides which `close()` performs the shutdown; the `worker`
///   lock is held for the whole shutdown so later callers wait it out
pub struct Store<E: StorageEngine = RedbBackend> {
    /// Shared with the maintenance worker; closed only by `close()`
    engine: Arc<E>,

    /// Background reclaim thread; `None` once joined
    worker: Mutex<Option<MaintenanceWorker>>,

    /// `Lifecycle` as u8
    lifecycle: AtomicU8,

    /// Immutable once the store is open
    config: Config,
}

impl Store<RedbBackend> {
    /// Open or create the store described by `config`
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Open the redb file (lock, cache size, encryption mode)
    /// 3. Start the maintenance worker
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let engine = RedbBackend::open(&config)?;
        tracing::info!(
            path = %engine.path().display(),
            encrypted = engine.is_encrypted(),
            "store opened"
        );

        Self::start(engine, config)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified store file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }
}

impl<E: StorageEngine> Store<E> {
    /// Wrap an already-open engine and start maintenance against it
    pub fn with_engine(engine: E, config: Config) -> Result<Self> {
        config.validate()?;
        Self::start(engine, config)
    }

    fn start(engine: E, config: Config) -> Result<Self> {
        let engine = Arc::new(engine);

        let worker = match MaintenanceWorker::spawn(
            Arc::clone(&engine),
            config.maintenance_interval,
            config.discard_ratio,
        ) {
            Ok(worker) => worker,
            Err(e) => {
                // Release the file lock before reporting
                if let Err(close_err) = engine.close() {
                    tracing::warn!(error = %close_err, "engine close failed after worker spawn error");
                }
                return Err(e);
            }
        };

        Ok(Self {
            engine,
            worker: Mutex::new(Some(worker)),
            lifecycle: AtomicU8::new(Lifecycle::Open as u8),
            config,
        })
    }

    // =========================================================================
    // Access Layer
    // =========================================================================

    /// Get the value stored under `key`
    ///
    /// Fails with `StoreError::NotFound` if the key is absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.engine.get(key.as_ref())
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn set(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let (key, value) = (key.as_ref(), value.as_ref());
        self.ensure_open()?;
        self.engine.set(key, value)?;
        tracing::debug!(key = %String::from_utf8_lossy(key), bytes = value.len(), "set");
        Ok(())
    }

    /// Remove `key`
    ///
    /// Fails with `StoreError::NotFound` if the key did not exist; the store
    /// is left unchanged in that case.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        let key = key.as_ref();
        self.ensure_open()?;
        self.engine.delete(key)?;
        tracing::debug!(key = %String::from_utf8_lossy(key), "deleted");
        Ok(())
    }

    /// Keys starting with `prefix` in ascending byte order
    ///
    /// An empty prefix lists every key. Values are not read.
    pub fn list(&self, prefix: impl AsRef<[u8]>) -> Result<Vec<Vec<u8>>> {
        self.ensure_open()?;
        self.engine.scan_keys(prefix.as_ref())
    }

    /// Entries whose key starts with `prefix`, in the same order as `list`
    pub fn find(&self, prefix: impl AsRef<[u8]>) -> Result<Vec<KeyValue>> {
        self.ensure_open()?;
        let entries = self.engine.scan(prefix.as_ref())?;
        Ok(entries
            .into_iter()
            .map(|(key, value)| KeyValue { key, value })
            .collect())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Run one reclaim pass now, on the calling thread
    pub fn run_maintenance(&self) -> Result<PassReport> {
        self.ensure_open()?;
        Ok(maintenance::drain(self.engine.as_ref(), self.config.discard_ratio))
    }

    /// Stop the maintenance worker and close the engine
    ///
    /// Idempotent: only the first call does any work, and a call that arrives
    /// while that work is running returns once it has finished. Errors from
    /// the worker shutdown and the engine close are joined rather than one
    /// being dropped.
    pub fn close(&self) -> std::result::Result<(), CloseError> {
        // Held until Closed is published
        let mut worker = self.worker.lock();

        if self
            .lifecycle
            .compare_exchange(
                Lifecycle::Open as u8,
                Lifecycle::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }

        tracing::debug!(path = %self.config.path.display(), "closing store");

        // The worker must be gone before the engine is closed
        let stopped = worker.take().map(|mut worker| worker.stop());
        let worker_err = match stopped {
            None => None,
            Some(Ok(report)) => {
                tracing::debug!(
                    passes = report.passes,
                    compactions = report.compactions,
                    faults = report.faults,
                    "maintenance worker joined"
                );
                None
            }
            Some(Err(e)) => Some(e),
        };

        let engine_err = self.engine.close().err().map(|e| e.to_string());

        self.lifecycle
            .store(Lifecycle::Closed as u8, Ordering::Release);

        match CloseError::join(worker_err, engine_err) {
            Some(err) => Err(err),
            None => {
                tracing::info!(path = %self.config.path.display(), "store closed");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current lifecycle state
    pub fn state(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            Lifecycle::Open => Ok(()),
            _ => Err(StoreError::Closed),
        }
    }
}

impl<E: StorageEngine> Drop for Store<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "store close failed during drop");
        }
    }
}
