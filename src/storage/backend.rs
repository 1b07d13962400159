//! redb-backed storage engine
//!
//! Keys are stored as-is so the B-tree order is plain byte order; values are
//! sealed with AES-256-GCM when the store is encrypted.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::config::Config;
use crate::crypto::{generate_salt, Cipher, EncryptionKey};
use crate::error::{OpenFailure, Result, StoreError};

use super::{Reclaim, StorageEngine};

/// User records
const DATA_TABLE: TableDefinition<'static, &'static [u8], &'static [u8]> =
    TableDefinition::new("data");

/// Store-level metadata (encryption mode, salt, key check token)
const META_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("meta");

const MODE_KEY: &str = "mode";
const SALT_KEY: &str = "salt";
const CHECK_KEY: &str = "check";

const MODE_PLAIN: &[u8] = b"plain";
const MODE_AES256GCM: &[u8] = b"aes256gcm";
const CHECK_TOKEN: &[u8] = b"kvshell-key-check";

/// Storage engine over a single redb database file
///
/// ## Concurrency:
/// - `db`: RwLock so transactions share the read guard while compaction and
///   close take the write guard (`Database::compact` needs `&mut` and no
///   live transactions)
/// - `None` once closed; every later call fails with `StoreError::Closed`
pub struct RedbBackend {
    path: PathBuf,

    db: RwLock<Option<Database>>,

    /// Present when the store is encrypted
    cipher: Option<Cipher>,

    /// Byte window the discard ratio is measured against
    segment_size: u64,
}

impl RedbBackend {
    /// Open or create the database described by `config`
    ///
    /// On open:
    /// 1. Create parent directories
    /// 2. Open the file with the configured page cache (takes the file lock)
    /// 3. Create tables and check the encryption mode against the key
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.path.clone();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let db = Database::builder()
            .set_cache_size(config.index_cache_size)
            .create(&path)
            .map_err(|e| StoreError::open(&path, OpenFailure::from(e)))?;

        let cipher = init_tables(&db, &config.encryption_key)
            .map_err(|reason| StoreError::open(&path, reason))?;

        tracing::debug!(
            path = %path.display(),
            encrypted = cipher.is_some(),
            cache_bytes = config.index_cache_size,
            "redb database opened"
        );

        Ok(Self {
            path,
            db: RwLock::new(Some(db)),
            cipher,
            segment_size: config.value_log_file_size as u64,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether values are sealed on disk
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run `f` against the open database, holding the shared guard
    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        f(db)
    }

    fn seal<'v>(&self, key: &[u8], value: &'v [u8]) -> Result<Cow<'v, [u8]>> {
        match &self.cipher {
            Some(cipher) => Ok(Cow::Owned(cipher.seal(value, key)?)),
            None => Ok(Cow::Borrowed(value)),
        }
    }

    fn unseal(&self, key: &[u8], stored: &[u8]) -> Result<Vec<u8>> {
        match &self.cipher {
            Some(cipher) => cipher.open(stored, key),
            None => Ok(stored.to_vec()),
        }
    }
}

impl StorageEngine for RedbBackend {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(DATA_TABLE)?;

            let stored = table.get(key)?.ok_or(StoreError::NotFound)?;
            let value = self.unseal(key, stored.value())?;
            Ok(value)
        })
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_db(|db| {
            let sealed = self.seal(key, value)?;

            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(DATA_TABLE)?;
                table.insert(key, &*sealed)?;
            }
            txn.commit()?;
            Ok(())
        })
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_db(|db| {
            let txn = db.begin_write()?;
            let existed = {
                let mut table = txn.open_table(DATA_TABLE)?;
                let removed = table.remove(key)?.is_some();
                removed
            };

            if !existed {
                txn.abort()?;
                return Err(StoreError::NotFound);
            }

            txn.commit()?;
            Ok(())
        })
    }

    fn scan_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(DATA_TABLE)?;

            let mut keys = Vec::new();
            for entry in table.range(prefix..)? {
                let (key, _) = entry?;
                let key = key.value();
                if !key.starts_with(prefix) {
                    break;
                }
                keys.push(key.to_vec());
            }
            Ok(keys)
        })
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(DATA_TABLE)?;

            let mut entries = Vec::new();
            for entry in table.range(prefix..)? {
                let (key, value) = entry?;
                let key = key.value();
                if !key.starts_with(prefix) {
                    break;
                }
                entries.push((key.to_vec(), self.unseal(key, value.value())?));
            }
            Ok(entries)
        })
    }

    fn reclaim(&self, discard_ratio: f64) -> Result<Reclaim> {
        let mut guard = self.db.write();
        let db = guard.as_mut().ok_or(StoreError::Closed)?;

        let (fragmented, total) = {
            let txn = db.begin_write()?;
            let stats = txn.stats()?;
            txn.abort()?;

            let fragmented = stats.fragmented_bytes();
            (
                fragmented,
                stats.stored_bytes() + stats.metadata_bytes() + fragmented,
            )
        };

        if !worth_compacting(fragmented, total, self.segment_size, discard_ratio) {
            return Ok(Reclaim::NothingEligible);
        }

        if db.compact()? {
            tracing::debug!(path = %self.path.display(), fragmented, "compacted store file");
            Ok(Reclaim::Compacted { bytes: fragmented })
        } else {
            Ok(Reclaim::NothingEligible)
        }
    }

    fn close(&self) -> Result<()> {
        let db = self.db.write().take().ok_or(StoreError::Closed)?;
        drop(db);

        tracing::debug!(path = %self.path.display(), "redb database closed");
        Ok(())
    }
}

/// Create both tables and settle the store's encryption mode
///
/// A new store records its mode on first open. Later opens must present a
/// key exactly when the store was created with one, and the key must
/// decrypt the stored check token.
fn init_tables(db: &Database, key: &[u8]) -> std::result::Result<Option<Cipher>, OpenFailure> {
    let txn = db.begin_write().map_err(engine_failure)?;

    let cipher = {
        txn.open_table(DATA_TABLE).map_err(engine_failure)?;
        let mut meta = txn.open_table(META_TABLE).map_err(engine_failure)?;

        let mode = meta
            .get(MODE_KEY)
            .map_err(engine_failure)?
            .map(|guard| guard.value().to_vec());

        match mode.as_deref() {
            None if key.is_empty() => {
                meta.insert(MODE_KEY, MODE_PLAIN).map_err(engine_failure)?;
                None
            }
            None => {
                let salt = generate_salt();
                let cipher = Cipher::new(&EncryptionKey::derive(key, &salt).map_err(engine_failure)?);
                let check = cipher
                    .seal(CHECK_TOKEN, CHECK_KEY.as_bytes())
                    .map_err(engine_failure)?;

                meta.insert(MODE_KEY, MODE_AES256GCM).map_err(engine_failure)?;
                meta.insert(SALT_KEY, salt.as_slice()).map_err(engine_failure)?;
                meta.insert(CHECK_KEY, check.as_slice()).map_err(engine_failure)?;
                Some(cipher)
            }
            Some(MODE_PLAIN) if key.is_empty() => None,
            Some(MODE_PLAIN) => return Err(OpenFailure::NotEncrypted),
            Some(MODE_AES256GCM) if key.is_empty() => return Err(OpenFailure::KeyRequired),
            Some(MODE_AES256GCM) => {
                let salt = read_meta(&meta, SALT_KEY)?;
                let check = read_meta(&meta, CHECK_KEY)?;

                let cipher = Cipher::new(&EncryptionKey::derive(key, &salt).map_err(engine_failure)?);
                match cipher.open(&check, CHECK_KEY.as_bytes()) {
                    Ok(token) if token == CHECK_TOKEN => Some(cipher),
                    _ => return Err(OpenFailure::WrongKey),
                }
            }
            Some(other) => {
                return Err(OpenFailure::Corrupted(format!(
                    "unknown store mode '{}'",
                    String::from_utf8_lossy(other)
                )))
            }
        }
    };

    txn.commit().map_err(engine_failure)?;
    Ok(cipher)
}

/// Whether `fragmented` bytes make up at least `discard_ratio` of one
/// segment, where a file smaller than a segment counts as one segment
fn worth_compacting(fragmented: u64, total: u64, segment_size: u64, discard_ratio: f64) -> bool {
    let segment = total.min(segment_size);
    segment > 0 && fragmented as f64 >= discard_ratio * segment as f64
}

fn read_meta(
    meta: &redb::Table<'_, &'static str, &'static [u8]>,
    name: &str,
) -> std::result::Result<Vec<u8>, OpenFailure> {
    meta.get(name)
        .map_err(engine_failure)?
        .map(|guard| guard.value().to_vec())
        .ok_or_else(|| OpenFailure::Corrupted(format!("missing '{}' metadata", name)))
}

fn engine_failure(err: impl ToString) -> OpenFailure {
    OpenFailure::Engine(err.to_string())
}
