//! Snapshot persistence.
//!
//! The whole record set lives in one JSON file. A flush never edits that file
//! in place: it writes `<snapshot>.tmp` next to it, fsyncs it, and renames it
//! over the snapshot. A crash at any point therefore leaves either the old or
//! the new complete snapshot on disk.

use crate::error::PersistenceError;
use crate::store::Store;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Suffix appended to the snapshot path for the in-progress file.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Location of the snapshot file and its temporary sibling.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    temp_path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot at `path`, with the temporary file at `path` + [`TEMP_SUFFIX`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut temp: OsString = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);

        Self {
            path,
            temp_path: PathBuf::from(temp),
        }
    }

    /// Snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary file path used during a flush.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Read the snapshot.
    ///
    /// A missing file yields an empty record set. Anything else that stops
    /// the file from being read or decoded is an error: the caller cannot
    /// know what the file was meant to contain.
    pub fn load(&self) -> Result<HashMap<String, String>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No snapshot at {}, starting empty", self.path.display());
                return Ok(HashMap::new());
            }
            Err(source) => {
                return Err(PersistenceError::ReadFailed {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            if source.is_io() {
                PersistenceError::ReadFailed {
                    path: self.path.clone(),
                    source: source.into(),
                }
            } else {
                PersistenceError::Corrupt {
                    path: self.path.clone(),
                    source,
                }
            }
        })
    }

    /// Atomically replace the snapshot with `records`.
    ///
    /// On error the previous snapshot is left untouched and the temporary
    /// file is removed.
    pub fn write(&self, records: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        if let Err(e) = self.write_temp(records) {
            self.discard_temp();
            return Err(e);
        }

        if let Err(source) = fs::rename(&self.temp_path, &self.path) {
            self.discard_temp();
            return Err(PersistenceError::RenameFailed {
                from: self.temp_path.clone(),
                to: self.path.clone(),
                source,
            });
        }

        self.sync_parent_dir();
        Ok(())
    }

    /// Create the temporary file, write `records`, fsync and close it.
    pub(crate) fn write_temp(
        &self,
        records: &BTreeMap<String, String>,
    ) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::WriteFailed {
            path: self.temp_path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(write_err)?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, records).map_err(|e| {
            if e.is_io() {
                write_err(e.into())
            } else {
                PersistenceError::Encode(e)
            }
        })?;
        writer.write_all(b"\n").map_err(write_err)?;

        let file = writer.into_inner().map_err(|e| write_err(e.into_error()))?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        Ok(())
    }

    fn discard_temp(&self) {
        if let Err(e) = fs::remove_file(&self.temp_path)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!(
                "Failed to remove temporary snapshot {}: {e}",
                self.temp_path.display()
            );
        }
    }

    /// Make the rename itself durable.
    #[cfg(unix)]
    fn sync_parent_dir(&self) {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::warn!("Failed to fsync directory {}: {e}", parent.display());
        }
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) {}
}

/// Result of a flush request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Store was clean; no I/O performed
    Clean,
    /// A new snapshot was written
    Written {
        /// Number of records in the snapshot
        records: usize,
    },
}

/// Flushes a [`Store`] to its [`SnapshotFile`].
#[derive(Debug)]
pub struct Persister {
    store: Arc<Store>,
    snapshot: SnapshotFile,
    /// Serializes flushes so two never share the temporary file.
    flush_lock: Mutex<()>,
    written: AtomicU64,
}

impl Persister {
    /// Load the snapshot at `path` into a fresh store.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if an existing snapshot is unreadable or
    /// corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let snapshot = SnapshotFile::new(path);
        let records = snapshot.load()?;

        tracing::info!(
            "Loaded {} records from {}",
            records.len(),
            snapshot.path().display()
        );

        Ok(Self::new(Arc::new(Store::from_records(records)), snapshot))
    }

    /// Wrap an existing store.
    #[must_use]
    pub fn new(store: Arc<Store>, snapshot: SnapshotFile) -> Self {
        Self {
            store,
            snapshot,
            flush_lock: Mutex::new(()),
            written: AtomicU64::new(0),
        }
    }

    /// Store being persisted.
    #[must_use]
    pub const fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Snapshot location.
    #[must_use]
    pub const fn snapshot(&self) -> &SnapshotFile {
        &self.snapshot
    }

    /// Number of snapshots written since this persister was created.
    #[must_use]
    pub fn snapshots_written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    /// Write the store to disk if it is dirty.
    ///
    /// The record set is copied under the store lock and written without it.
    /// The dirty flag is cleared only after the rename succeeds and only if
    /// no write arrived in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if any write step fails. The store stays
    /// dirty and the previous snapshot stays in place.
    pub fn flush(&self) -> Result<FlushOutcome, PersistenceError> {
        let _guard = self.flush_lock.lock();

        let Some(checkpoint) = self.store.checkpoint() else {
            return Ok(FlushOutcome::Clean);
        };

        self.snapshot.write(&checkpoint.records)?;
        self.written.fetch_add(1, Ordering::AcqRel);

        if !self.store.mark_clean(checkpoint.generation) {
            tracing::debug!("Writes arrived during flush; store remains dirty");
        }

        tracing::debug!(
            "Wrote snapshot with {} records to {}",
            checkpoint.records.len(),
            self.snapshot.path().display()
        );

        Ok(FlushOutcome::Written {
            records: checkpoint.records.len(),
        })
    }
}
