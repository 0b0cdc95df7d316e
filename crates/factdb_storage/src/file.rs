//! Journaled file backend.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK          # Advisory lock for single-process access
//! └─ journal.log   # Append-only log of committed batches
//! ```
//!
//! The sorted table lives in memory and is rebuilt from the journal on
//! open. [`FileBackend::compact`] rewrites the journal as a single record
//! holding the current state.

use crate::backend::{BackendOptions, KvBackend};
use crate::batch::WriteBatch;
use crate::error::{StorageError, StorageResult};
use crate::journal;
use crate::snapshot::KvSnapshot;
use crate::table::Table;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";
const JOURNAL_TEMP: &str = "journal.log.tmp";

struct Journal {
    file: File,
    len: u64,
    poisoned: bool,
}

impl Journal {
    fn append(&mut self, record: &[u8], sync: bool) -> io::Result<()> {
        self.file.write_all(record)?;
        self.file.flush()?;
        if sync {
            self.file.sync_data()?;
        }
        self.len += record.len() as u64;
        Ok(())
    }
}

/// A persistent backend backed by an append-only journal.
///
/// # Durability
///
/// With `sync_on_commit` set, every commit is fsynced before it becomes
/// visible. A torn record at the end of the journal (from a crash during
/// a write) is discarded on the next open.
///
/// # Example
///
/// ```no_run
/// use factdb_storage::{BackendOptions, FileBackend, KvBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("data"), BackendOptions::new(), true).unwrap();
/// backend.declare_index(1, "log").unwrap();
/// let mut batch = backend.create_batch();
/// batch.put(vec![1, 7], b"persistent".to_vec());
/// backend.commit(batch).unwrap();
/// ```
pub struct FileBackend {
    dir: PathBuf,
    table: Arc<Table>,
    journal: Mutex<Journal>,
    sync_on_commit: bool,
    _lock_file: File,
}

impl FileBackend {
    /// Opens the store directory, replaying its journal.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - The journal is corrupted
    /// - I/O errors occur
    pub fn open(dir: &Path, options: BackendOptions, create_if_missing: bool) -> StorageResult<Self> {
        if !dir.exists() {
            if create_if_missing {
                fs::create_dir_all(dir)?;
            } else {
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", dir.display()),
                )));
            }
        }
        if !dir.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", dir.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        // A leftover temp file means compaction died before the rename.
        let temp = dir.join(JOURNAL_TEMP);
        if temp.exists() {
            fs::remove_file(&temp)?;
        }

        let path = dir.join(JOURNAL_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let replay = journal::scan(&data)?;
        if replay.truncated {
            tracing::warn!(
                path = %path.display(),
                valid_len = replay.valid_len,
                discarded = data.len() as u64 - replay.valid_len,
                "discarding torn journal tail"
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let table = Arc::new(Table::new(options));
        for (seq, batch) in &replay.records {
            table.apply_at(batch, *seq);
        }
        tracing::info!(
            path = %dir.display(),
            records = replay.records.len(),
            sequence = table.sequence(),
            "opened journal"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            table,
            journal: Mutex::new(Journal {
                file,
                len: replay.valid_len,
                poisoned: false,
            }),
            sync_on_commit: options.sync_on_commit,
            _lock_file: lock_file,
        })
    }

    /// The store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Current journal size in bytes.
    #[must_use]
    pub fn journal_len(&self) -> u64 {
        self.journal.lock().len
    }

    /// Rewrites the journal as one record holding the visible state.
    ///
    /// The new journal is written to a temp file, fsynced and renamed over
    /// the old one, so a crash leaves either the old or the new journal.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure. The old journal stays in place.
    pub fn compact(&self) -> StorageResult<u64> {
        let mut journal = self.journal.lock();
        if journal.poisoned {
            return Err(StorageError::corrupted("journal is unusable after a failed write"));
        }

        let seq = self.table.sequence();
        let mut batch = WriteBatch::new();
        batch.clear_all();
        for (key, value) in self.table.entries_at(seq) {
            batch.put(key, value);
        }
        // An empty store compacts to an empty journal.
        let record = if seq == 0 {
            Vec::new()
        } else {
            journal::encode_record(seq, &batch)?
        };

        let temp = self.dir.join(JOURNAL_TEMP);
        {
            let mut out = File::create(&temp)?;
            out.write_all(&record)?;
            out.sync_all()?;
        }
        fs::rename(&temp, self.dir.join(JOURNAL_FILE))?;
        self.sync_dir()?;

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(self.dir.join(JOURNAL_FILE))?;
        let before = journal.len;
        journal.file = file;
        journal.len = record.len() as u64;
        tracing::debug!(before, after = journal.len, sequence = seq, "compacted journal");
        Ok(journal.len)
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> StorageResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.dir)
            .field("sequence", &self.table.sequence())
            .finish_non_exhaustive()
    }
}

impl KvBackend for FileBackend {
    fn declare_index(&self, id: u8, name: &str) -> StorageResult<()> {
        self.table.declare_index(id, name)
    }

    fn snapshot(&self) -> KvSnapshot {
        KvSnapshot::new(Arc::clone(&self.table))
    }

    fn commit(&self, batch: WriteBatch) -> StorageResult<u64> {
        let mut journal = self.journal.lock();
        if journal.poisoned {
            return Err(StorageError::corrupted("journal is unusable after a failed write"));
        }
        self.table.validate(&batch)?;

        let seq = self.table.sequence() + 1;
        let record = journal::encode_record(seq, &batch)?;
        let start = journal.len;
        if let Err(err) = journal.append(&record, self.sync_on_commit) {
            tracing::error!(error = %err, sequence = seq, "journal write failed, rolling back");
            if let Err(rollback) = journal.file.set_len(start) {
                journal.poisoned = true;
                return Err(StorageError::corrupted(format!(
                    "journal write failed ({err}) and rollback failed ({rollback})"
                )));
            }
            return Err(err.into());
        }

        self.table.apply_at(&batch, seq);
        Ok(seq)
    }

    fn sequence(&self) -> u64 {
        self.table.sequence()
    }

    fn vacuum(&self) {
        self.table.vacuum();
    }
}
