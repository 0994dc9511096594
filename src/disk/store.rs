//! Disk Cache Store Module
//!
//! Size-bounded, crash-consistent key→blob store. Blobs live next to an
//! append-only journal that is replayed into the in-memory index at open.
//!
//! Write protocol: `edit` logs DIRTY and hands out temp files
//! (`<key>.<slot>.tmp`); `commit` fsyncs them, renames them over the clean
//! files and logs CLEAN. Readers only ever open clean files, so a crash at
//! any point leaves either the previous entry or nothing.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, LruTracker};
use crate::disk::journal::{
    read_journal, JournalHeader, JournalWriter, Record, JOURNAL_BACKUP_FILE, JOURNAL_FILE,
    JOURNAL_TMP_FILE,
};
use crate::error::StorageError;

/// Redundant journal records tolerated before the journal is compacted.
const REDUNDANT_OP_COMPACT_THRESHOLD: usize = 2000;

type StorageResult<T> = std::result::Result<T, StorageError>;

/// Writer for one value slot of an open edit.
pub type BlobWriter = BufWriter<File>;

// == Disk Entry ==
#[derive(Debug, Clone)]
struct DiskEntry {
    /// Committed length of each value slot
    lengths: Vec<u64>,
    /// Has been committed at least once
    readable: bool,
    /// An editor currently holds this key
    editing: bool,
    /// Bumped on every commit
    sequence: u64,
}

impl DiskEntry {
    fn new(value_count: usize) -> Self {
        Self {
            lengths: vec![0; value_count],
            readable: false,
            editing: false,
            sequence: 0,
        }
    }

    fn size_bytes(&self) -> u64 {
        self.lengths.iter().sum()
    }
}

fn clean_path(directory: &Path, key: &CacheKey, slot: usize) -> PathBuf {
    directory.join(format!("{}.{}", key, slot))
}

fn dirty_path(directory: &Path, key: &CacheKey, slot: usize) -> PathBuf {
    directory.join(format!("{}.{}.tmp", key, slot))
}

/// Matches the names produced by `clean_path` and `dirty_path`.
fn is_blob_file_name(name: &str) -> bool {
    let name = name.strip_suffix(".tmp").unwrap_or(name);
    match name.rsplit_once('.') {
        Some((key, slot)) => {
            !slot.is_empty()
                && slot.bytes().all(|b| b.is_ascii_digit())
                && CacheKey::parse(key).is_ok()
        }
        None => false,
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// == Store State ==
/// Everything guarded by the per-store lock: index, recency, journal and
/// size accounting.
#[derive(Debug)]
struct State {
    entries: HashMap<CacheKey, DiskEntry>,
    lru: LruTracker<CacheKey>,
    journal: Option<JournalWriter>,
    size_bytes: u64,
    capacity_bytes: u64,
    redundant_ops: usize,
    next_sequence: u64,
    stats: CacheStats,
}

impl State {
    fn journal(&mut self) -> StorageResult<&mut JournalWriter> {
        self.journal.as_mut().ok_or(StorageError::Closed)
    }

    fn sync_occupancy(&mut self) {
        let count = self.entries.values().filter(|e| e.readable).count();
        self.stats.set_occupancy(count, self.size_bytes);
        self.stats.capacity_bytes = self.capacity_bytes;
    }
}

#[derive(Debug)]
struct Inner {
    directory: PathBuf,
    app_version: u32,
    value_count: usize,
    state: Mutex<State>,
}

// == Disk Cache ==
/// Handle on an open disk cache. Cheap to clone; all clones share the store.
#[derive(Debug, Clone)]
pub struct DiskCache {
    inner: Arc<Inner>,
}

impl DiskCache {
    // == Open ==
    /// Opens (or creates) the cache in `directory`.
    ///
    /// A journal written with a different `app_version` or slot count wipes
    /// the directory. An unreadable journal is treated as empty.
    pub fn open(
        directory: impl Into<PathBuf>,
        app_version: u32,
        value_count: usize,
        capacity_bytes: u64,
    ) -> StorageResult<Self> {
        if value_count == 0 {
            return Err(StorageError::InvalidConfig(
                "value_count must be at least 1".to_string(),
            ));
        }
        if capacity_bytes == 0 {
            return Err(StorageError::InvalidConfig(
                "capacity_bytes must be positive".to_string(),
            ));
        }

        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        let journal_path = directory.join(JOURNAL_FILE);
        let backup_path = directory.join(JOURNAL_BACKUP_FILE);
        if backup_path.exists() {
            if journal_path.exists() {
                fs::remove_file(&backup_path)?;
            } else {
                fs::rename(&backup_path, &journal_path)?;
            }
        }

        let cache = Self {
            inner: Arc::new(Inner {
                directory,
                app_version,
                value_count,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    lru: LruTracker::new(),
                    journal: None,
                    size_bytes: 0,
                    capacity_bytes,
                    redundant_ops: 0,
                    next_sequence: 1,
                    stats: CacheStats::new(),
                }),
            }),
        };

        {
            let mut state = cache.lock();
            if journal_path.exists() {
                match read_journal(&journal_path) {
                    Ok(replay) if replay.header.matches(app_version, value_count) => {
                        let truncated = replay.truncated;
                        match cache.replay(&mut state, replay.records) {
                            Ok(()) if truncated || cache.needs_compaction(&state) => {
                                cache.rebuild_journal(&mut state)?;
                            }
                            Ok(()) => {
                                state.journal = Some(JournalWriter::open_append(&journal_path)?);
                            }
                            Err(e) => {
                                warn!(
                                    error = %e,
                                    "Disk cache journal has a bad record, reinitializing"
                                );
                                cache.wipe(&mut state)?;
                            }
                        }
                    }
                    Ok(replay) => {
                        info!(
                            stored_version = replay.header.app_version,
                            app_version, "Disk cache version changed, wiping"
                        );
                        cache.wipe(&mut state)?;
                    }
                    Err(e) => {
                        warn!(error = %e, "Disk cache journal unreadable, reinitializing");
                        cache.wipe(&mut state)?;
                    }
                }
            } else {
                cache.remove_orphan_blobs()?;
                cache.rebuild_journal(&mut state)?;
            }

            cache.trim_to_size(&mut state)?;
            state.sync_occupancy();
            info!(
                directory = %cache.inner.directory.display(),
                entries = state.stats.total_entries,
                size_bytes = state.size_bytes,
                capacity_bytes,
                "Disk cache opened"
            );
        }

        Ok(cache)
    }

    // == Get ==
    /// Returns a snapshot of the committed value for `key`, if any, and
    /// marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> StorageResult<Option<Snapshot>> {
        let mut state = self.lock();
        state.journal()?;

        let entry = state.entries.get(key).filter(|e| e.readable).cloned();
        let Some(entry) = entry else {
            state.stats.record_miss();
            return Ok(None);
        };

        // Open under the lock so a concurrent commit cannot swap files between slots.
        let mut files = Vec::with_capacity(self.inner.value_count);
        for slot in 0..self.inner.value_count {
            match File::open(clean_path(&self.inner.directory, key, slot)) {
                Ok(file) => files.push(file),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(key = %key, slot, "Blob missing from disk cache, dropping entry");
                    if !entry.editing {
                        self.remove_entry(&mut state, key)?;
                    }
                    state.stats.record_miss();
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        state.redundant_ops += 1;
        state.lru.touch(key);
        state.stats.record_hit();
        state.journal()?.append(&Record::Read {
            key: key.to_string(),
        })?;
        if self.needs_compaction(&state) {
            self.rebuild_journal(&mut state)?;
        }

        Ok(Some(Snapshot {
            key: key.clone(),
            sequence: entry.sequence,
            lengths: entry.lengths,
            files,
        }))
    }

    // == Edit ==
    /// Starts a write transaction for `key`.
    ///
    /// Returns `None` while another editor holds the same key.
    pub fn edit(&self, key: &CacheKey) -> StorageResult<Option<Editor>> {
        let mut state = self.lock();
        state.journal()?;

        if state.entries.get(key).is_some_and(|e| e.editing) {
            debug!(key = %key, "Edit already in progress");
            return Ok(None);
        }

        // Flushed right away so a crash during the write still finds the marker.
        let journal = state.journal()?;
        journal.append(&Record::Dirty {
            key: key.to_string(),
        })?;
        journal.flush()?;

        let value_count = self.inner.value_count;
        state
            .entries
            .entry(key.clone())
            .or_insert_with(|| DiskEntry::new(value_count))
            .editing = true;

        Ok(Some(Editor {
            cache: self.clone(),
            key: key.clone(),
            writers: (0..value_count).map(|_| None).collect(),
            finished: false,
        }))
    }

    // == Remove ==
    /// Drops the committed entry for `key`. Returns whether one existed.
    pub fn remove(&self, key: &CacheKey) -> StorageResult<bool> {
        let mut state = self.lock();
        state.journal()?;

        match state.entries.get(key) {
            Some(entry) if entry.editing => Err(StorageError::EditInProgress(key.to_string())),
            Some(_) => {
                self.remove_entry(&mut state, key)?;
                state.sync_occupancy();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // == Flush ==
    /// Trims to capacity and forces the journal to durable storage.
    pub fn flush(&self) -> StorageResult<()> {
        let mut state = self.lock();
        state.journal()?;
        self.trim_to_size(&mut state)?;
        state.sync_occupancy();
        state.journal()?.sync()?;
        debug!("Disk cache journal flushed");
        Ok(())
    }

    // == Close ==
    /// Flushes and closes the journal. Later operations fail with
    /// [`StorageError::Closed`]; open editors are discarded when finished.
    pub fn close(&self) -> StorageResult<()> {
        let mut state = self.lock();
        if let Some(mut journal) = state.journal.take() {
            journal.sync()?;
            info!(directory = %self.inner.directory.display(), "Disk cache closed");
        }
        Ok(())
    }

    // == Capacity ==
    /// Changes the capacity, evicting immediately if needed.
    pub fn set_capacity(&self, capacity_bytes: u64) -> StorageResult<()> {
        if capacity_bytes == 0 {
            return Err(StorageError::InvalidConfig(
                "capacity_bytes must be positive".to_string(),
            ));
        }
        let mut state = self.lock();
        state.journal()?;
        state.capacity_bytes = capacity_bytes;
        self.trim_to_size(&mut state)?;
        state.sync_occupancy();
        Ok(())
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.lock().capacity_bytes
    }

    /// Bytes used by committed entries.
    pub fn size_bytes(&self) -> u64 {
        self.lock().size_bytes
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.lock().entries.values().filter(|e| e.readable).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    pub fn value_count(&self) -> usize {
        self.inner.value_count
    }

    pub fn stats(&self) -> CacheStats {
        let mut state = self.lock();
        state.sync_occupancy();
        state.stats.clone()
    }

    // == Internals ==

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replay(&self, state: &mut State, records: Vec<Record>) -> StorageResult<()> {
        let value_count = self.inner.value_count;
        let record_count = records.len();

        for record in records {
            match record {
                Record::Dirty { key } => {
                    let key = CacheKey::parse(&key)?;
                    state
                        .entries
                        .entry(key)
                        .or_insert_with(|| DiskEntry::new(value_count))
                        .editing = true;
                }
                Record::Clean { key, lengths } => {
                    if lengths.len() != value_count {
                        return Err(StorageError::CorruptJournal(format!(
                            "clean record for {} has {} lengths",
                            key,
                            lengths.len()
                        )));
                    }
                    let key = CacheKey::parse(&key)?;
                    let sequence = state.next_sequence;
                    state.next_sequence += 1;
                    let entry = state
                        .entries
                        .entry(key.clone())
                        .or_insert_with(|| DiskEntry::new(value_count));
                    entry.lengths = lengths;
                    entry.readable = true;
                    entry.editing = false;
                    entry.sequence = sequence;
                    state.lru.touch(&key);
                }
                Record::Remove { key } => {
                    let key = CacheKey::parse(&key)?;
                    state.entries.remove(&key);
                    state.lru.remove(&key);
                }
                Record::Read { key } => {
                    let key = CacheKey::parse(&key)?;
                    if state.entries.get(&key).is_some_and(|e| e.readable) {
                        state.lru.touch(&key);
                    }
                }
            }
        }

        // Edits that never finished: drop temp files, keep prior committed data.
        let interrupted: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, e)| e.editing)
            .map(|(k, _)| k.clone())
            .collect();
        for key in interrupted {
            for slot in 0..value_count {
                remove_if_exists(&dirty_path(&self.inner.directory, &key, slot))?;
            }
            let keep = match state.entries.get_mut(&key) {
                Some(entry) if entry.readable => {
                    entry.editing = false;
                    // Commit may have renamed some slots before the crash.
                    self.remeasure(&key, entry)
                }
                _ => false,
            };
            if !keep {
                for slot in 0..value_count {
                    remove_if_exists(&clean_path(&self.inner.directory, &key, slot))?;
                }
                state.entries.remove(&key);
                state.lru.remove(&key);
            }
        }

        state.size_bytes = state.entries.values().map(DiskEntry::size_bytes).sum();
        state.redundant_ops = record_count.saturating_sub(state.entries.len());
        Ok(())
    }

    /// Refreshes slot lengths from the files. False if any slot is missing.
    fn remeasure(&self, key: &CacheKey, entry: &mut DiskEntry) -> bool {
        for (slot, length) in entry.lengths.iter_mut().enumerate() {
            match fs::metadata(clean_path(&self.inner.directory, key, slot)) {
                Ok(meta) => *length = meta.len(),
                Err(_) => return false,
            }
        }
        true
    }

    fn needs_compaction(&self, state: &State) -> bool {
        state.redundant_ops >= REDUNDANT_OP_COMPACT_THRESHOLD
            && state.redundant_ops >= state.entries.len()
    }

    /// Writes a compact journal reflecting the current index, replacing the
    /// live one through a backup so a crash never leaves no journal.
    fn rebuild_journal(&self, state: &mut State) -> StorageResult<()> {
        let directory = &self.inner.directory;
        let journal_path = directory.join(JOURNAL_FILE);
        let tmp_path = directory.join(JOURNAL_TMP_FILE);
        let backup_path = directory.join(JOURNAL_BACKUP_FILE);

        state.journal = None;

        {
            let header = JournalHeader::new(self.inner.app_version, self.inner.value_count);
            let mut tmp = JournalWriter::create(&tmp_path, &header)?;
            for key in state.lru.iter_oldest_first() {
                if let Some(entry) = state.entries.get(key).filter(|e| e.readable) {
                    tmp.append(&Record::Clean {
                        key: key.to_string(),
                        lengths: entry.lengths.clone(),
                    })?;
                }
            }
            for (key, entry) in &state.entries {
                if entry.editing {
                    tmp.append(&Record::Dirty {
                        key: key.to_string(),
                    })?;
                }
            }
            tmp.sync()?;
        }

        if journal_path.exists() {
            fs::rename(&journal_path, &backup_path)?;
        }
        fs::rename(&tmp_path, &journal_path)?;
        remove_if_exists(&backup_path)?;

        state.journal = Some(JournalWriter::open_append(&journal_path)?);
        state.redundant_ops = 0;
        debug!(entries = state.entries.len(), "Disk cache journal rebuilt");
        Ok(())
    }

    /// Deletes every file in the directory and starts an empty journal.
    fn wipe(&self, state: &mut State) -> StorageResult<()> {
        state.journal = None;
        fs::remove_dir_all(&self.inner.directory)?;
        fs::create_dir_all(&self.inner.directory)?;

        state.entries.clear();
        state.lru.clear();
        state.size_bytes = 0;
        state.redundant_ops = 0;
        self.rebuild_journal(state)
    }

    /// Deletes `<key>.<slot>` and `<key>.<slot>.tmp` files left without a
    /// journal to account for them. Other files are left alone.
    fn remove_orphan_blobs(&self) -> StorageResult<()> {
        let mut removed = 0usize;
        for dir_entry in fs::read_dir(&self.inner.directory)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_blob_file_name(name) {
                remove_if_exists(&dir_entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(removed, "Removed blob files not referenced by any journal");
        }
        Ok(())
    }

    fn remove_entry(&self, state: &mut State, key: &CacheKey) -> StorageResult<()> {
        let Some(entry) = state.entries.remove(key) else {
            return Ok(());
        };
        for slot in 0..self.inner.value_count {
            remove_if_exists(&clean_path(&self.inner.directory, key, slot))?;
        }
        state.lru.remove(key);
        if entry.readable {
            state.size_bytes -= entry.size_bytes();
        }
        state.redundant_ops += 1;
        state.journal()?.append(&Record::Remove {
            key: key.to_string(),
        })?;
        Ok(())
    }

    /// Evicts least recently used entries until size fits capacity.
    /// Entries with an open editor are skipped.
    fn trim_to_size(&self, state: &mut State) -> StorageResult<()> {
        while state.size_bytes > state.capacity_bytes {
            let victim = state
                .lru
                .iter_oldest_first()
                .find(|k| state.entries.get(*k).is_some_and(|e| !e.editing))
                .cloned();
            let Some(victim) = victim else {
                break;
            };
            self.remove_entry(state, &victim)?;
            state.stats.record_eviction();
            debug!(key = %victim, "Evicted from disk cache");
        }
        if state.journal.is_some() {
            state.journal()?.flush()?;
        }
        Ok(())
    }

    /// Finishes an edit. `written` lists which slots produced a temp file;
    /// `None` means abort.
    fn complete_edit(&self, key: &CacheKey, written: Option<&[bool]>) -> StorageResult<()> {
        let directory = &self.inner.directory;
        let mut state = self.lock();

        let Some(entry) = state.entries.get(key).cloned() else {
            return Ok(());
        };

        let closed = state.journal.is_none();
        let Some(slots) = written.filter(|_| !closed) else {
            return self.discard_edit(&mut state, key, &entry);
        };

        if !entry.readable {
            if let Some(slot) = slots.iter().position(|w| !w) {
                self.discard_edit(&mut state, key, &entry)?;
                return Err(StorageError::IncompleteEdit {
                    key: key.to_string(),
                    slot,
                });
            }
        }

        let mut lengths = entry.lengths.clone();
        let promoted = slots
            .iter()
            .enumerate()
            .filter(|(_, was_written)| **was_written)
            .try_for_each(|(slot, _)| -> io::Result<()> {
                let clean = clean_path(directory, key, slot);
                fs::rename(dirty_path(directory, key, slot), &clean)?;
                lengths[slot] = fs::metadata(&clean)?.len();
                Ok(())
            });
        if let Err(e) = promoted {
            self.discard_edit(&mut state, key, &entry)?;
            return Err(e.into());
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let old_size = if entry.readable { entry.size_bytes() } else { 0 };
        let new_size: u64 = lengths.iter().sum();
        state.size_bytes = state.size_bytes - old_size + new_size;
        state.redundant_ops += 1;
        state.entries.insert(
            key.clone(),
            DiskEntry {
                lengths: lengths.clone(),
                readable: true,
                editing: false,
                sequence,
            },
        );
        state.lru.touch(key);

        let journal = state.journal()?;
        journal.append(&Record::Clean {
            key: key.to_string(),
            lengths,
        })?;
        journal.flush()?;
        debug!(key = %key, size_bytes = new_size, sequence, "Disk cache entry committed");

        self.trim_to_size(&mut state)?;
        if self.needs_compaction(&state) {
            self.rebuild_journal(&mut state)?;
        }
        state.sync_occupancy();
        Ok(())
    }

    fn discard_edit(&self, state: &mut State, key: &CacheKey, entry: &DiskEntry) -> StorageResult<()> {
        for slot in 0..self.inner.value_count {
            remove_if_exists(&dirty_path(&self.inner.directory, key, slot))?;
        }
        if entry.readable {
            if let Some(live) = state.entries.get_mut(key) {
                live.editing = false;
            }
        } else {
            state.entries.remove(key);
        }
        state.redundant_ops += 1;
        debug!(key = %key, "Disk cache edit aborted");
        Ok(())
    }
}

// == Snapshot ==
/// Read handle over the committed blobs of one entry.
///
/// Files are opened when the snapshot is taken, so later commits or
/// evictions of the same key do not affect what it reads.
#[derive(Debug)]
pub struct Snapshot {
    key: CacheKey,
    sequence: u64,
    lengths: Vec<u64>,
    files: Vec<File>,
}

impl Snapshot {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Commit sequence number of the entry this snapshot reads.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Committed length of a value slot.
    pub fn length(&self, slot: usize) -> Option<u64> {
        self.lengths.get(slot).copied()
    }

    /// Reader over a value slot.
    pub fn reader(&mut self, slot: usize) -> StorageResult<&mut File> {
        let count = self.files.len();
        self.files
            .get_mut(slot)
            .ok_or(StorageError::SlotOutOfRange { slot, count })
    }

    /// Reads a whole value slot into memory.
    pub fn read_slot(&mut self, slot: usize) -> StorageResult<Vec<u8>> {
        let capacity = self.length(slot).unwrap_or(0) as usize;
        let mut buf = Vec::with_capacity(capacity);
        self.reader(slot)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

// == Editor ==
/// Write transaction for a single key.
///
/// Dropping an editor without calling [`Editor::commit`] aborts it.
#[derive(Debug)]
pub struct Editor {
    cache: DiskCache,
    key: CacheKey,
    writers: Vec<Option<BlobWriter>>,
    finished: bool,
}

impl Editor {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Output stream for a value slot, created on first use.
    pub fn output(&mut self, slot: usize) -> StorageResult<&mut BlobWriter> {
        let count = self.writers.len();
        let directory = self.cache.directory().to_path_buf();
        let writer = self
            .writers
            .get_mut(slot)
            .ok_or(StorageError::SlotOutOfRange { slot, count })?;

        if writer.is_none() {
            let file = File::create(dirty_path(&directory, &self.key, slot))?;
            *writer = Some(BufWriter::new(file));
        }
        writer
            .as_mut()
            .ok_or(StorageError::SlotOutOfRange { slot, count })
    }

    /// Makes the written slots durable and visible, then evicts if the
    /// store is over capacity.
    pub fn commit(mut self) -> StorageResult<()> {
        self.finished = true;
        let mut written = Vec::with_capacity(self.writers.len());
        for writer in self.writers.iter_mut() {
            match writer.take() {
                Some(mut w) => {
                    let synced = w.flush().and_then(|_| w.get_ref().sync_all());
                    if let Err(e) = synced {
                        let _ = self.cache.complete_edit(&self.key, None);
                        return Err(e.into());
                    }
                    written.push(true);
                }
                None => written.push(false),
            }
        }
        self.cache.complete_edit(&self.key, Some(&written))
    }

    /// Discards everything written and releases the key.
    pub fn abort(mut self) -> StorageResult<()> {
        self.finished = true;
        self.writers.clear();
        self.cache.complete_edit(&self.key, None)
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        if !self.finished {
            self.writers.clear();
            if let Err(e) = self.cache.complete_edit(&self.key, None) {
                warn!(key = %self.key, error = %e, "Failed to abort dropped editor");
            }
        }
    }
}
