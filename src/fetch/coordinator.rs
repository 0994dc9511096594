//! Fetch Coordinator Module
//!
//! Deduplicates concurrent requests per key and runs the read-through /
//! write-through sequence: disk, then network streamed into a disk edit,
//! then decode, memory insert and delivery.
//!
//! At most one task per key is in flight. Later requesters attach to it as
//! waiters. Delivery checks each waiter's ticket against the sink bindings
//! at the moment the asset is ready, never at registration time.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, MemoryCache};
use crate::disk::{DiskCache, Editor, IMAGE_SLOT};
use crate::error::{FetchError, StorageError};
use crate::fetch::decoder::Decoder;
use crate::fetch::sink::{Sink, SinkBindings, Ticket};
use crate::fetch::transport::{ByteStream, Transport};

/// Attempts to open a disk edit held by another writer before giving up.
const EDIT_ATTEMPTS: u32 = 20;

/// Pause between edit attempts.
const EDIT_RETRY_DELAY: Duration = Duration::from_millis(25);

// == Registration ==
/// What a request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Asset was already in memory and has been delivered.
    Delivered,
    /// A new fetch task was started for the key.
    Spawned,
    /// The sink joined a task already in flight.
    Attached,
}

// == Fetch Stats ==
/// Counters describing coordinator activity.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct FetchStats {
    pub spawned: u64,
    pub attached: u64,
    pub network_fetches: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub in_flight: usize,
}

#[derive(Debug, Default)]
struct FetchCounters {
    spawned: AtomicU64,
    attached: AtomicU64,
    network_fetches: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct Waiter<A> {
    sink: Arc<dyn Sink<A>>,
    ticket: Ticket,
}

impl<A> Waiter<A> {
    /// Ends this waiter's request: single-use sinks lose their binding.
    fn settle(&self, bindings: &SinkBindings) {
        if self.sink.is_single_use() {
            bindings.release_ticket(&self.ticket);
        }
    }
}

struct FetchTask<A> {
    id: u64,
    identifier: String,
    waiters: Vec<Waiter<A>>,
    cancel: CancellationToken,
}

struct Shared<D: Decoder> {
    memory: Arc<Mutex<MemoryCache<D::Asset>>>,
    disk: Option<DiskCache>,
    transport: Arc<dyn Transport>,
    decoder: Arc<D>,
    bindings: Arc<SinkBindings>,
    tasks: Mutex<HashMap<CacheKey, FetchTask<D::Asset>>>,
    workers: Arc<Semaphore>,
    target_size: AtomicU32,
    next_task_id: AtomicU64,
    counters: FetchCounters,
    runtime: Handle,
}

// == Fetch Coordinator ==
/// Owns the in-flight task table. Cheap to clone.
pub struct FetchCoordinator<D: Decoder> {
    shared: Arc<Shared<D>>,
}

impl<D: Decoder> Clone for FetchCoordinator<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: Decoder> FetchCoordinator<D> {
    // == Constructor ==
    /// Creates a coordinator running at most `max_concurrent_fetches` tasks
    /// at a time on `runtime`. `disk: None` runs in memory-only mode.
    pub fn new(
        memory: Arc<Mutex<MemoryCache<D::Asset>>>,
        disk: Option<DiskCache>,
        transport: Arc<dyn Transport>,
        decoder: Arc<D>,
        max_concurrent_fetches: usize,
        runtime: Handle,
    ) -> Self {
        let shared = Shared {
            memory,
            disk,
            transport,
            decoder,
            bindings: Arc::new(SinkBindings::new()),
            tasks: Mutex::new(HashMap::new()),
            workers: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            target_size: AtomicU32::new(0),
            next_task_id: AtomicU64::new(1),
            counters: FetchCounters::default(),
            runtime,
        };

        Self {
            shared: Arc::new(shared),
        }
    }

    // == Request ==
    /// Binds `sink` to `identifier` and registers it for the asset of `key`.
    /// Returns immediately; delivery happens on the runtime.
    pub fn request(
        &self,
        key: CacheKey,
        identifier: &str,
        sink: Arc<dyn Sink<D::Asset>>,
    ) -> Registration {
        let ticket = self.shared.bindings.bind(sink.id(), identifier);
        self.register(key, identifier, sink, ticket)
    }

    /// Registers an already-bound sink.
    pub(crate) fn register(
        &self,
        key: CacheKey,
        identifier: &str,
        sink: Arc<dyn Sink<D::Asset>>,
        ticket: Ticket,
    ) -> Registration {
        let shared = &self.shared;
        let mut tasks = shared.lock_tasks();

        if let Some(task) = tasks.get_mut(&key) {
            if task.identifier != identifier {
                warn!(key = %key, "Key shared by two identifiers, serving the in-flight one");
            }
            task.waiters.push(Waiter { sink, ticket });
            bump(&shared.counters.attached);
            debug!(key = %key, waiters = task.waiters.len(), "Attached to in-flight fetch");
            return Registration::Attached;
        }

        // A task may have finished between the caller's memory check and
        // taking the task lock.
        let cached = {
            let mut memory = shared.lock_memory();
            if memory.contains(&key) {
                memory.get(&key)
            } else {
                None
            }
        };
        if let Some(asset) = cached {
            drop(tasks);
            let waiter = Waiter { sink, ticket };
            waiter.settle(&shared.bindings);
            waiter.sink.deliver(asset);
            return Registration::Delivered;
        }

        let id = shared.next_task_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        tasks.insert(
            key.clone(),
            FetchTask {
                id,
                identifier: identifier.to_string(),
                waiters: vec![Waiter { sink, ticket }],
                cancel: cancel.clone(),
            },
        );
        drop(tasks);

        bump(&shared.counters.spawned);
        debug!(key = %key, task = id, "Spawned fetch task");
        shared.runtime.spawn(Arc::clone(shared).run(
            key,
            identifier.to_string(),
            id,
            cancel,
        ));
        Registration::Spawned
    }

    // == Cancel All ==
    /// Cancels every in-flight task and forgets its waiters. Non-blocking:
    /// running network and disk operations stop at their next check.
    /// Returns the number of tasks cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<FetchTask<D::Asset>> = {
            let mut tasks = self.shared.lock_tasks();
            tasks.drain().map(|(_, task)| task).collect()
        };

        for task in &drained {
            task.cancel.cancel();
            for waiter in &task.waiters {
                waiter.settle(&self.shared.bindings);
            }
        }
        if !drained.is_empty() {
            info!(tasks = drained.len(), "Cancelled in-flight fetches");
        }
        drained.len()
    }

    // == Accessors ==
    pub fn in_flight(&self) -> usize {
        self.shared.lock_tasks().len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.shared.lock_tasks().contains_key(key)
    }

    pub fn bindings(&self) -> &Arc<SinkBindings> {
        &self.shared.bindings
    }

    pub fn is_disk_backed(&self) -> bool {
        self.shared.disk.is_some()
    }

    /// Side of the square assets are decoded to. `0` keeps natural size.
    pub fn set_target_size(&self, side: u32) {
        self.shared.target_size.store(side, Ordering::Relaxed);
    }

    pub fn target_size(&self) -> Option<u32> {
        self.shared.target_size()
    }

    pub fn stats(&self) -> FetchStats {
        let c = &self.shared.counters;
        FetchStats {
            spawned: c.spawned.load(Ordering::Relaxed),
            attached: c.attached.load(Ordering::Relaxed),
            network_fetches: c.network_fetches.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}

impl<D: Decoder> Shared<D> {
    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<CacheKey, FetchTask<D::Asset>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_memory(&self) -> MutexGuard<'_, MemoryCache<D::Asset>> {
        self.memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn target_size(&self) -> Option<u32> {
        match self.target_size.load(Ordering::Relaxed) {
            0 => None,
            side => Some(side),
        }
    }

    // == Task Body ==
    async fn run(self: Arc<Self>, key: CacheKey, identifier: String, id: u64, cancel: CancellationToken) {
        let result = self
            .load(&key, &identifier, &cancel)
            .await
            .and_then(|asset| {
                if cancel.is_cancelled() {
                    Err(FetchError::Cancelled)
                } else {
                    Ok(asset)
                }
            });

        match result {
            Ok(asset) => {
                self.lock_memory().put(key.clone(), Arc::clone(&asset));
                let waiters = self.finish(&key, id);

                let mut delivered = 0;
                for waiter in waiters {
                    let current = self.bindings.is_current(&waiter.ticket);
                    waiter.settle(&self.bindings);
                    if current {
                        waiter.sink.deliver(Arc::clone(&asset));
                        delivered += 1;
                    } else {
                        debug!(key = %key, sink = ?waiter.ticket.sink(), "Skipping rebound sink");
                    }
                }
                bump(&self.counters.completed);
                debug!(key = %key, delivered, "Fetch completed");
            }
            Err(FetchError::Cancelled) => {
                self.abandon(&key, id);
                bump(&self.counters.cancelled);
                debug!(key = %key, "Fetch cancelled");
            }
            Err(e) => {
                self.abandon(&key, id);
                bump(&self.counters.failed);
                warn!(key = %key, identifier = %identifier, error = %e, "Fetch failed");
            }
        }
    }

    /// Removes the task if it is still the registered one for `key` and
    /// hands back its waiters.
    fn finish(&self, key: &CacheKey, id: u64) -> Vec<Waiter<D::Asset>> {
        let mut tasks = self.lock_tasks();
        match tasks.get(key) {
            Some(task) if task.id == id => tasks
                .remove(key)
                .map(|task| task.waiters)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Finishes a task that produced nothing; its waiters get no delivery.
    fn abandon(&self, key: &CacheKey, id: u64) {
        for waiter in self.finish(key, id) {
            waiter.settle(&self.bindings);
        }
    }

    async fn load(
        &self,
        key: &CacheKey,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<D::Asset>, FetchError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            permit = Arc::clone(&self.workers).acquire_owned() => {
                permit.map_err(|e| FetchError::Worker(e.to_string()))?
            }
        };

        let bytes = match &self.disk {
            Some(disk) => self.load_through_disk(disk, key, identifier, cancel).await?,
            None => self.download(identifier, cancel).await?,
        };

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let decoder = Arc::clone(&self.decoder);
        let target = self.target_size();
        let asset = blocking(move || decoder.decode(&bytes, target)).await?;
        Ok(Arc::new(asset))
    }

    // == Disk Path ==
    async fn load_through_disk(
        &self,
        disk: &DiskCache,
        key: &CacheKey,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        if let Some(bytes) = read_disk(disk, key).await? {
            debug!(key = %key, "Disk cache hit");
            return Ok(bytes);
        }

        for attempt in 0..EDIT_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let (d, k) = (disk.clone(), key.clone());
            if let Some(editor) = blocking(move || Ok(d.edit(&k)?)).await? {
                return self.write_through(disk, editor, identifier, cancel).await;
            }

            debug!(key = %key, attempt, "Disk edit held elsewhere, waiting");
            tokio::time::sleep(EDIT_RETRY_DELAY).await;
            if let Some(bytes) = read_disk(disk, key).await? {
                return Ok(bytes);
            }
        }

        Err(StorageError::EditInProgress(key.to_string()).into())
    }

    /// Streams the network body into `editor`, commits, then reads the
    /// entry back through the same path as a disk hit.
    async fn write_through(
        &self,
        disk: &DiskCache,
        mut editor: Editor,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        let key = editor.key().clone();

        let streamed = match self.stream_into(&mut editor, identifier, cancel).await {
            Ok(()) if cancel.is_cancelled() => Err(FetchError::Cancelled),
            other => other,
        };
        if let Err(e) = streamed {
            if let Err(abort_err) = blocking(move || Ok(editor.abort()?)).await {
                warn!(key = %key, error = %abort_err, "Failed to abort disk edit");
            }
            return Err(e);
        }

        blocking(move || Ok(editor.commit()?)).await?;

        read_disk(disk, &key).await?.ok_or_else(|| {
            StorageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("entry {} evicted right after commit", key),
            ))
            .into()
        })
    }

    async fn stream_into(
        &self,
        editor: &mut Editor,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let mut stream = self.open_stream(identifier, cancel).await?;
        let out = editor.output(IMAGE_SLOT)?;

        while let Some(chunk) = next_chunk(&mut *stream, cancel).await? {
            out.write_all(&chunk).map_err(StorageError::from)?;
        }
        Ok(())
    }

    // == Network Path ==
    async fn open_stream(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ByteStream>, FetchError> {
        bump(&self.counters.network_fetches);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            stream = self.transport.open(identifier) => stream,
        }
    }

    /// Memory-only mode: collects the body without touching disk.
    async fn download(&self, identifier: &str, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
        let mut stream = self.open_stream(identifier, cancel).await?;
        let mut body = Vec::new();
        while let Some(chunk) = next_chunk(&mut *stream, cancel).await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

// == Helpers ==
async fn next_chunk(
    stream: &mut dyn ByteStream,
    cancel: &CancellationToken,
) -> Result<Option<Bytes>, FetchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        chunk = stream.next_chunk() => chunk,
    }
}

async fn read_disk(disk: &DiskCache, key: &CacheKey) -> Result<Option<Vec<u8>>, FetchError> {
    let (disk, key) = (disk.clone(), key.clone());
    blocking(move || match disk.get(&key)? {
        Some(mut snapshot) => Ok(Some(snapshot.read_slot(IMAGE_SLOT)?)),
        None => Ok(None),
    })
    .await
}

/// Runs filesystem or decode work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, FetchError>
where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Worker(e.to_string()))?
}
