//! Shared fixtures for integration tests: a scripted in-memory transport
//! and a decoder whose assets are the raw bytes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use photo_cache::error::FetchError;
use photo_cache::fetch::{ByteStream, ChannelSink, Decoder, Sink, Transport};

// == Gate ==
/// Holds transport responses back until opened.
#[derive(Debug)]
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn closed() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

// == Scripted Transport ==
/// Serves registered bodies, fails everything else, and counts calls.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose responses wait for `gate`.
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn serve(self, identifier: &str, body: &[u8]) -> Self {
        self.bodies
            .lock()
            .unwrap()
            .insert(identifier.to_string(), body.to_vec());
        self
    }

    pub fn calls(&self, identifier: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, identifier: &str) -> Result<Box<dyn ByteStream>, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(identifier.to_string())
            .or_insert(0) += 1;

        if let Some(gate) = &self.gate {
            gate.wait().await;
        }

        let body = self.bodies.lock().unwrap().get(identifier).cloned();
        match body {
            Some(body) => Ok(Box::new(ChunkedBody::new(body))),
            None => Err(FetchError::Transport(format!("404 Not Found: {}", identifier))),
        }
    }
}

/// Body delivered in two chunks to exercise streaming.
struct ChunkedBody {
    chunks: Vec<Bytes>,
}

impl ChunkedBody {
    fn new(body: Vec<u8>) -> Self {
        let body = Bytes::from(body);
        let mid = body.len() / 2;
        // Popped from the back
        Self {
            chunks: vec![body.slice(mid..), body.slice(..mid)],
        }
    }
}

#[async_trait]
impl ByteStream for ChunkedBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        Ok(self.chunks.pop())
    }
}

// == Bytes Decoder ==
/// Decodes to the bytes themselves, truncated to the target size. Bodies
/// starting with `corrupt` fail to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder;

impl Decoder for BytesDecoder {
    type Asset = Vec<u8>;

    fn decode(&self, bytes: &[u8], target_size: Option<u32>) -> Result<Vec<u8>, FetchError> {
        if bytes.starts_with(b"corrupt") {
            return Err(FetchError::Decode("unsupported data".to_string()));
        }
        let len = target_size.map_or(bytes.len(), |t| bytes.len().min(t as usize));
        Ok(bytes[..len].to_vec())
    }

    fn size_of(&self, asset: &Vec<u8>) -> usize {
        asset.len()
    }
}

// == Held Decoder ==
/// Lets a test pause a task inside decode, after the disk commit.
#[derive(Debug, Default)]
pub struct Hold {
    entered: AtomicBool,
    released: Mutex<bool>,
    cond: Condvar,
}

impl Hold {
    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        self.entered.store(true, Ordering::SeqCst);
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.cond.wait(released).unwrap();
        }
    }
}

/// [`BytesDecoder`] that blocks in `decode` until its [`Hold`] is released.
#[derive(Debug)]
pub struct HeldDecoder {
    hold: Arc<Hold>,
}

impl HeldDecoder {
    pub fn new() -> (Self, Arc<Hold>) {
        let hold = Arc::new(Hold::default());
        (
            Self {
                hold: Arc::clone(&hold),
            },
            hold,
        )
    }
}

impl Decoder for HeldDecoder {
    type Asset = Vec<u8>;

    fn decode(&self, bytes: &[u8], target_size: Option<u32>) -> Result<Vec<u8>, FetchError> {
        self.hold.wait();
        BytesDecoder.decode(bytes, target_size)
    }

    fn size_of(&self, asset: &Vec<u8>) -> usize {
        asset.len()
    }
}

// == Helper Functions ==

/// Channel-backed sink for byte assets.
pub fn channel_sink() -> (Arc<dyn Sink<Vec<u8>>>, mpsc::UnboundedReceiver<Arc<Vec<u8>>>) {
    let (sink, rx) = ChannelSink::new();
    (Arc::new(sink), rx)
}

/// Next delivery, or `None` if nothing arrives within `ms` milliseconds.
pub async fn recv_within(
    rx: &mut mpsc::UnboundedReceiver<Arc<Vec<u8>>>,
    ms: u64,
) -> Option<Arc<Vec<u8>>> {
    tokio::time::timeout(Duration::from_millis(ms), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Polls until `done` holds, panicking after two seconds.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}
