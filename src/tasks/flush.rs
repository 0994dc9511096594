//! Journal Flush Task
//!
//! Background task that periodically checkpoints the disk cache journal so
//! committed entries survive an abrupt exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::facade::PhotoCache;
use crate::fetch::Decoder;

/// Spawns a background task that flushes the cache every
/// `flush_interval_secs` seconds.
///
/// Flushing touches the filesystem, so each run happens on the blocking
/// pool. Failures are logged and retried on the next tick.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(PhotoCache::open(&config, transport, ImageDecoder)?);
/// let flush_handle = spawn_flush_task(cache.clone(), 30);
/// // Later, during shutdown:
/// flush_handle.abort();
/// ```
pub fn spawn_flush_task<D: Decoder>(
    cache: Arc<PhotoCache<D>>,
    flush_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(flush_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting journal flush task with interval of {} seconds",
            flush_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            if !cache.is_disk_backed() {
                continue;
            }

            let cache = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || cache.flush()).await {
                Ok(Ok(())) => debug!("Journal flush completed"),
                Ok(Err(e)) => warn!(error = %e, "Journal flush failed"),
                Err(e) => warn!(error = %e, "Journal flush worker failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::FetchError;
    use crate::fetch::{ByteStream, Transport};
    use async_trait::async_trait;

    struct NoNetwork;

    #[async_trait]
    impl Transport for NoNetwork {
        async fn open(&self, identifier: &str) -> Result<Box<dyn ByteStream>, FetchError> {
            Err(FetchError::Transport(format!("offline: {}", identifier)))
        }
    }

    struct RawBytes;

    impl Decoder for RawBytes {
        type Asset = Vec<u8>;

        fn decode(&self, bytes: &[u8], _target: Option<u32>) -> Result<Vec<u8>, FetchError> {
            Ok(bytes.to_vec())
        }

        fn size_of(&self, asset: &Vec<u8>) -> usize {
            asset.len()
        }
    }

    fn open_cache(dir: &std::path::Path) -> Arc<PhotoCache<RawBytes>> {
        let config = Config {
            cache_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Arc::new(PhotoCache::open(&config, Arc::new(NoNetwork), RawBytes).unwrap())
    }

    #[tokio::test]
    async fn test_flush_task_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(dir.path());

        let handle = spawn_flush_task(cache, 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(!handle.is_finished(), "Flush task should keep running");
        handle.abort();
    }

    #[tokio::test]
    async fn test_flush_task_can_be_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(dir.path());

        let handle = spawn_flush_task(cache, 1);

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
