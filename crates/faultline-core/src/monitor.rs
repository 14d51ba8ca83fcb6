//! Background response monitoring.
//!
//! Target output can arrive well after a trigger fires (USB/UART latency),
//! so a drain task polls the [`ResponseSource`] at a fixed interval into a
//! shared byte buffer, decoupled from the trigger cadence. The campaign
//! loop clears the buffer right before firing and reads it after the
//! settle interval; bytes are kept raw so a multi-byte sequence split
//! across polls is never torn — decoding happens on the full read.

use crate::hw::ResponseSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

const DRAIN_CHUNK_BYTES: usize = 4096;

/// Shared append/read-and-clear buffer between the drain task (writer) and
/// the campaign loop (reader).
#[derive(Debug, Clone, Default)]
pub struct MonitorBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl MonitorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(data);
    }

    /// Read everything and clear.
    pub fn take(&self) -> Vec<u8> {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    /// Read everything, leaving the buffer intact.
    pub fn snapshot(&self) -> Vec<u8> {
        let buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buf.clone()
    }

    pub fn clear(&self) {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buf.clear();
    }

    pub fn len(&self) -> usize {
        let buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to the running drain task. Dropping without [`stop`] aborts the
/// task on the next poll.
pub struct ResponseMonitor {
    buffer: MonitorBuffer,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ResponseMonitor {
    /// Spawn the drain loop. Read errors are swallowed: a monitor hiccup
    /// must not kill the campaign, and a missed poll just delays data to
    /// the next one.
    pub fn start(source: Arc<dyn ResponseSource>, poll_interval: Duration) -> Self {
        let buffer = MonitorBuffer::new();
        let running = Arc::new(AtomicBool::new(true));

        let task_buffer = buffer.clone();
        let task_running = running.clone();
        let handle = tokio::spawn(async move {
            while task_running.load(Ordering::Relaxed) {
                match source.read(DRAIN_CHUNK_BYTES, poll_interval).await {
                    Ok(data) => task_buffer.append(&data),
                    Err(e) => {
                        tracing::debug!(error = %e, "monitor poll failed");
                    }
                }
                tokio::time::sleep(poll_interval).await;
            }
        });

        Self {
            buffer,
            running,
            handle,
        }
    }

    pub fn buffer(&self) -> MonitorBuffer {
        self.buffer.clone()
    }

    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedSource {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ResponseSource for ScriptedSource {
        async fn read(&self, _max: usize, _timeout: Duration) -> anyhow::Result<Vec<u8>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(b"boot ".to_vec())
            } else if n == 1 {
                Ok(b"ok".to_vec())
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn drain_task_accumulates_across_polls() {
        let source = Arc::new(ScriptedSource {
            reads: AtomicUsize::new(0),
        });
        let monitor = ResponseMonitor::start(source, Duration::from_millis(5));
        let buffer = monitor.buffer();

        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.stop().await;

        assert_eq!(buffer.take(), b"boot ok");
        assert!(buffer.is_empty());
    }

    #[test]
    fn take_clears_snapshot_does_not() {
        let buffer = MonitorBuffer::new();
        buffer.append(b"abc");
        assert_eq!(buffer.snapshot(), b"abc");
        assert_eq!(buffer.snapshot(), b"abc");
        assert_eq!(buffer.take(), b"abc");
        assert!(buffer.is_empty());
    }
}
