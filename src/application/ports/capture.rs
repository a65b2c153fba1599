//! Audio capture port and the bounded frame hand-off queue

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

/// One captured chunk of mono PCM16 samples at the session sample rate
pub type Frame = Vec<i16>;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No audio input device available")]
    NoDevice,

    #[error("Failed to start capture: {0}")]
    StartFailed(String),

    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
}

struct QueueInner {
    frames: Mutex<VecDeque<Frame>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
    senders: AtomicUsize,
}

/// Producer half of the frame queue.
///
/// `push` runs a short, bounded critical section and never blocks, so it
/// is safe to call from the audio driver's callback thread. When the
/// queue is full the oldest frame is discarded and counted; consumers
/// surface the count instead of stalling capture.
pub struct FrameSender {
    inner: Arc<QueueInner>,
}

impl Clone for FrameSender {
    fn clone(&self) -> Self {
        self.inner.senders.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Consumer half of the frame queue
pub struct FrameReceiver {
    inner: Arc<QueueInner>,
}

/// Create a bounded frame queue with the given capacity
pub fn frame_queue(capacity: usize) -> (FrameSender, FrameReceiver) {
    let inner = Arc::new(QueueInner {
        frames: Mutex::new(VecDeque::with_capacity(capacity)),
        notify: Notify::new(),
        capacity,
        dropped: AtomicU64::new(0),
        closed: AtomicBool::new(false),
        senders: AtomicUsize::new(1),
    });

    (
        FrameSender {
            inner: Arc::clone(&inner),
        },
        FrameReceiver { inner },
    )
}

impl FrameSender {
    /// Enqueue a frame, discarding the oldest one when full
    pub fn push(&self, frame: Frame) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut frames = self.inner.frames.lock().unwrap_or_else(|e| e.into_inner());
            if frames.len() >= self.inner.capacity {
                frames.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            frames.push_back(frame);
        }

        self.inner.notify.notify_one();
    }

    /// Signal end-of-audio; the receiver drains what is queued and then
    /// observes the close
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// How many frames were discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for FrameSender {
    fn drop(&mut self) {
        // The last producer closing wakes any pending receiver
        if self.inner.senders.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.close();
        }
    }
}

impl FrameReceiver {
    /// Receive the next frame, or `None` after close once the queue is drained
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.try_recv() {
                return Some(frame);
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                // Re-check: a frame may have been pushed just before close
                return self.try_recv();
            }

            let notified = self.inner.notify.notified();
            if !self.is_empty() || self.inner.closed.load(Ordering::SeqCst) {
                continue;
            }
            notified.await;
        }
    }

    /// Take a frame if one is queued, without waiting
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inner
            .frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Whether the queue currently holds no frames
    pub fn is_empty(&self) -> bool {
        self.inner
            .frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// How many frames were discarded on the producer side
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to a running capture stream; stopping is idempotent
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
}

impl CaptureHandle {
    /// Create a handle around a shared stop flag
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self { stop }
    }

    /// Ask the capture thread to stop and release the device
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Port for audio capture sources.
///
/// Implementations deliver fixed-format mono PCM16 frames at the session
/// sample rate into the provided sink until the returned handle is
/// stopped. The delivery callback must not block.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing into `sink`.
    ///
    /// Returns once frames are flowing, or with an error when the device
    /// cannot be acquired.
    async fn start(&self, sink: FrameSender) -> Result<CaptureHandle, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (tx, mut rx) = frame_queue(8);
        tx.push(vec![1]);
        tx.push(vec![2]);
        tx.push(vec![3]);

        assert_eq!(rx.recv().await, Some(vec![1]));
        assert_eq!(rx.recv().await, Some(vec![2]));
        assert_eq!(rx.recv().await, Some(vec![3]));
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let (tx, mut rx) = frame_queue(2);
        tx.push(vec![1]);
        tx.push(vec![2]);
        tx.push(vec![3]);

        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.recv().await, Some(vec![2]));
        assert_eq!(rx.recv().await, Some(vec![3]));
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let (tx, mut rx) = frame_queue(4);
        tx.push(vec![1]);
        tx.close();

        assert_eq!(rx.recv().await, Some(vec![1]));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn recv_wakes_on_push() {
        let (tx, mut rx) = frame_queue(4);

        let handle = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        tx.push(vec![42]);

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("receiver should wake")
            .unwrap();
        assert_eq!(received, Some(vec![42]));
    }

    #[tokio::test]
    async fn sender_drop_closes_queue() {
        let (tx, mut rx) = frame_queue(4);
        tx.push(vec![7]);
        drop(tx);

        assert_eq!(rx.recv().await, Some(vec![7]));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn push_after_close_is_ignored() {
        let (tx, mut rx) = frame_queue(4);
        tx.close();
        tx.push(vec![1]);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn capture_handle_stop_is_idempotent() {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = CaptureHandle::new(Arc::clone(&flag));
        handle.stop();
        handle.stop();
        assert!(flag.load(Ordering::SeqCst));
    }
}
