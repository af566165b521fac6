// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

pub use tokio_util::sync::CancellationToken;

/// Default bound on the channel iterator's in-flight buffer.
pub const DEFAULT_BUFFER: usize = 1000;

// ---------------------------------------------------------------------------
// StreamError
// ---------------------------------------------------------------------------

/// Sticky terminal state of a record stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The stream was cancelled before reaching end-of-stream.
    #[error("stream cancelled")]
    Cancelled,
    /// The producer hit an unrecoverable failure.
    #[error("{message}")]
    Terminal {
        /// Human-readable failure description.
        message: String,
    },
}

impl StreamError {
    /// Build a terminal error from any displayable message.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    /// Whether this error denotes cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// RecordIter
// ---------------------------------------------------------------------------

/// A pull-style stream of typed values.
///
/// The iterator is single-consumer: concurrent `advance` calls are prevented
/// by `&mut self`. Cancellation from another task goes through the shared
/// [`CancellationToken`] rather than through `close`.
#[async_trait]
pub trait RecordIter<T>: Send
where
    T: Send,
{
    /// Move to the next element. Returns `false` at end of stream or once a
    /// terminal error has been recorded.
    async fn advance(&mut self) -> bool;

    /// The element made current by the most recent successful advance.
    ///
    /// Before the first advance (and after exhaustion) this is the type's
    /// zero value.
    fn current(&self) -> &T;

    /// The sticky terminal error, or `None` after a clean end-of-stream.
    fn error(&self) -> Option<&StreamError>;

    /// Release resources. Idempotent; also cancels a pending producer.
    async fn close(&mut self) -> Result<(), StreamError>;
}

// ---------------------------------------------------------------------------
// SliceIter
// ---------------------------------------------------------------------------

/// A finite, slice-backed iterator. Cheap and infallible.
#[derive(Debug)]
pub struct SliceIter<T> {
    items: Vec<T>,
    pos: usize,
    started: bool,
    closed: bool,
    zero: T,
}

impl<T: Default> SliceIter<T> {
    /// Wrap a vector of items.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            pos: 0,
            started: false,
            closed: false,
            zero: T::default(),
        }
    }
}

#[async_trait]
impl<T> RecordIter<T> for SliceIter<T>
where
    T: Default + Send + Sync,
{
    async fn advance(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.started {
            self.pos += 1;
        } else {
            self.started = true;
        }
        self.pos < self.items.len()
    }

    fn current(&self) -> &T {
        if self.started && self.pos < self.items.len() {
            &self.items[self.pos]
        } else {
            &self.zero
        }
    }

    fn error(&self) -> Option<&StreamError> {
        None
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelIter
// ---------------------------------------------------------------------------

enum Frame<T> {
    Item(T),
    Fail(StreamError),
}

/// Producer handle feeding a [`ChannelIter`].
///
/// Sends apply backpressure once the bounded buffer fills. The first
/// [`fail`](RecordSender::fail) wins; subsequent errors are discarded.
pub struct RecordSender<T> {
    tx: mpsc::Sender<Frame<T>>,
    cancel: CancellationToken,
    failed: Arc<AtomicBool>,
}

impl<T: Send> RecordSender<T> {
    /// Enqueue one item.
    ///
    /// Returns `false` when the consumer is gone or the stream has been
    /// cancelled; producers should stop at that point.
    pub async fn send(&self, item: T) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(Frame::Item(item)) => sent.is_ok(),
        }
    }

    /// Record the stream's single terminal error.
    ///
    /// Only the first call has any effect; later errors are discarded and
    /// `false` is returned.
    pub async fn fail(&self, error: StreamError) -> bool {
        if self.failed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.tx.send(Frame::Fail(error)).await.is_ok()
    }

    /// The cancellation token shared with the consumer.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<T> Clone for RecordSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            failed: Arc::clone(&self.failed),
        }
    }
}

/// A channel-backed iterator with a fixed buffer.
///
/// Elements emerge in producer-enqueue order. After cancellation,
/// [`advance`](RecordIter::advance) returns `false` and
/// [`error`](RecordIter::error) reports [`StreamError::Cancelled`].
pub struct ChannelIter<T> {
    rx: mpsc::Receiver<Frame<T>>,
    cancel: CancellationToken,
    current: T,
    error: Option<StreamError>,
    done: bool,
}

/// Create a bounded channel stream with its own cancellation token.
#[must_use]
pub fn channel<T: Default + Send>(buffer: usize) -> (RecordSender<T>, ChannelIter<T>) {
    channel_with_cancel(buffer, CancellationToken::new())
}

/// Create a bounded channel stream sharing an existing cancellation token.
#[must_use]
pub fn channel_with_cancel<T: Default + Send>(
    buffer: usize,
    cancel: CancellationToken,
) -> (RecordSender<T>, ChannelIter<T>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let sender = RecordSender {
        tx,
        cancel: cancel.clone(),
        failed: Arc::new(AtomicBool::new(false)),
    };
    let iter = ChannelIter {
        rx,
        cancel,
        current: T::default(),
        error: None,
        done: false,
    };
    (sender, iter)
}

impl<T> ChannelIter<T> {
    /// The cancellation token shared with the producer.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl<T> RecordIter<T> for ChannelIter<T>
where
    T: Default + Send + Sync,
{
    async fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        if self.cancel.is_cancelled() {
            self.error = Some(StreamError::Cancelled);
            self.done = true;
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.error = Some(StreamError::Cancelled);
                self.done = true;
                false
            }
            frame = self.rx.recv() => match frame {
                None => {
                    // Clean end-of-stream: all senders dropped.
                    self.done = true;
                    false
                }
                Some(Frame::Item(item)) => {
                    self.current = item;
                    true
                }
                Some(Frame::Fail(err)) => {
                    self.error = Some(err);
                    self.done = true;
                    false
                }
            }
        }
    }

    fn current(&self) -> &T {
        &self.current
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.cancel.cancel();
        self.rx.close();
        self.done = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn slice_iter_yields_in_order() {
        let mut it = SliceIter::new(vec![1u32, 2, 3]);
        let mut seen = Vec::new();
        while it.advance().await {
            seen.push(*it.current());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(it.error().is_none());
    }

    #[tokio::test]
    async fn slice_iter_zero_value_before_first_advance() {
        let it: SliceIter<u32> = SliceIter::new(vec![7]);
        assert_eq!(*it.current(), 0);
    }

    #[tokio::test]
    async fn slice_iter_zero_value_after_exhaustion() {
        let mut it = SliceIter::new(vec![5u32]);
        assert!(it.advance().await);
        assert!(!it.advance().await);
        assert_eq!(*it.current(), 0);
    }

    #[tokio::test]
    async fn slice_iter_close_stops_iteration() {
        let mut it = SliceIter::new(vec![1u32, 2]);
        assert!(it.advance().await);
        it.close().await.unwrap();
        assert!(!it.advance().await);
        assert!(it.error().is_none());
    }

    #[tokio::test]
    async fn channel_iter_preserves_enqueue_order() {
        let (tx, mut it) = channel::<u32>(4);
        let producer = tokio::spawn(async move {
            for i in 0..10 {
                assert!(tx.send(i).await);
            }
        });
        let mut seen = Vec::new();
        while it.advance().await {
            seen.push(*it.current());
        }
        producer.await.unwrap();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(it.error().is_none());
    }

    #[tokio::test]
    async fn channel_iter_zero_value_before_first_advance() {
        let (_tx, it) = channel::<u32>(4);
        assert_eq!(*it.current(), 0);
    }

    #[tokio::test]
    async fn terminal_error_is_sticky() {
        let (tx, mut it) = channel::<u32>(4);
        tokio::spawn(async move {
            tx.send(1).await;
            tx.fail(StreamError::terminal("disk on fire")).await;
        });
        assert!(it.advance().await);
        assert!(!it.advance().await);
        assert_eq!(it.error(), Some(&StreamError::terminal("disk on fire")));
        // Still false, still the same error.
        assert!(!it.advance().await);
        assert_eq!(it.error(), Some(&StreamError::terminal("disk on fire")));
    }

    #[tokio::test]
    async fn second_fail_is_discarded() {
        let (tx, mut it) = channel::<u32>(4);
        assert!(tx.fail(StreamError::terminal("first")).await);
        assert!(!tx.fail(StreamError::terminal("second")).await);
        drop(tx);
        assert!(!it.advance().await);
        assert_eq!(it.error(), Some(&StreamError::terminal("first")));
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_sticky_error() {
        let (tx, mut it) = channel::<u32>(2);
        let token = tx.cancel_token().clone();
        // No producer sends anything; cancel while advance would block.
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        assert!(!it.advance().await);
        assert_eq!(it.error(), Some(&StreamError::Cancelled));
        canceller.await.unwrap();
        // Producer observes cancellation on its next send.
        assert!(!tx.send(42).await);
    }

    #[tokio::test]
    async fn close_cancels_producer() {
        let (tx, mut it) = channel::<u32>(1);
        let producer = tokio::spawn(async move {
            let mut sent = 0u32;
            while tx.send(sent).await {
                sent += 1;
            }
            sent
        });
        assert!(it.advance().await);
        it.close().await.unwrap();
        it.close().await.unwrap(); // idempotent
        let sent = producer.await.unwrap();
        assert!(sent >= 1);
        assert!(!it.advance().await);
    }

    #[tokio::test]
    async fn bounded_buffer_applies_backpressure() {
        let (tx, mut it) = channel::<u32>(2);
        // Fill the buffer; a third send must block until the consumer drains.
        let producer = tokio::spawn(async move {
            for i in 0..3 {
                assert!(tx.send(i).await);
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!producer.is_finished());
        let mut seen = Vec::new();
        while it.advance().await {
            seen.push(*it.current());
        }
        producer.await.unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn items_before_failure_are_delivered() {
        let (tx, mut it) = channel::<u32>(8);
        tokio::spawn(async move {
            for i in 0..3 {
                tx.send(i).await;
            }
            tx.fail(StreamError::terminal("late failure")).await;
        });
        let mut seen = Vec::new();
        while it.advance().await {
            seen.push(*it.current());
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(it.error().is_some());
    }
}
