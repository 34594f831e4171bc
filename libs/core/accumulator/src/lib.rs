//! Size and time bounded batching.
//!
//! An [`Accumulator`] sits between any number of producers and a single batch
//! consumer. Items pushed through [`Accumulator::input`] are pooled and handed
//! to the flush callback either when the pool reaches `max_size` or when the
//! window opened by the first pooled item times out.
//!
//! ```text
//! producer ─┐
//! producer ─┼──▶ input (capacity 1) ──▶ loop task ──▶ flush(Vec<T>)
//! producer ─┘                             │
//!                                  size reached / window timeout
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use accumulator::Accumulator;
//! use std::time::Duration;
//!
//! let mut acc = Accumulator::new(Duration::from_secs(5), 50);
//! let input = acc.input();
//! acc.start(|batch: Vec<Trigger>| publish_batch(batch))?;
//!
//! input.send(trigger).await?;
//! ```

mod error;
mod pool;

pub use error::AccumulatorError;

use metrics::counter;
use pool::Pool;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Window timeout used when a zero timeout is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Pool size threshold used when a zero size is configured.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Batches items from many producers into flushes of at most `max_size` items.
pub struct Accumulator<T> {
    timeout: Duration,
    max_size: usize,
    input: mpsc::Sender<T>,
    receiver: Option<mpsc::Receiver<T>>,
}

impl<T: Send + 'static> Accumulator<T> {
    /// Create a new accumulator.
    ///
    /// A zero `timeout` or `max_size` is replaced by [`DEFAULT_TIMEOUT`] or
    /// [`DEFAULT_MAX_SIZE`] and a warning is logged.
    pub fn new(timeout: Duration, max_size: usize) -> Self {
        let timeout = if timeout.is_zero() {
            warn!(
                default_secs = DEFAULT_TIMEOUT.as_secs(),
                "timeout must be a positive duration greater than zero, using default"
            );
            DEFAULT_TIMEOUT
        } else {
            timeout
        };

        let max_size = if max_size == 0 {
            warn!(
                default = DEFAULT_MAX_SIZE,
                "max_size must be a positive integer greater than zero, using default"
            );
            DEFAULT_MAX_SIZE
        } else {
            max_size
        };

        // Capacity 1 is the smallest tokio allows: a producer waits until the
        // loop has taken the previous item.
        let (input, receiver) = mpsc::channel(1);

        Self {
            timeout,
            max_size,
            input,
            receiver: Some(receiver),
        }
    }

    /// Handle through which producers submit items. Cheap to clone.
    pub fn input(&self) -> mpsc::Sender<T> {
        self.input.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Spawn the consumption loop and return immediately.
    ///
    /// `flush` runs on the loop task itself, so a slow callback delays the
    /// intake of further items. The loop ends once every input handle,
    /// including the one held by the accumulator, has been dropped; any
    /// pooled items are flushed first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F>(&mut self, flush: F) -> Result<JoinHandle<()>, AccumulatorError>
    where
        F: FnMut(Vec<T>) + Send + 'static,
    {
        let receiver = self
            .receiver
            .take()
            .ok_or(AccumulatorError::AlreadyStarted)?;

        debug!(
            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            max_size = self.max_size,
            "Starting accumulator"
        );

        Ok(tokio::spawn(run(
            receiver,
            Pool::new(self.max_size),
            self.timeout,
            flush,
        )))
    }
}

/// Timer state of the current accumulation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Idle,
    Armed { deadline: Instant },
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Size,
    Timeout,
    Closed,
}

impl FlushReason {
    fn as_str(self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Timeout => "timeout",
            FlushReason::Closed => "closed",
        }
    }
}

async fn run<T, F>(
    mut receiver: mpsc::Receiver<T>,
    mut pool: Pool<T>,
    timeout: Duration,
    mut flush: F,
) where
    F: FnMut(Vec<T>),
{
    let mut window = Window::Idle;

    loop {
        let deadline = match window {
            Window::Armed { deadline } => deadline,
            // Never polled while idle.
            Window::Idle => Instant::now(),
        };

        tokio::select! {
            // Arrivals win over the timer, so a size flush always disarms
            // its window before that window's timer can be observed.
            biased;

            item = receiver.recv() => match item {
                Some(item) => {
                    if window == Window::Idle {
                        window = Window::Armed { deadline: Instant::now() + timeout };
                    }
                    pool.push(item);

                    if pool.is_full() {
                        emit(&mut pool, &mut flush, FlushReason::Size);
                        window = Window::Idle;
                    }
                }
                None => {
                    if !pool.is_empty() {
                        emit(&mut pool, &mut flush, FlushReason::Closed);
                    }
                    debug!("Accumulator input closed, stopping");
                    break;
                }
            },

            _ = sleep_until(deadline), if matches!(window, Window::Armed { .. }) => {
                if !pool.is_empty() {
                    emit(&mut pool, &mut flush, FlushReason::Timeout);
                }
                window = Window::Idle;
            }
        }
    }
}

fn emit<T, F>(pool: &mut Pool<T>, flush: &mut F, reason: FlushReason)
where
    F: FnMut(Vec<T>),
{
    let batch = pool.drain();
    debug!(size = batch.len(), reason = reason.as_str(), "Flushing batch");
    counter!("accumulator_flush_total", "reason" => reason.as_str()).increment(1);
    flush(batch);
}

#[cfg(test)]
mod tests {
    use super::*;

    type Batches = mpsc::UnboundedReceiver<Vec<u32>>;

    fn started(timeout: Duration, max_size: usize) -> (Accumulator<u32>, Batches) {
        let mut acc = Accumulator::new(timeout, max_size);
        let (tx, rx) = mpsc::unbounded_channel();
        acc.start(move |batch| {
            let _ = tx.send(batch);
        })
        .unwrap();
        (acc, rx)
    }

    #[test]
    fn test_zero_values_use_defaults() {
        let acc: Accumulator<u32> = Accumulator::new(Duration::ZERO, 0);
        assert_eq!(acc.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(acc.max_size(), DEFAULT_MAX_SIZE);
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let acc: Accumulator<u32> = Accumulator::new(Duration::from_millis(250), 7);
        assert_eq!(acc.timeout(), Duration::from_millis(250));
        assert_eq!(acc.max_size(), 7);
    }

    #[test]
    #[should_panic]
    fn test_start_outside_runtime_panics() {
        let mut acc: Accumulator<u32> = Accumulator::new(Duration::from_secs(1), 1);
        let _ = acc.start(|_| {});
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut acc: Accumulator<u32> = Accumulator::new(Duration::from_secs(1), 1);
        acc.start(|_| {}).unwrap();

        let err = acc.start(|_| {}).unwrap_err();
        assert!(matches!(err, AccumulatorError::AlreadyStarted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_flushes_preserve_order_and_lose_nothing() {
        let (acc, mut batches) = started(Duration::from_secs(60), 3);
        let input = acc.input();

        for i in 1..=7 {
            input.send(i).await.unwrap();
        }

        assert_eq!(batches.recv().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(batches.recv().await.unwrap(), vec![4, 5, 6]);

        // The leftover item goes out once its window times out.
        let before = Instant::now();
        assert_eq!(batches.recv().await.unwrap(), vec![7]);
        assert!(before.elapsed() >= Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_flushes_partial_pool_once() {
        let (acc, mut batches) = started(Duration::from_secs(60), 100);
        let input = acc.input();

        let start = Instant::now();
        for i in 0..5 {
            input.send(i).await.unwrap();
        }

        assert_eq!(batches.recv().await.unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(start.elapsed() >= Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_flush_disarms_pending_timer() {
        let (acc, mut batches) = started(Duration::from_secs(1), 2);
        let input = acc.input();

        input.send(1).await.unwrap();
        input.send(2).await.unwrap();
        assert_eq!(batches.recv().await.unwrap(), vec![1, 2]);

        // Well past the first window: no empty or duplicate flush.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(batches.try_recv().is_err());

        input.send(3).await.unwrap();
        assert_eq!(batches.recv().await.unwrap(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_starts_at_first_item() {
        let (acc, mut batches) = started(Duration::from_secs(10), 100);
        let input = acc.input();

        input.send(1).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        input.send(2).await.unwrap();

        // Second item does not extend the window opened by the first.
        let batch = batches.recv().await.unwrap();
        assert_eq!(batch, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_closing_input_flushes_remaining_items() {
        let mut acc = Accumulator::new(Duration::from_secs(3600), 10);
        let (tx, mut batches) = mpsc::unbounded_channel();
        let handle = acc
            .start(move |batch: Vec<u32>| {
                let _ = tx.send(batch);
            })
            .unwrap();

        let input = acc.input();
        drop(acc);

        input.send(42).await.unwrap();
        input.send(43).await.unwrap();
        drop(input);

        handle.await.unwrap();
        assert_eq!(batches.recv().await.unwrap(), vec![42, 43]);
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_producers_each_item_flushed_once() {
        let (acc, mut batches) = started(Duration::from_secs(1), 8);

        let mut producers = Vec::new();
        for p in 0..4u32 {
            let input = acc.input();
            producers.push(tokio::spawn(async move {
                for i in 0..25u32 {
                    input.send(p * 100 + i).await.unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut seen = Vec::new();
        while seen.len() < 100 {
            let batch = batches.recv().await.unwrap();
            assert!(batch.len() <= 8);
            seen.extend(batch);
        }

        seen.sort_unstable();
        let expected: Vec<u32> = (0..4u32)
            .flat_map(|p| (0..25u32).map(move |i| p * 100 + i))
            .collect();
        assert_eq!(seen, expected);
    }
}
