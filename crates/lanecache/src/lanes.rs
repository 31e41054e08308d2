// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Key-affinity executor.
//!
//! [`Lanes`] owns a fixed set of single-consumer queues, each drained by its
//! own Tokio task. A key always hashes to the same lane, so operations on one
//! key run strictly in submission order while different lanes make progress in
//! parallel. Unrelated keys that share a lane wait behind each other; that
//! head-of-line blocking is the price of not spawning a worker per key.

use std::{
    fmt::Debug,
    future::Future,
    hash::Hash,
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{FutureExt, future::BoxFuture};
use lanecache_tier::{Error, ErrorKind, Result, stable_hash};
use parking_lot::{Mutex, RwLock};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

type Job = BoxFuture<'static, ()>;

#[derive(Debug)]
enum LaneSender {
    Bounded(mpsc::Sender<Job>),
    Unbounded(mpsc::UnboundedSender<Job>),
}

enum LaneReceiver {
    Bounded(mpsc::Receiver<Job>),
    Unbounded(mpsc::UnboundedReceiver<Job>),
}

impl LaneSender {
    fn send(&self, lane: usize, job: Job) -> Result<()> {
        match self {
            Self::Bounded(tx) => tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ErrorKind::QueueOverflow { lane }.into(),
                mpsc::error::TrySendError::Closed(_) => ErrorKind::Shutdown.into(),
            }),
            Self::Unbounded(tx) => tx.send(job).map_err(|_closed| ErrorKind::Shutdown.into()),
        }
    }
}

impl LaneReceiver {
    async fn recv(&mut self) -> Option<Job> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }
}

fn channel(queue_capacity: Option<usize>) -> (LaneSender, LaneReceiver) {
    match queue_capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (LaneSender::Bounded(tx), LaneReceiver::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (LaneSender::Unbounded(tx), LaneReceiver::Unbounded(rx))
        }
    }
}

async fn run_lane(lane: usize, mut queue: LaneReceiver) {
    while let Some(job) = queue.recv().await {
        job.await;
    }
    tracing::debug!(lane, "lane drained and stopped");
}

/// A fixed pool of serial execution lanes keyed by hash.
///
/// Work is queued eagerly at [`submit`](Self::submit) time: dropping the
/// returned [`Completion`] does not cancel the operation, it only discards
/// its outcome.
///
/// # Shutdown
///
/// [`shutdown`](Self::shutdown) closes every queue. Work already queued still
/// runs to completion (the lanes drain), new submissions fail with
/// [`ErrorKind::Shutdown`]. Use [`shutdown_and_wait`](Self::shutdown_and_wait)
/// to also wait for the drain to finish.
///
/// # Examples
///
/// ```
/// use lanecache::Lanes;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lanecache::Result<()> {
///
/// let lanes = Lanes::new(4, None, tokio::runtime::Handle::current())?;
/// let doubled = lanes.submit(&"key", async { Ok(21 * 2) }).await?;
/// assert_eq!(doubled, 42);
///
/// lanes.shutdown_and_wait().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Lanes {
    count: usize,
    senders: RwLock<Option<Box<[LaneSender]>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Lanes {
    /// Starts `count` lanes on the given runtime.
    ///
    /// With `queue_capacity` set, each lane queues at most that many pending
    /// operations and further submissions fail with [`ErrorKind::QueueOverflow`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityInvariant`] if `count` or `queue_capacity` is zero.
    pub fn new(count: usize, queue_capacity: Option<usize>, runtime: Handle) -> Result<Self> {
        if count == 0 {
            return Err(Error::invalid_config("lane count must be greater than zero"));
        }
        if queue_capacity == Some(0) {
            return Err(Error::invalid_config("lane queue capacity must be greater than zero"));
        }

        let mut senders = Vec::with_capacity(count);
        let mut workers = Vec::with_capacity(count);
        for lane in 0..count {
            let (tx, rx) = channel(queue_capacity);
            senders.push(tx);
            workers.push(runtime.spawn(run_lane(lane, rx)));
        }

        Ok(Self {
            count,
            senders: RwLock::new(Some(senders.into_boxed_slice())),
            workers: Mutex::new(workers),
        })
    }

    /// Returns the number of lanes.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.count
    }

    /// Returns the lane that serves `key`.
    ///
    /// The mapping is a pure function of the key and the lane count.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "the remainder is below the lane count, which is a usize")]
    pub fn lane_for<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        (stable_hash(key) % self.count as u64) as usize
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.senders.read().is_none()
    }

    /// Queues `work` on the lane that serves `key`.
    ///
    /// If `work` panics, the returned completion resolves to
    /// [`ErrorKind::LanePanicked`] and the lane keeps serving later operations.
    pub fn submit<Q, T, F>(&self, key: &Q, work: F) -> Completion<T>
    where
        Q: Hash + ?Sized,
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let lane = self.lane_for(key);
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let outcome = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .unwrap_or_else(|_panic| Err(ErrorKind::LanePanicked { lane }.into()));
            // The caller may have dropped its completion; the work still counts.
            let _ = tx.send(outcome);
        });

        let senders = self.senders.read();
        let Some(senders) = senders.as_ref() else {
            return Completion::failed(ErrorKind::Shutdown.into());
        };

        match senders[lane].send(lane, job) {
            Ok(()) => Completion::pending(rx),
            Err(error) => Completion::failed(error),
        }
    }

    /// Stops accepting work. Queued operations still run. Idempotent.
    pub fn shutdown(&self) {
        if self.senders.write().take().is_some() {
            tracing::debug!(lanes = self.count, "lanes shutting down");
        }
    }

    /// Stops accepting work and waits until every lane has drained its queue.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(error) = worker.await {
                tracing::warn!(%error, "lane worker ended abnormally");
            }
        }
    }
}

/// The eventual outcome of an operation submitted to a lane.
///
/// Await it to get the operation's result. Every failure, including a
/// submission that was rejected outright, arrives through this future.
#[must_use = "a completion carries the only report of whether the operation failed"]
pub struct Completion<T>(CompletionState<T>);

enum CompletionState<T> {
    Pending(oneshot::Receiver<Result<T>>),
    Failed(Option<Error>),
}

impl<T> Completion<T> {
    fn pending(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self(CompletionState::Pending(rx))
    }

    pub(crate) fn failed(error: Error) -> Self {
        Self(CompletionState::Failed(Some(error)))
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().0 {
            CompletionState::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_dropped| Err(ErrorKind::Shutdown.into()))),
            CompletionState::Failed(error) => Poll::Ready(Err(error.take().unwrap_or_else(|| ErrorKind::Shutdown.into()))),
        }
    }
}

impl<T> Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.0 {
            CompletionState::Pending(_) => "pending",
            CompletionState::Failed(_) => "failed",
        };
        f.debug_tuple("Completion").field(&state).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn zero_lanes_is_rejected() {
        let error = Lanes::new(0, None, Handle::current()).expect_err("zero lanes must fail");
        assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
    }

    #[tokio::test]
    async fn zero_queue_capacity_is_rejected() {
        let error = Lanes::new(2, Some(0), Handle::current()).expect_err("zero queue must fail");
        assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
    }

    #[tokio::test]
    async fn lane_assignment_is_stable() -> Result<()> {
        let lanes = Lanes::new(7, None, Handle::current())?;
        for key in 0..100_u32 {
            let lane = lanes.lane_for(&key);
            assert!(lane < 7);
            assert_eq!(lane, lanes.lane_for(&key));
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_runs_in_submission_order() -> Result<()> {
        let lanes = Lanes::new(4, None, Handle::current())?;
        let log = Arc::new(Mutex::new(Vec::new()));

        let completions: Vec<_> = (0..50_u32)
            .map(|i| {
                let log = Arc::clone(&log);
                lanes.submit(&"same", async move {
                    // Later submissions finish their sleep first if they could overtake.
                    tokio::time::sleep(Duration::from_micros(u64::from(50 - i))).await;
                    log.lock().push(i);
                    Ok(())
                })
            })
            .collect();

        for completion in completions {
            completion.await?;
        }

        assert_eq!(*log.lock(), (0..50).collect::<Vec<_>>());
        Ok(())
    }

    #[tokio::test]
    async fn panic_is_reported_and_lane_survives() -> Result<()> {
        let lanes = Lanes::new(1, None, Handle::current())?;

        let panicked = lanes
            .submit(&"key", async {
                if true {
                    panic!("boom");
                }
                Ok(())
            })
            .await
            .expect_err("panic should surface as an error");
        assert!(matches!(panicked.kind(), ErrorKind::LanePanicked { lane: 0 }));

        let value = lanes.submit(&"key", async { Ok(5) }).await?;
        assert_eq!(value, 5);
        Ok(())
    }

    #[tokio::test]
    async fn submissions_after_shutdown_fail() -> Result<()> {
        let lanes = Lanes::new(2, None, Handle::current())?;
        lanes.shutdown();
        lanes.shutdown();

        assert!(lanes.is_shut_down());
        let error = lanes.submit(&1, async { Ok(()) }).await.expect_err("lanes are shut down");
        assert!(matches!(error.kind(), ErrorKind::Shutdown));
        Ok(())
    }

    #[tokio::test]
    async fn queued_work_drains_on_shutdown() -> Result<()> {
        let lanes = Lanes::new(1, None, Handle::current())?;
        let ran = Arc::new(Mutex::new(0));

        let completions: Vec<_> = (0..10)
            .map(|_| {
                let ran = Arc::clone(&ran);
                lanes.submit(&"k", async move {
                    *ran.lock() += 1;
                    Ok(())
                })
            })
            .collect();

        lanes.shutdown_and_wait().await;

        assert_eq!(*ran.lock(), 10);
        for completion in completions {
            completion.await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn bounded_queue_overflows() -> Result<()> {
        let lanes = Lanes::new(1, Some(1), Handle::current())?;
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        // Occupies the lane until released; the queue itself is then empty.
        let blocker = lanes.submit(&"k", async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(())
        });
        started_rx.await.expect("blocker should start");

        let queued = lanes.submit(&"k", async { Ok(()) });
        let overflow = lanes.submit(&"k", async { Ok(()) }).await.expect_err("queue is full");
        assert!(matches!(overflow.kind(), ErrorKind::QueueOverflow { lane: 0 }));

        let _ = release_tx.send(());
        blocker.await?;
        queued.await?;
        Ok(())
    }
}
