use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Single-flight FIFO task queue
///
/// Tasks are plain values; whoever drives [`Scheduler::next`] executes them
/// one at a time, so nothing a task touches needs a lock. Handles are cheap
/// to clone and every clone refers to the same queue.
///
/// Pausing never discards work: queued tasks stay queued and run in order
/// after [`Scheduler::resume`].
///
/// # Example
///
/// ```
/// use message_consumer::message_db::consumer::Scheduler;
///
/// # tokio_test::block_on(async {
/// let scheduler = Scheduler::new();
/// scheduler.trigger("fill");
/// scheduler.trigger("process");
/// scheduler.stop();
///
/// assert_eq!(scheduler.next().await, Some("fill"));
/// assert_eq!(scheduler.next().await, Some("process"));
/// assert_eq!(scheduler.next().await, None);
/// # });
/// ```
pub struct Scheduler<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    queue: Mutex<VecDeque<T>>,
    paused: AtomicBool,
    stopped: AtomicBool,
    wake: Notify,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                paused: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                wake: Notify::new(),
            }),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a task behind everything already queued
    pub fn trigger(&self, task: T) {
        self.queue().push_back(task);
        self.inner.wake.notify_one();
    }

    /// Stop handing out tasks until [`resume`](Self::resume) is called.
    ///
    /// A task that is already running finishes normally.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    /// Continue with the task at the front of the queue
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    /// Make [`next`](Self::next) return `None` from now on, even if paused
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Wait for the next runnable task.
    ///
    /// Returns `None` once the scheduler is stopped. Tasks still queued at
    /// that point are left in place.
    pub async fn next(&self) -> Option<T> {
        loop {
            let woken = self.inner.wake.notified();
            tokio::pin!(woken);
            // Register interest before checking, so a trigger racing with
            // the checks below still wakes us.
            woken.as_mut().enable();

            if self.is_stopped() {
                return None;
            }
            if !self.is_paused() {
                if let Some(task) = self.queue().pop_front() {
                    return Some(task);
                }
            }

            woken.await;
        }
    }
}
