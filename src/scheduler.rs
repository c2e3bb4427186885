//! Timers for delayed work.
//!
//! A [`Scheduler`] runs a [`Task`] once, optionally after a delay, and hands
//! back a [`TaskHandle`] that can cancel the task before it runs or be
//! awaited until it is done.
//!
//! | Scheduler | Feature | Timer |
//! |-----------|---------|-------|
//! | [`ThreadPoolScheduler`] | `futures-scheduler` | futures thread pool + `futures-time` |
//! | [`TokioScheduler`] | `tokio-scheduler` | tokio runtime |
//! | [`ThreadScheduler`] | | one thread per task |
//! | [`TestScheduler`] | | thread-local virtual time |

use std::{
  future::Future,
  pin::Pin,
  sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, PoisonError,
  },
  task::{Context, Poll, Waker},
  time::Duration,
};

use tracing::trace;

mod test_scheduler;
mod thread_scheduler;
#[cfg(feature = "futures-scheduler")]
mod thread_pool_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use test_scheduler::TestScheduler;
#[cfg(feature = "futures-scheduler")]
pub use thread_pool_scheduler::ThreadPoolScheduler;
pub use thread_scheduler::ThreadScheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of work: some state and the function consuming it.
///
/// `Send` follows from `S`, a `fn` pointer never captures anything.
pub struct Task<S> {
  state: S,
  handler: fn(S),
}

impl<S> Task<S> {
  pub fn new(state: S, handler: fn(S)) -> Self { Self { state, handler } }

  pub fn run(self) { (self.handler)(self.state) }
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// `status` moves from `PENDING` to either `CANCELLED`, or `RUNNING` then
/// `DONE`. Both transitions out of `PENDING` are a single compare-exchange,
/// so a task is either run or cancelled, never both.
struct TaskState {
  status: AtomicU8,
  waker: Mutex<Option<Waker>>,
}

impl TaskState {
  fn status(&self) -> u8 { self.status.load(Ordering::Acquire) }

  fn transition(&self, from: u8, to: u8) -> bool {
    self.status.compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire).is_ok()
  }

  fn wake(&self) {
    let waker = self.waker.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

/// Handle to a scheduled task.
///
/// Cloning the handle does not duplicate the task. Dropping it does not
/// cancel the task either: call [`unsubscribe`](TaskHandle::unsubscribe).
/// Awaiting the handle resolves once the task ran or was cancelled.
#[derive(Clone)]
pub struct TaskHandle {
  // `None` for work that already ran synchronously.
  inner: Option<Arc<TaskState>>,
}

impl TaskHandle {
  /// Handle for work that already completed.
  pub fn finished() -> Self { Self { inner: None } }

  pub(crate) fn pending() -> Self {
    let state = TaskState { status: AtomicU8::new(PENDING), waker: Mutex::new(None) };
    Self { inner: Some(Arc::new(state)) }
  }

  /// Cancel the task if it has not started yet. A task that is already
  /// running, or done, is left alone.
  pub fn unsubscribe(&self) {
    if let Some(state) = &self.inner {
      if state.transition(PENDING, CANCELLED) {
        state.wake();
      }
    }
  }

  /// Whether the task ran or was cancelled.
  pub fn is_closed(&self) -> bool {
    self.inner.as_ref().is_none_or(|s| matches!(s.status(), DONE | CANCELLED))
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.as_ref().is_some_and(|s| s.status() == CANCELLED)
  }

  /// Runs `task` unless the handle was cancelled first.
  pub(crate) fn run<S>(&self, task: Task<S>) {
    let Some(state) = &self.inner else { return task.run() };
    if !state.transition(PENDING, RUNNING) {
      trace!("skipping cancelled task");
      return;
    }
    let _done = MarkDone(state);
    trace!("running scheduled task");
    task.run();
  }
}

/// Marks a running task done, also when it panics.
struct MarkDone<'a>(&'a TaskState);

impl Drop for MarkDone<'_> {
  fn drop(&mut self) {
    self.0.status.store(DONE, Ordering::Release);
    self.0.wake();
  }
}

impl Future for TaskHandle {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let Some(state) = &self.inner else { return Poll::Ready(()) };
    if self.is_closed() {
      return Poll::Ready(());
    }
    *state.waker.lock().unwrap_or_else(PoisonError::into_inner) = Some(cx.waker().clone());
    // The task may have finished before the waker was stored.
    if self.is_closed() { Poll::Ready(()) } else { Poll::Pending }
  }
}

/// Runs tasks, now or after a delay.
pub trait Scheduler<S> {
  fn schedule(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle;
}
