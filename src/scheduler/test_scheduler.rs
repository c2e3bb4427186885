//! Test Scheduler for deterministic testing of delayed work.
//!
//! Provides virtual time that only advances when explicitly instructed, so
//! delayed message sends can be tested without sleeping.
//!
//! # Usage
//!
//! ```rust
//! use std::time::Duration;
//! use rxpattern::scheduler::{Scheduler, Task, TestScheduler};
//!
//! // Initialize the test scheduler (required before use)
//! TestScheduler::init();
//!
//! let handle = TestScheduler.schedule(Task::new((), |_| {}), Some(Duration::from_millis(100)));
//! assert!(!handle.is_closed());
//!
//! // Advance virtual time to run the task
//! TestScheduler::advance_by(Duration::from_millis(100));
//! assert!(handle.is_closed());
//! ```
//!
//! # Thread Safety
//!
//! TestScheduler uses thread-local storage, so each thread has its own
//! independent virtual time and task queue. This keeps tests isolated when
//! they run in parallel on different threads.

use std::{cell::RefCell, cmp::Ordering, collections::BinaryHeap, time::Duration};

use super::{Scheduler, Task, TaskHandle};

// ==================== Internal State ====================

#[derive(Default)]
struct TestSchedulerState {
  virtual_time: Duration,
  task_queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
  initialized: bool,
}

struct ScheduledTask {
  scheduled_time: Duration,
  task_id: usize,
  task: Box<dyn FnOnce()>,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool {
    self.scheduled_time == other.scheduled_time && self.task_id == other.task_id
  }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by task_id
    other
      .scheduled_time
      .cmp(&self.scheduled_time)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

thread_local! {
  static TEST_SCHEDULER_STATE: RefCell<TestSchedulerState>
    = RefCell::new(TestSchedulerState::default());
}

// ==================== TestScheduler ====================

/// A virtual time scheduler for deterministic testing.
///
/// This is a zero-sized type that accesses thread-local state.
/// All instances in the same thread share the same virtual time and task
/// queue. Tasks run on the thread that advances the time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestScheduler;

impl TestScheduler {
  /// Initialize or reset the test scheduler state.
  ///
  /// Call this at the start of each test. It resets the virtual time to zero
  /// and drops every queued task.
  ///
  /// # Panics
  ///
  /// Other methods panic if `init()` has not been called first.
  pub fn init() {
    let dropped = TEST_SCHEDULER_STATE.with(|state| {
      let mut state = state.borrow_mut();
      state.virtual_time = Duration::ZERO;
      state.next_task_id = 0;
      state.initialized = true;
      std::mem::take(&mut state.task_queue)
    });
    drop(dropped);
  }

  fn ensure_initialized() {
    TEST_SCHEDULER_STATE.with(|state| {
      assert!(
        state.borrow().initialized,
        "TestScheduler::init() must be called before using the scheduler"
      );
    });
  }

  /// Get the current virtual time.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn now() -> Duration {
    Self::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| state.borrow().virtual_time)
  }

  /// Number of queued tasks, cancelled ones included until their time
  /// comes.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn pending_count() -> usize {
    Self::ensure_initialized();
    TEST_SCHEDULER_STATE.with(|state| state.borrow().task_queue.len())
  }

  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn is_empty() -> bool { Self::pending_count() == 0 }

  fn execute_tasks_until(target_time: Option<Duration>) {
    loop {
      // The queue borrow ends before the task runs, tasks may schedule more.
      let task = TEST_SCHEDULER_STATE.with(|state| {
        let mut state = state.borrow_mut();
        let due = state
          .task_queue
          .peek()
          .is_some_and(|peek| target_time.is_none_or(|limit| peek.scheduled_time <= limit));
        if !due {
          return None;
        }
        let scheduled_task = state.task_queue.pop()?;
        state.virtual_time = scheduled_task.scheduled_time;
        Some(scheduled_task)
      });

      let Some(scheduled_task) = task else {
        break;
      };
      (scheduled_task.task)();
    }
  }

  /// Advance virtual time by the specified duration and execute due tasks.
  ///
  /// Tasks run in order of their scheduled time, with FIFO ordering for
  /// tasks scheduled at the same time.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn advance_by(duration: Duration) {
    Self::ensure_initialized();
    let target_time = TEST_SCHEDULER_STATE.with(|state| state.borrow().virtual_time + duration);

    Self::execute_tasks_until(Some(target_time));

    TEST_SCHEDULER_STATE.with(|state| {
      state.borrow_mut().virtual_time = target_time;
    });
  }

  /// Execute all pending tasks by advancing time to each task's scheduled
  /// time.
  ///
  /// # Panics
  ///
  /// Panics if `init()` has not been called first.
  pub fn flush() {
    Self::ensure_initialized();
    Self::execute_tasks_until(None);
  }
}

impl<S: 'static> Scheduler<S> for TestScheduler {
  fn schedule(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    TestScheduler::ensure_initialized();
    let handle = TaskHandle::pending();
    let runner = handle.clone();

    TEST_SCHEDULER_STATE.with(|state| {
      let mut state = state.borrow_mut();
      let scheduled_time = state.virtual_time + delay.unwrap_or(Duration::ZERO);
      let task_id = state.next_task_id;
      state.next_task_id += 1;
      state.task_queue.push(ScheduledTask {
        scheduled_time,
        task_id,
        task: Box::new(move || runner.run(task)),
      });
    });

    handle
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;

  type Log = Rc<RefCell<Vec<(&'static str, Duration)>>>;

  fn record((log, tag): (Log, &'static str)) { log.borrow_mut().push((tag, TestScheduler::now())); }

  fn schedule(log: &Log, tag: &'static str, delay_ms: u64) -> TaskHandle {
    let delay = Duration::from_millis(delay_ms);
    TestScheduler.schedule(Task::new((log.clone(), tag), record), Some(delay))
  }

  #[rxpattern_macro::test]
  fn test_virtual_time_starts_at_zero() {
    TestScheduler::init();
    assert_eq!(TestScheduler::now(), Duration::ZERO);
    assert!(TestScheduler::is_empty());
  }

  #[rxpattern_macro::test]
  fn test_advance_runs_only_due_tasks() {
    TestScheduler::init();
    let log = Log::default();
    schedule(&log, "late", 100);
    schedule(&log, "early", 50);
    assert_eq!(TestScheduler::pending_count(), 2);

    TestScheduler::advance_by(Duration::from_millis(60));
    assert_eq!(*log.borrow(), vec![("early", Duration::from_millis(50))]);
    assert_eq!(TestScheduler::now(), Duration::from_millis(60));

    TestScheduler::advance_by(Duration::from_millis(40));
    assert_eq!(log.borrow().len(), 2);
    assert!(TestScheduler::is_empty());
  }

  #[rxpattern_macro::test]
  fn test_same_time_tasks_run_fifo() {
    TestScheduler::init();
    let log = Log::default();
    schedule(&log, "a", 10);
    schedule(&log, "b", 10);
    schedule(&log, "c", 10);
    TestScheduler::flush();

    let tags: Vec<_> = log.borrow().iter().map(|(t, _)| *t).collect();
    assert_eq!(tags, vec!["a", "b", "c"]);
  }

  #[rxpattern_macro::test]
  fn test_cancelled_task_is_skipped() {
    TestScheduler::init();
    let log = Log::default();
    let handle = schedule(&log, "never", 10);
    schedule(&log, "kept", 20);
    handle.unsubscribe();

    TestScheduler::flush();
    assert_eq!(*log.borrow(), vec![("kept", Duration::from_millis(20))]);
    assert!(handle.is_closed());
  }

  #[rxpattern_macro::test]
  fn test_init_resets_queue() {
    TestScheduler::init();
    let log = Log::default();
    schedule(&log, "dropped", 10);
    TestScheduler::init();
    TestScheduler::flush();
    assert!(log.borrow().is_empty());
  }

  #[rxpattern_macro::test]
  #[should_panic(expected = "TestScheduler::init()")]
  fn test_requires_init() {
    std::thread::spawn(TestScheduler::now).join().unwrap_or_else(|e| std::panic::resume_unwind(e));
  }
}
