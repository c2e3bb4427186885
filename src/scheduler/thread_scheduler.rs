use std::{thread, time::Duration};

use super::{Scheduler, Task, TaskHandle};

/// Spawns a new thread for every task. The thread sleeps for the delay,
/// then runs the task unless it was cancelled meanwhile.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl<S: Send + 'static> Scheduler<S> for ThreadScheduler {
  fn schedule(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::pending();
    let runner = handle.clone();
    thread::spawn(move || {
      if let Some(delay) = delay {
        thread::sleep(delay);
      }
      runner.run(task);
    });
    handle
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::mpsc::{channel, Sender},
    time::Instant,
  };

  use super::*;

  fn report((tx, started): (Sender<Duration>, Instant)) { let _ = tx.send(started.elapsed()); }

  #[rxpattern_macro::test]
  fn runs_after_delay() {
    let (tx, rx) = channel();
    let delay = Duration::from_millis(20);
    ThreadScheduler.schedule(Task::new((tx, Instant::now()), report), Some(delay));
    assert!(rx.recv().unwrap() >= delay);
  }

  #[rxpattern_macro::test]
  fn cancelled_before_deadline_never_runs() {
    let (tx, rx) = channel();
    let task = Task::new((tx, Instant::now()), report);
    let handle = ThreadScheduler.schedule(task, Some(Duration::from_millis(50)));
    handle.unsubscribe();
    assert!(rx.recv().is_err());
    assert!(handle.is_cancelled());
  }
}
