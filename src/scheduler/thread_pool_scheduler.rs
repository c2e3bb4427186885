use std::{io, time::Duration};

use futures::executor::ThreadPool;
use once_cell::sync::Lazy;

use super::{Scheduler, Task, TaskHandle};

static DEFAULT_POOL: Lazy<io::Result<ThreadPool>> = Lazy::new(ThreadPool::new);

/// Runs tasks on a futures [`ThreadPool`], timing delays with
/// `futures-time`.
#[derive(Clone)]
pub struct ThreadPoolScheduler {
  pool: ThreadPool,
}

impl ThreadPoolScheduler {
  pub fn new(pool: ThreadPool) -> Self { Self { pool } }

  /// Scheduler on the process-wide pool, created on first use.
  pub fn shared() -> io::Result<Self> {
    match &*DEFAULT_POOL {
      Ok(pool) => Ok(Self::new(pool.clone())),
      Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
    }
  }
}

impl<S: Send + 'static> Scheduler<S> for ThreadPoolScheduler {
  fn schedule(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::pending();
    let runner = handle.clone();
    self.pool.spawn_ok(async move {
      if let Some(delay) = delay {
        if runner.is_closed() {
          return;
        }
        futures_time::task::sleep(delay.into()).await;
      }
      runner.run(task);
    });
    handle
  }
}
