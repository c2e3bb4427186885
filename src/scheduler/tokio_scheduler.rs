use std::time::Duration;

use tokio::runtime::Handle;

use super::{Scheduler, Task, TaskHandle};

/// Runs tasks on a tokio runtime, timing delays with `tokio::time`.
#[derive(Clone)]
pub struct TokioScheduler {
  runtime: Handle,
}

impl TokioScheduler {
  pub fn new(runtime: Handle) -> Self { Self { runtime } }

  /// Scheduler on the runtime of the calling context, if there is one.
  pub fn current() -> Option<Self> { Handle::try_current().ok().map(Self::new) }
}

impl<S: Send + 'static> Scheduler<S> for TokioScheduler {
  fn schedule(&self, task: Task<S>, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::pending();
    let runner = handle.clone();
    self.runtime.spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      runner.run(task);
    });
    handle
  }
}
