use std::{collections::VecDeque, marker::PhantomData};

use smallvec::SmallVec;
use tracing::trace;

use super::{
  subscribers::{broadcast_complete, Delivery, Snapshot},
  SubjectConfig,
};
use crate::{error::SubjectError, observer::Observer, rc::PtrEq};

/// Lifecycle of a subject. `Completed` and `Erred` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubjectState {
  #[default]
  Active,
  Completed,
  Erred,
}

impl SubjectState {
  #[inline]
  pub fn is_terminated(self) -> bool { self != SubjectState::Active }
}

/// State shared by every handle of one reactive subject.
///
/// The core never calls an observer while the caller holds a borrow of it:
/// operations that notify queue a [`Delivery`], and the handle drains the
/// queue after releasing its borrow. Only one caller drains at a time, so
/// notifications reach observers in the order they were queued, also when
/// they are queued from inside an observer or from several threads. The only
/// direct call is in `Drop`, where no other handle can exist any more.
pub struct SubjectCore<Item, Err, O>
where
  Item: Clone,
  O: Observer<Item, Err>,
{
  items: VecDeque<Item>,
  observers: Vec<O>,
  config: SubjectConfig,
  state: SubjectState,
  queue: VecDeque<Delivery<Item, Err, O>>,
  draining: bool,
  _err: PhantomData<fn(Err)>,
}

impl<Item, Err, O> SubjectCore<Item, Err, O>
where
  Item: Clone,
  O: Observer<Item, Err>,
{
  pub(crate) fn new(config: SubjectConfig) -> Self {
    Self {
      items: VecDeque::new(),
      observers: Vec::new(),
      config,
      state: SubjectState::Active,
      queue: VecDeque::new(),
      draining: false,
      _err: PhantomData,
    }
  }

  #[inline]
  pub(crate) fn config(&self) -> SubjectConfig { self.config }

  #[inline]
  pub(crate) fn state(&self) -> SubjectState { self.state }

  #[inline]
  pub(crate) fn observer_count(&self) -> usize { self.observers.len() }

  pub(crate) fn items(&self) -> impl Iterator<Item = &Item> { self.items.iter() }

  pub(crate) fn last_item(&self) -> Option<&Item> { self.items.back() }

  fn ensure_active(&self) -> Result<(), SubjectError> {
    match self.state {
      SubjectState::Active => Ok(()),
      SubjectState::Completed => Err(SubjectError::Completed),
      SubjectState::Erred => Err(SubjectError::Erred),
    }
  }

  fn snapshot(&self) -> Snapshot<O>
  where
    O: Clone,
  {
    self.observers.iter().cloned().collect()
  }

  /// Adds `observer` unless it is already subscribed, queueing the values to
  /// replay to it.
  pub(crate) fn subscribe(&mut self, observer: &O)
  where
    O: PtrEq + Clone,
  {
    if self.observers.iter().any(|o| o.ptr_eq(observer)) {
      return;
    }
    self.observers.push(observer.clone());
    trace!(observers = self.observers.len(), "observer subscribed");

    if self.config.replay && !self.items.is_empty() {
      let values: SmallVec<[Item; 4]> = self.items.iter().cloned().collect();
      self.queue.push_back(Delivery::Replay(values, observer.clone()));
    }
  }

  /// Removes `observer` and hands it back so the caller drops it outside the
  /// borrow.
  pub(crate) fn unsubscribe(&mut self, observer: &O) -> Option<O>
  where
    O: PtrEq,
  {
    let idx = self.observers.iter().position(|o| o.ptr_eq(observer))?;
    trace!(observers = self.observers.len() - 1, "observer unsubscribed");
    Some(self.observers.remove(idx))
  }

  /// Records `value`, evicting the oldest items beyond the cache size.
  pub(crate) fn push(&mut self, value: Item) -> Result<(), SubjectError>
  where
    O: Clone,
  {
    self.ensure_active()?;

    let cache_size = self.config.cache_size;
    if cache_size > 0 {
      while self.items.len() >= cache_size {
        self.items.pop_front();
      }
    }

    if self.config.is_async {
      self.items.push_back(value);
    } else {
      self.items.push_back(value.clone());
      let delivery = Delivery::Next(value, self.snapshot());
      self.queue.push_back(delivery);
    }
    Ok(())
  }

  pub(crate) fn fail(&mut self, err: Err) -> Result<(), SubjectError>
  where
    O: Clone,
  {
    self.ensure_active()?;
    self.state = SubjectState::Erred;
    let delivery = Delivery::Error(err, self.snapshot());
    self.queue.push_back(delivery);
    Ok(())
  }

  pub(crate) fn finish(&mut self) -> Result<(), SubjectError>
  where
    O: Clone,
  {
    self.ensure_active()?;
    self.state = SubjectState::Completed;
    let delivery = Delivery::Complete { flush: self.pending_flush(), observers: self.snapshot() };
    self.queue.push_back(delivery);
    Ok(())
  }

  /// Claims the queue for the caller. `false` when another caller is already
  /// draining it; that caller will deliver what was just queued.
  pub(crate) fn start_drain(&mut self) -> bool {
    if self.draining || self.queue.is_empty() {
      return false;
    }
    self.draining = true;
    true
  }

  /// Next queued delivery. Releases the drain claim once the queue is empty.
  pub(crate) fn next_delivery(&mut self) -> Option<Delivery<Item, Err, O>> {
    let delivery = self.queue.pop_front();
    if delivery.is_none() {
      self.draining = false;
    }
    delivery
  }

  /// Releases the drain claim after an observer panicked. Deliveries still
  /// queued go out with the next drain.
  pub(crate) fn abort_drain(&mut self) { self.draining = false; }

  fn pending_flush(&self) -> Vec<Item> {
    if self.config.is_async {
      self.items.iter().cloned().collect()
    } else {
      Vec::new()
    }
  }
}

impl<Item, Err, O> Drop for SubjectCore<Item, Err, O>
where
  Item: Clone,
  O: Observer<Item, Err>,
{
  fn drop(&mut self) {
    if self.state.is_terminated() {
      return;
    }
    trace!(observers = self.observers.len(), "completing subject on drop");
    // Left over only when an observer panicked mid-drain.
    self.queue.clear();
    self.state = SubjectState::Completed;
    let flush = self.pending_flush();
    let mut observers = std::mem::take(&mut self.observers);
    broadcast_complete::<Item, Err, O>(&mut observers, &flush);
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::rc::MutRc;

  type Log = Rc<RefCell<Vec<String>>>;

  struct Probe(Log);

  impl Observer<i32, String> for Probe {
    fn next(&mut self, value: i32) { self.0.borrow_mut().push(value.to_string()); }

    fn error(&mut self, err: String) { self.0.borrow_mut().push(format!("error {err}")); }

    fn complete(&mut self) { self.0.borrow_mut().push("complete".into()); }
  }

  fn probe(log: &Log) -> MutRc<Probe> { MutRc::own(Probe(log.clone())) }

  fn core(config: SubjectConfig) -> SubjectCore<i32, String, MutRc<Probe>> {
    SubjectCore::new(config)
  }

  fn run(c: &mut SubjectCore<i32, String, MutRc<Probe>>) {
    if c.start_drain() {
      while let Some(d) = c.next_delivery() {
        d.deliver();
      }
    }
  }

  #[rxpattern_macro::test]
  fn bounded_cache_keeps_most_recent_values() {
    let mut c = core(SubjectConfig::default().cache_size(3));
    for v in 0..10 {
      c.push(v).unwrap();
      run(&mut c);
      assert!(c.items().count() <= 3);
    }
    assert_eq!(c.items().copied().collect::<Vec<_>>(), vec![7, 8, 9]);
  }

  #[rxpattern_macro::test]
  fn unbounded_cache_keeps_everything() {
    let mut c = core(SubjectConfig::default());
    for v in 0..100 {
      c.push(v).unwrap();
    }
    run(&mut c);
    assert_eq!(c.items().count(), 100);
  }

  #[rxpattern_macro::test]
  fn duplicate_subscribe_is_ignored() {
    let log = Log::default();
    let p = probe(&log);
    let mut c = core(SubjectConfig::default().replay(true));
    c.push(1).unwrap();
    run(&mut c);

    c.subscribe(&p);
    c.subscribe(&p.clone());
    run(&mut c);
    assert_eq!(c.observer_count(), 1);
    assert_eq!(*log.borrow(), vec!["1"]);
  }

  #[rxpattern_macro::test]
  fn unsubscribe_unknown_observer_is_a_no_op() {
    let log = Log::default();
    let mut c = core(SubjectConfig::default());
    assert!(c.unsubscribe(&probe(&log)).is_none());
  }

  #[rxpattern_macro::test]
  fn terminal_state_rejects_further_pushes() {
    let mut c = core(SubjectConfig::default());
    c.fail("boom".into()).unwrap();
    run(&mut c);
    assert_eq!(c.state(), SubjectState::Erred);
    assert_eq!(c.push(1).err(), Some(SubjectError::Erred));
    assert_eq!(c.finish().err(), Some(SubjectError::Erred));
    assert_eq!(c.fail("again".into()).err(), Some(SubjectError::Erred));
    assert_eq!(c.items().count(), 0);
  }

  #[rxpattern_macro::test]
  fn deliveries_queue_in_order_until_drained() {
    let log = Log::default();
    let mut c = core(SubjectConfig::default());
    c.subscribe(&probe(&log));
    c.push(1).unwrap();
    c.push(2).unwrap();
    c.finish().unwrap();
    assert!(log.borrow().is_empty());

    assert!(c.start_drain());
    assert!(!c.start_drain());
    while let Some(d) = c.next_delivery() {
      d.deliver();
    }
    assert!(!c.start_drain());
    assert_eq!(*log.borrow(), vec!["1", "2", "complete"]);
  }

  #[rxpattern_macro::test]
  fn aborted_drain_keeps_the_rest_queued() {
    let log = Log::default();
    let mut c = core(SubjectConfig::default());
    c.subscribe(&probe(&log));
    c.push(1).unwrap();
    c.push(2).unwrap();

    assert!(c.start_drain());
    c.next_delivery().unwrap().deliver();
    c.abort_drain();
    run(&mut c);
    assert_eq!(*log.borrow(), vec!["1", "2"]);
  }

  #[rxpattern_macro::test]
  fn drop_completes_an_active_subject() {
    let log = Log::default();
    let p = probe(&log);
    {
      let mut c = core(SubjectConfig::default().is_async(true));
      c.subscribe(&p);
      c.push(1).unwrap();
      c.push(2).unwrap();
      run(&mut c);
      assert!(log.borrow().is_empty());
    }
    assert_eq!(*log.borrow(), vec!["1", "2", "complete"]);
  }

  #[rxpattern_macro::test]
  fn drop_after_completion_notifies_nothing() {
    let log = Log::default();
    let p = probe(&log);
    {
      let mut c = core(SubjectConfig::default());
      c.subscribe(&p);
      c.finish().unwrap();
      run(&mut c);
    }
    assert_eq!(*log.borrow(), vec!["complete"]);
  }
}
