//! Reactive subjects.
//!
//! A [`ReactiveSubject`] is both an [`Observable`] and an [`Observer`]:
//! producers push into it through the observer side and it fans every
//! notification out to its subscribers. On top of plain multicasting it can
//! keep a bounded buffer of past values, replay that buffer to late
//! subscribers, and run in async mode where values are buffered silently and
//! flushed to each subscriber just before completion.
//!
//! Two flavours share one implementation:
//!
//! | Type | Handle | Observers |
//! |------|--------|-----------|
//! | [`LocalReactiveSubject`] | `Rc<RefCell<_>>` | [`LocalObserverRef`] |
//! | [`SharedReactiveSubject`] | `Arc<Mutex<_>>` | [`SharedObserverRef`] |
//!
//! ```rust
//! use std::convert::Infallible;
//! use rxpattern::prelude::*;
//!
//! let mut subject = LocalReactiveSubject::<i32, Infallible>::new_full(true, false, 2);
//! subject.next(1);
//! subject.next(2);
//! subject.next(3);
//!
//! let seen = std::rc::Rc::new(std::cell::RefCell::new(vec![]));
//! let c_seen = seen.clone();
//! subject.subscribe_with(FnMutObserver(move |v: i32| c_seen.borrow_mut().push(v)));
//! assert_eq!(*seen.borrow(), vec![2, 3]);
//! ```

mod property_subject;
mod subject_core;
mod subscribers;

use std::panic::{self, AssertUnwindSafe};

pub use property_subject::{HandlerId, NotifyHandler, NotifyProperty, PropertySubject};
pub use subject_core::{SubjectCore, SubjectState};
use tracing::error;

use crate::{
  error::SubjectError,
  observable::Observable,
  observer::{IntoObserverRef, LocalObserverRef, Observer, SharedObserverRef},
  rc::{MutArc, MutRc, PtrEq, RcDeref, RcDerefMut, WeakRc},
};

// ============================================================================
// Configuration
// ============================================================================

/// Behaviour of a reactive subject, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubjectConfig {
  /// Send the buffered values to every new subscriber.
  pub replay: bool,
  /// Buffer values silently and flush them right before completion.
  pub is_async: bool,
  /// Number of values kept in the buffer, `0` keeps all of them.
  pub cache_size: usize,
}

impl SubjectConfig {
  pub const fn new(replay: bool, is_async: bool, cache_size: usize) -> Self {
    Self { replay, is_async, cache_size }
  }

  pub const fn replay(mut self, replay: bool) -> Self {
    self.replay = replay;
    self
  }

  pub const fn is_async(mut self, is_async: bool) -> Self {
    self.is_async = is_async;
    self
  }

  pub const fn cache_size(mut self, cache_size: usize) -> Self {
    self.cache_size = cache_size;
    self
  }
}

// ============================================================================
// Subject handle
// ============================================================================

/// Handle to a reactive subject. Cloning the handle shares the subject.
///
/// `P` is the pointer to the shared [`SubjectCore`]; use the
/// [`LocalReactiveSubject`] and [`SharedReactiveSubject`] aliases instead of
/// naming it.
#[derive(Clone)]
pub struct ReactiveSubject<P> {
  core: P,
}

pub type LocalSubjectCore<'a, Item, Err> = SubjectCore<Item, Err, LocalObserverRef<'a, Item, Err>>;

pub type SharedSubjectCore<Item, Err> = SubjectCore<Item, Err, SharedObserverRef<Item, Err>>;

/// Single-threaded subject. Observers may borrow from the stack (`'a`).
pub type LocalReactiveSubject<'a, Item, Err> =
  ReactiveSubject<MutRc<LocalSubjectCore<'a, Item, Err>>>;

/// Thread-safe subject. Its internal lock is released before any observer
/// runs, so observers may use the subject re-entrantly from any thread.
/// Notifications are delivered by one thread at a time, in the order the
/// subject accepted them.
pub type SharedReactiveSubject<Item, Err> = ReactiveSubject<MutArc<SharedSubjectCore<Item, Err>>>;

impl<P, Item, Err, O> ReactiveSubject<P>
where
  P: RcDerefMut<Target = SubjectCore<Item, Err, O>> + From<SubjectCore<Item, Err, O>>,
  Item: Clone,
  O: Observer<Item, Err>,
{
  /// Subject that keeps every value, does not replay and streams
  /// synchronously.
  pub fn new() -> Self { Self::with_config(SubjectConfig::default()) }

  pub fn new_full(replay: bool, is_async: bool, cache_size: usize) -> Self {
    Self::with_config(SubjectConfig::new(replay, is_async, cache_size))
  }

  pub fn with_config(config: SubjectConfig) -> Self {
    Self { core: P::from(SubjectCore::new(config)) }
  }
}

impl<P, Item, Err, O> Default for ReactiveSubject<P>
where
  P: RcDerefMut<Target = SubjectCore<Item, Err, O>> + From<SubjectCore<Item, Err, O>>,
  Item: Clone,
  O: Observer<Item, Err>,
{
  fn default() -> Self { Self::new() }
}

impl<P, Item, Err, O> ReactiveSubject<P>
where
  P: RcDerefMut<Target = SubjectCore<Item, Err, O>>,
  Item: Clone,
  O: Observer<Item, Err> + Clone,
{
  pub fn config(&self) -> SubjectConfig { self.core.rc_deref().config() }

  pub fn state(&self) -> SubjectState { self.core.rc_deref().state() }

  /// Whether the subject has completed or failed.
  pub fn is_completed(&self) -> bool { self.state().is_terminated() }

  pub fn observer_count(&self) -> usize { self.core.rc_deref().observer_count() }

  /// Copy of the buffered values, oldest first.
  pub fn items(&self) -> Vec<Item> { self.core.rc_deref().items().cloned().collect() }

  /// The most recently pushed value still in the buffer.
  pub fn last_item(&self) -> Option<Item> { self.core.rc_deref().last_item().cloned() }

  /// Push a value, failing if the subject already terminated.
  ///
  /// Called from inside one of this subject's observers, or while another
  /// thread is delivering, the value is queued and reaches the observers
  /// right after the notification in progress.
  pub fn try_next(&self, value: Item) -> Result<(), SubjectError>
  where
    Err: Clone,
  {
    self.core.rc_deref_mut().push(value)?;
    self.drain();
    Ok(())
  }

  /// Fail the stream, failing if the subject already terminated.
  pub fn try_error(&self, err: Err) -> Result<(), SubjectError>
  where
    Err: Clone,
  {
    self.core.rc_deref_mut().fail(err)?;
    self.drain();
    Ok(())
  }

  /// Complete the stream, failing if the subject already terminated.
  pub fn try_complete(&self) -> Result<(), SubjectError>
  where
    Err: Clone,
  {
    self.core.rc_deref_mut().finish()?;
    self.drain();
    Ok(())
  }

  /// Deliver queued notifications one at a time, unless another caller is
  /// already doing so.
  fn drain(&self)
  where
    Err: Clone,
  {
    if !self.core.rc_deref_mut().start_drain() {
      return;
    }
    loop {
      let Some(delivery) = self.core.rc_deref_mut().next_delivery() else { break };
      if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| delivery.deliver())) {
        self.core.rc_deref_mut().abort_drain();
        panic::resume_unwind(panic);
      }
    }
  }

  /// Subscribe an observer value, returning the reference that identifies it
  /// for [`Observable::unsubscribe`].
  pub fn subscribe_with<Ob>(&self, observer: Ob) -> O
  where
    Ob: IntoObserverRef<O>,
    O: PtrEq,
    Err: Clone,
  {
    let observer = observer.into_observer_ref();
    self.subscribe(&observer);
    observer
  }
}

impl<P, Item, Err, O> Observable for ReactiveSubject<P>
where
  P: RcDerefMut<Target = SubjectCore<Item, Err, O>>,
  Item: Clone,
  Err: Clone,
  O: Observer<Item, Err> + PtrEq + Clone,
{
  type Observer = O;

  fn subscribe(&self, observer: &O) {
    self.core.rc_deref_mut().subscribe(observer);
    self.drain();
  }

  fn unsubscribe(&self, observer: &O) {
    let removed = self.core.rc_deref_mut().unsubscribe(observer);
    drop(removed);
  }
}

impl<P, Item, Err, O> Observer<Item, Err> for ReactiveSubject<P>
where
  P: RcDerefMut<Target = SubjectCore<Item, Err, O>>,
  Item: Clone,
  Err: Clone,
  O: Observer<Item, Err> + Clone,
{
  fn next(&mut self, value: Item) {
    if let Err(err) = self.try_next(value) {
      error!(%err, "next rejected");
    }
  }

  fn error(&mut self, err: Err) {
    if let Err(err) = self.try_error(err) {
      error!(%err, "error rejected");
    }
  }

  fn complete(&mut self) {
    if let Err(err) = self.try_complete() {
      error!(%err, "complete rejected");
    }
  }
}

impl<'a, Item, Err> LocalReactiveSubject<'a, Item, Err>
where
  Item: Clone,
{
  pub(crate) fn downgrade(&self) -> WeakSubject<'a, Item, Err> {
    WeakSubject(self.core.downgrade())
  }
}

/// Non-owning handle to a local subject.
pub(crate) struct WeakSubject<'a, Item: Clone, Err>(WeakRc<LocalSubjectCore<'a, Item, Err>>);

impl<'a, Item: Clone, Err> WeakSubject<'a, Item, Err> {
  pub(crate) fn upgrade(&self) -> Option<LocalReactiveSubject<'a, Item, Err>> {
    self.0.upgrade().map(|core| ReactiveSubject { core })
  }
}
