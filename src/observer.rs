//! Observer trait and implementations
//!
//! The Observer trait defines the consumer of data in the reactive pattern.
//! It provides three methods: next (for values), error (for errors), and
//! complete (for stream completion).

use std::{cell::RefCell, convert::Infallible, rc::Rc, sync::Arc, sync::Mutex};

use crate::rc::{MutArc, MutRc};

// ============================================================================
// Observer Trait
// ============================================================================

/// Observer trait: The consumer of data in reactive programming
///
/// An Observer receives zero or more `next` calls, optionally followed by
/// exactly one `error` or `complete`. Producers in this crate never call an
/// observer after a terminal notification.
///
/// All methods take `&mut self`: observers are held behind shared handles
/// ([`LocalObserverRef`], [`SharedObserverRef`]) so the same observer can be
/// subscribed, compared by identity and later unsubscribed.
pub trait Observer<Item, Err> {
  /// Receive the next value from the observable
  fn next(&mut self, value: Item);

  /// Handle a failure of the observable. No more values follow.
  fn error(&mut self, err: Err);

  /// Handle completion of the observable. No more values follow.
  fn complete(&mut self);
}

// ============================================================================
// Observer references
// ============================================================================

/// Shared observer handle for single-threaded subjects.
pub type LocalObserverRef<'a, Item, Err> = MutRc<dyn Observer<Item, Err> + 'a>;

/// Shared observer handle for thread-safe subjects and the message center.
pub type SharedObserverRef<Item, Err> = MutArc<dyn Observer<Item, Err> + Send>;

impl<'a, Item, Err> MutRc<dyn Observer<Item, Err> + 'a> {
  /// Wrap an observer into a fresh local handle with its own identity.
  pub fn new<O>(observer: O) -> Self
  where
    O: Observer<Item, Err> + 'a,
  {
    observer.into_observer_ref()
  }
}

impl<Item, Err> MutArc<dyn Observer<Item, Err> + Send> {
  /// Wrap an observer into a fresh shared handle with its own identity.
  pub fn new<O>(observer: O) -> Self
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    observer.into_observer_ref()
  }
}

/// Helper trait to convert observers into shared observer handles
///
/// The target handle type picks the flavour: a [`LocalObserverRef`] for
/// `Rc` based subjects, a [`SharedObserverRef`] (which needs `Send`) for
/// `Arc` based ones.
pub trait IntoObserverRef<R> {
  fn into_observer_ref(self) -> R;
}

impl<'a, Item, Err, O> IntoObserverRef<LocalObserverRef<'a, Item, Err>> for O
where
  O: Observer<Item, Err> + 'a,
{
  fn into_observer_ref(self) -> LocalObserverRef<'a, Item, Err> {
    let rc: Rc<RefCell<dyn Observer<Item, Err> + 'a>> = Rc::new(RefCell::new(self));
    MutRc::from_rc(rc)
  }
}

impl<Item, Err, O> IntoObserverRef<SharedObserverRef<Item, Err>> for O
where
  O: Observer<Item, Err> + Send + 'static,
{
  fn into_observer_ref(self) -> SharedObserverRef<Item, Err> {
    let arc: Arc<Mutex<dyn Observer<Item, Err> + Send>> = Arc::new(Mutex::new(self));
    MutArc::from_arc(arc)
  }
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Observer for closures
///
/// The closure becomes the `next` handler, while `error` and `complete` are
/// ignored. Only usable with infallible streams so errors are never dropped
/// silently.
#[derive(Clone)]
pub struct FnMutObserver<F>(pub F);

impl<F, Item> Observer<Item, Infallible> for FnMutObserver<F>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, v: Item) { (self.0)(v); }

  #[inline]
  fn error(&mut self, _err: Infallible) {}

  #[inline]
  fn complete(&mut self) {}
}

/// Observer assembled from three closures, one per notification.
#[derive(Clone)]
pub struct ObserverFns<N, E, C> {
  next: N,
  error: E,
  complete: C,
}

impl<N, E, C> ObserverFns<N, E, C> {
  pub fn new(next: N, error: E, complete: C) -> Self { Self { next, error, complete } }
}

impl<N, E, C, Item, Err> Observer<Item, Err> for ObserverFns<N, E, C>
where
  N: FnMut(Item),
  E: FnMut(Err),
  C: FnMut(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(&mut self, err: Err) { (self.error)(err) }

  #[inline]
  fn complete(&mut self) { (self.complete)() }
}

// ============================================================================
// Tests
// ============================================================================
