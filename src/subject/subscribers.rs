use smallvec::SmallVec;

use crate::observer::Observer;

/// Observers captured for one dispatch.
///
/// A subject clones its observer handles into a snapshot while its state is
/// borrowed, releases the borrow, and only then calls the observers. An
/// observer that subscribes or unsubscribes from inside a notification
/// therefore affects the next dispatch, never the running one.
pub(crate) type Snapshot<O> = SmallVec<[O; 2]>;

/// Work a subject hands back to its handle once its state borrow is released.
pub(crate) enum Delivery<Item, Err, O> {
  /// Live value for every subscriber of a synchronous subject.
  Next(Item, Snapshot<O>),
  /// Buffered values for a single new subscriber.
  Replay(SmallVec<[Item; 4]>, O),
  Error(Err, Snapshot<O>),
  /// `flush` is empty unless the subject runs in async mode.
  Complete { flush: Vec<Item>, observers: Snapshot<O> },
}

impl<Item, Err, O> Delivery<Item, Err, O>
where
  O: Observer<Item, Err>,
  Item: Clone,
  Err: Clone,
{
  pub(crate) fn deliver(self) {
    match self {
      Delivery::Next(value, mut observers) => {
        broadcast_value::<Item, Err, O>(&mut observers, value)
      }
      Delivery::Replay(values, mut observer) => {
        values.into_iter().for_each(|v| observer.next(v))
      }
      Delivery::Error(err, mut observers) => {
        broadcast_error::<Item, Err, O>(&mut observers, err)
      }
      Delivery::Complete { flush, mut observers } => {
        broadcast_complete::<Item, Err, O>(&mut observers, &flush)
      }
    }
  }
}

/// Broadcast value to all observers with optimal cloning.
///
/// The value is cloned for all observers except the last one, which
/// receives the moved value.
pub(crate) fn broadcast_value<Item, Err, O>(observers: &mut [O], value: Item)
where
  O: Observer<Item, Err>,
  Item: Clone,
{
  let mut iter = observers.iter_mut().peekable();
  while let Some(observer) = iter.next() {
    if iter.peek().is_some() {
      observer.next(value.clone());
    } else {
      observer.next(value);
      break;
    }
  }
}

/// Broadcast error to all observers.
///
/// The error is cloned for all observers except the last one.
pub(crate) fn broadcast_error<Item, Err, O>(observers: &mut [O], err: Err)
where
  O: Observer<Item, Err>,
  Err: Clone,
{
  let mut iter = observers.iter_mut().peekable();
  while let Some(observer) = iter.next() {
    if iter.peek().is_some() {
      observer.error(err.clone());
    } else {
      observer.error(err);
      break;
    }
  }
}

/// Broadcast completion, flushing `pending` to each observer right before
/// its own `complete`.
pub(crate) fn broadcast_complete<Item, Err, O>(observers: &mut [O], pending: &[Item])
where
  O: Observer<Item, Err>,
  Item: Clone,
{
  for observer in observers.iter_mut() {
    for value in pending {
      observer.next(value.clone());
    }
    observer.complete();
  }
}
