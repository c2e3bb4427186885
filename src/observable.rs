//! Observable trait
//!
//! The producer side of the protocol. An observable keeps a set of observer
//! references, unique by identity, and pushes notifications to them.

/// A producer that observers can join and leave.
///
/// `subscribe` is idempotent: registering an observer reference that is
/// already subscribed does nothing. `unsubscribe` of a reference that was
/// never subscribed is a no-op as well.
pub trait Observable {
  /// The observer reference type accepted by this observable.
  type Observer;

  fn subscribe(&self, observer: &Self::Observer);

  fn unsubscribe(&self, observer: &Self::Observer);
}
