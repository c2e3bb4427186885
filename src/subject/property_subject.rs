//! Subject fed by the change notifications of an object property.

use std::{
  convert::Infallible,
  rc::{Rc, Weak},
};

use tracing::debug;

use super::{LocalReactiveSubject, SubjectConfig, WeakSubject};
use crate::{
  error::PropertyError,
  observable::Observable,
  observer::{IntoObserverRef, LocalObserverRef, Observer},
};

/// Identifies a change handler registered with [`NotifyProperty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

/// Change handler. It receives the object whose property changed.
pub type NotifyHandler<T> = Box<dyn FnMut(&T)>;

/// An object with named properties that announces their changes.
///
/// Implementations call every handler connected to a property after that
/// property changed. `disconnect_notify` must drop the handler after
/// releasing any internal borrow: dropping a handler may notify observers,
/// which are free to read the object again.
pub trait NotifyProperty {
  type Value: Clone + 'static;

  /// Current value of `name`, `None` if the object has no such property.
  fn property(&self, name: &str) -> Option<Self::Value>;

  fn connect_notify(&self, name: &str, handler: NotifyHandler<Self>) -> HandlerId;

  fn disconnect_notify(&self, id: HandlerId);
}

/// Completes the subject when the change handler owning it is dropped, that
/// is when the watched object dies or the handler is disconnected.
struct CompleteOnDrop<V: Clone + 'static>(WeakSubject<'static, V, Infallible>);

impl<V: Clone + 'static> CompleteOnDrop<V> {
  fn subject(&self) -> Option<LocalReactiveSubject<'static, V, Infallible>> { self.0.upgrade() }
}

impl<V: Clone + 'static> Drop for CompleteOnDrop<V> {
  fn drop(&mut self) {
    if let Some(subject) = self.subject() {
      // Already terminated is fine here.
      let _ = subject.try_complete();
    }
  }
}

/// Reactive subject that mirrors one property of a watched object.
///
/// The subject replays the latest value (`cache_size` 1) to every new
/// subscriber and pushes each change synchronously. The object is only held
/// weakly: when it is destroyed the stream completes. Dropping the property
/// subject, or calling [`detach`](PropertySubject::detach), disconnects the
/// change handler and completes the stream as well.
pub struct PropertySubject<T: NotifyProperty + 'static> {
  object: Weak<T>,
  name: String,
  handler: Option<HandlerId>,
  subject: LocalReactiveSubject<'static, T::Value, Infallible>,
}

impl<T: NotifyProperty + 'static> PropertySubject<T> {
  /// Start watching property `name` of `object`, seeded with its current
  /// value.
  pub fn new(object: &Rc<T>, name: &str) -> Result<Self, PropertyError> {
    let initial = object
      .property(name)
      .ok_or_else(|| PropertyError::UnknownProperty(name.to_owned()))?;

    let mut subject = LocalReactiveSubject::with_config(SubjectConfig::new(true, false, 1));
    subject.next(initial);

    let guard = CompleteOnDrop(subject.downgrade());
    let property = name.to_owned();
    let id = object.connect_notify(
      name,
      Box::new(move |obj: &T| {
        let Some(mut subject) = guard.subject() else { return };
        if let Some(value) = obj.property(&property) {
          subject.next(value);
        }
      }),
    );
    debug!(property = name, "watching property");

    Ok(Self { object: Rc::downgrade(object), name: name.to_owned(), handler: Some(id), subject })
  }

  pub fn property_name(&self) -> &str { &self.name }

  /// Latest value seen.
  pub fn current(&self) -> Option<T::Value> { self.subject.last_item() }

  /// The underlying subject.
  pub fn subject(&self) -> &LocalReactiveSubject<'static, T::Value, Infallible> { &self.subject }

  /// Whether changes still flow: the handler is connected and the object
  /// alive.
  pub fn is_attached(&self) -> bool { self.handler.is_some() && self.object.strong_count() > 0 }

  /// Disconnect from the watched object. The stream completes.
  pub fn detach(&mut self) {
    let Some(id) = self.handler.take() else { return };
    if let Some(object) = self.object.upgrade() {
      object.disconnect_notify(id);
      debug!(property = %self.name, "property detached");
    }
  }

  pub fn subscribe_with<Ob>(&self, observer: Ob) -> LocalObserverRef<'static, T::Value, Infallible>
  where
    Ob: IntoObserverRef<LocalObserverRef<'static, T::Value, Infallible>>,
  {
    self.subject.subscribe_with(observer)
  }
}

impl<T: NotifyProperty + 'static> Observable for PropertySubject<T> {
  type Observer = LocalObserverRef<'static, T::Value, Infallible>;

  fn subscribe(&self, observer: &Self::Observer) { self.subject.subscribe(observer) }

  fn unsubscribe(&self, observer: &Self::Observer) { self.subject.unsubscribe(observer) }
}

impl<T: NotifyProperty + 'static> Drop for PropertySubject<T> {
  fn drop(&mut self) { self.detach(); }
}
