//! Named, filterable publish/subscribe bus.
//!
//! Code anywhere in the process obtains the center with
//! [`MessageCenter::get`] and [`send`](MessageCenter::send)s
//! [`Message`]s. Every message first reaches the plain listeners
//! ([`connect`](MessageCenter::connect)), then each filter
//! ([`filter`](MessageCenter::filter)) whose sender and name match, in
//! registration order.
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc,
//! };
//! use rxpattern::prelude::*;
//!
//! let center = MessageCenter::new();
//! let pings = Arc::new(AtomicUsize::new(0));
//! let c_pings = pings.clone();
//! center
//!   .filter(None, "ping", move |_, _, _| { c_pings.fetch_add(1, Ordering::SeqCst); }, None)
//!   .unwrap();
//!
//! let sender: ObjectRef = Arc::new("client");
//! center.send_full(sender.clone(), "ping", None).unwrap();
//! center.send_full(sender, "pong", None).unwrap();
//! assert_eq!(pings.load(Ordering::SeqCst), 1);
//! ```
//!
//! Delivery is synchronous on the sending thread. The center's lock is never
//! held while a listener or filter runs, so callbacks may send, register or
//! remove filters; such changes apply from the next message on.

mod distributed;
mod filter;

use std::{sync::Arc, time::Duration};

pub use distributed::DistributedMessageCenter;
use filter::Filter;
pub use filter::{FilterCallback, FilterId, Listener, ListenerId};
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use crate::{
  error::MessageError,
  message::{Message, ObjectRef, UserData},
  observer::{Observer, SharedObserverRef},
  rc::{MutArc, RcDeref, RcDerefMut},
  scheduler::{Scheduler, Task, TaskHandle},
};

static MESSAGE_CENTER: Lazy<MessageCenter> = Lazy::new(MessageCenter::new);

/// A message waiting for its timer, together with the center that sends it.
pub struct DelayedSend {
  center: MessageCenter,
  message: Message,
}

impl DelayedSend {
  fn fire(self) { self.center.send(&self.message) }
}

/// Timer used for delayed sends.
pub type DelayScheduler = Arc<dyn Scheduler<DelayedSend> + Send + Sync>;

#[derive(Default)]
struct CenterState {
  listeners: Vec<(ListenerId, Listener)>,
  filters: Vec<Arc<Filter>>,
  next_id: u64,
}

impl CenterState {
  fn next_id(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }
}

/// Message hub. Clones share the same listeners and filters.
#[derive(Clone)]
pub struct MessageCenter {
  state: MutArc<CenterState>,
  scheduler: DelayScheduler,
}

impl Default for MessageCenter {
  fn default() -> Self { Self::new() }
}

impl MessageCenter {
  /// The process-wide center, created on first access.
  pub fn get() -> &'static MessageCenter { &MESSAGE_CENTER }

  /// A standalone center using the default timer.
  pub fn new() -> Self { Self::with_shared_scheduler(default_scheduler()) }

  /// A standalone center whose delayed sends run on `scheduler`.
  pub fn with_scheduler<S>(scheduler: S) -> Self
  where
    S: Scheduler<DelayedSend> + Send + Sync + 'static,
  {
    Self::with_shared_scheduler(Arc::new(scheduler))
  }

  fn with_shared_scheduler(scheduler: DelayScheduler) -> Self {
    Self { state: MutArc::own(CenterState::default()), scheduler }
  }

  pub fn listener_count(&self) -> usize { self.state.rc_deref().listeners.len() }

  pub fn filter_count(&self) -> usize { self.state.rc_deref().filters.len() }

  /// Call `listener` for every message sent through this center.
  pub fn connect<F>(&self, listener: F) -> ListenerId
  where
    F: Fn(&Message) + Send + Sync + 'static,
  {
    let mut state = self.state.rc_deref_mut();
    let id = ListenerId(state.next_id());
    let listener: Listener = Arc::new(listener);
    state.listeners.push((id, listener));
    debug!(?id, "listener connected");
    id
  }

  /// Returns whether the listener was connected.
  pub fn disconnect(&self, id: ListenerId) -> bool {
    let removed = {
      let mut state = self.state.rc_deref_mut();
      let idx = state.listeners.iter().position(|(l, _)| *l == id);
      idx.map(|idx| state.listeners.remove(idx))
    };
    debug!(?id, found = removed.is_some(), "listener disconnected");
    removed.is_some()
  }

  /// Register a filter: `callback` runs for every message named exactly
  /// `name`, sent by `sender` when one is given or by anyone otherwise.
  ///
  /// Filters are not de-duplicated, registering twice fires twice.
  pub fn filter<F>(
    &self, sender: Option<&ObjectRef>, name: &str, callback: F, user_data: Option<UserData>,
  ) -> Result<FilterId, MessageError>
  where
    F: Fn(&MessageCenter, &Message, Option<&UserData>) + Send + Sync + 'static,
  {
    if name.is_empty() {
      error!("filter rejected: empty name");
      return Err(MessageError::EmptyName);
    }
    let mut state = self.state.rc_deref_mut();
    let id = FilterId(state.next_id());
    state
      .filters
      .push(Arc::new(Filter::new(id, sender, name, Arc::new(callback), user_data)));
    debug!(?id, name, any_sender = sender.is_none(), "filter registered");
    Ok(id)
  }

  /// Forward every matching message to `observer`.
  pub fn filter_observer<E: 'static>(
    &self, sender: Option<&ObjectRef>, name: &str, observer: SharedObserverRef<Message, E>,
  ) -> Result<FilterId, MessageError> {
    self.filter(
      sender,
      name,
      move |_, message, _| observer.clone().next(message.clone()),
      None,
    )
  }

  /// Returns whether the filter was registered.
  pub fn remove_filter(&self, id: FilterId) -> bool {
    let removed = {
      let mut state = self.state.rc_deref_mut();
      let idx = state.filters.iter().position(|f| f.id == id);
      idx.map(|idx| state.filters.remove(idx))
    };
    debug!(?id, found = removed.is_some(), "filter removed");
    removed.is_some()
  }

  /// Deliver `message` to every listener, then to every matching filter.
  ///
  /// Filters whose sender has been dropped are removed on the way.
  pub fn send(&self, message: &Message) {
    let (listeners, filters, orphans) = {
      let mut state = self.state.rc_deref_mut();
      let (orphans, kept): (Vec<_>, Vec<_>) =
        std::mem::take(&mut state.filters).into_iter().partition(|f| f.is_orphaned());
      state.filters = kept;
      let listeners: SmallVec<[Listener; 2]> =
        state.listeners.iter().map(|(_, l)| l.clone()).collect();
      let filters: SmallVec<[Arc<Filter>; 4]> =
        state.filters.iter().filter(|f| f.matches(message)).cloned().collect();
      (listeners, filters, orphans)
    };
    if !orphans.is_empty() {
      debug!(pruned = orphans.len(), "dropped filters of dead senders");
      drop(orphans);
    }
    trace!(
      name = message.name(),
      listeners = listeners.len(),
      filters = filters.len(),
      "dispatching message"
    );

    for listener in &listeners {
      listener(message);
    }
    for filter in &filters {
      filter.invoke(self, message);
    }
  }

  /// Send `message` once `delay` has elapsed, on the center's scheduler. A
  /// zero delay sends synchronously.
  ///
  /// The returned handle cancels the send with
  /// [`unsubscribe`](TaskHandle::unsubscribe); dropping it does not.
  pub fn send_with_delay(&self, message: Message, delay: Duration) -> TaskHandle {
    if delay.is_zero() {
      self.send(&message);
      return TaskHandle::finished();
    }
    debug!(name = message.name(), ?delay, "message scheduled");
    let task = Task::new(DelayedSend { center: self.clone(), message }, DelayedSend::fire);
    self.scheduler.schedule(task, Some(delay))
  }

  /// Build a message and send it.
  pub fn send_full(
    &self, sender: ObjectRef, name: &str, user_data: Option<UserData>,
  ) -> Result<(), MessageError> {
    let message = Message::build(sender, name, user_data)
      .inspect_err(|err| error!(%err, "send rejected"))?;
    self.send(&message);
    Ok(())
  }

  /// Build a message and send it after `delay`.
  pub fn send_full_with_delay(
    &self, sender: ObjectRef, name: &str, user_data: Option<UserData>, delay: Duration,
  ) -> Result<TaskHandle, MessageError> {
    let message = Message::build(sender, name, user_data)
      .inspect_err(|err| error!(%err, "send rejected"))?;
    Ok(self.send_with_delay(message, delay))
  }
}

fn default_scheduler() -> DelayScheduler {
  #[cfg(feature = "futures-scheduler")]
  {
    match crate::scheduler::ThreadPoolScheduler::shared() {
      Ok(pool) => return Arc::new(pool),
      Err(err) => tracing::warn!(%err, "thread pool unavailable, using a thread per timer"),
    }
  }
  Arc::new(crate::scheduler::ThreadScheduler)
}

#[cfg(test)]
mod tests {
  use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Mutex,
  };

  use tracing_test::traced_test;

  use super::*;
  use crate::{
    observer::ObserverFns,
    scheduler::TestScheduler,
    subject::SharedReactiveSubject,
  };

  type Log = Arc<Mutex<Vec<String>>>;

  fn object() -> ObjectRef { Arc::new(()) }

  fn record(
    center: &MessageCenter, log: &Log, sender: Option<&ObjectRef>, name: &str, tag: &'static str,
  ) -> FilterId {
    let log = log.clone();
    let callback = move |_: &MessageCenter, m: &Message, _: Option<&UserData>| {
      log.lock().unwrap().push(format!("{tag}:{}", m.name()))
    };
    center.filter(sender, name, callback, None).unwrap()
  }

  #[rxpattern_macro::test]
  fn filter_without_sender_matches_any_sender() {
    let center = MessageCenter::new();
    let log = Log::default();
    record(&center, &log, None, "x", "f");

    center.send_full(object(), "x", None).unwrap();
    center.send_full(object(), "x", None).unwrap();
    center.send_full(object(), "y", None).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["f:x", "f:x"]);
  }

  #[rxpattern_macro::test]
  fn ping_filter_fires_once_for_ping_and_never_for_pong() {
    let center = MessageCenter::new();
    let log = Log::default();
    record(&center, &log, None, "ping", "f");
    let obj = object();

    center.send_full(obj.clone(), "ping", None).unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
    center.send_full(obj, "pong", None).unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
  }

  #[rxpattern_macro::test]
  fn filter_with_sender_matches_only_that_sender() {
    let center = MessageCenter::new();
    let log = Log::default();
    let mine = object();
    record(&center, &log, Some(&mine), "tick", "mine");

    center.send_full(object(), "tick", None).unwrap();
    center.send_full(mine, "tick", None).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["mine:tick"]);
  }

  #[rxpattern_macro::test]
  fn listeners_run_before_filters_in_registration_order() {
    let center = MessageCenter::new();
    let log = Log::default();
    record(&center, &log, None, "x", "filter-1");
    let c_log = log.clone();
    center.connect(move |m| c_log.lock().unwrap().push(format!("listener:{}", m.name())));
    record(&center, &log, None, "x", "filter-2");
    record(&center, &log, None, "x", "filter-1");

    center.send_full(object(), "x", None).unwrap();
    assert_eq!(
      *log.lock().unwrap(),
      vec!["listener:x", "filter-1:x", "filter-2:x", "filter-1:x"]
    );
    assert_eq!(center.filter_count(), 3);
    assert_eq!(center.listener_count(), 1);
  }

  #[rxpattern_macro::test]
  fn callback_receives_center_message_and_user_data() {
    let center = MessageCenter::new();
    let seen = Arc::new(Mutex::new(None));
    let c_seen = seen.clone();
    center
      .filter(
        None,
        "resize",
        move |_, m, data| {
          let filter_tag = data.and_then(|d| d.downcast_ref::<&str>()).copied();
          *c_seen.lock().unwrap() = Some((m.user_data_as::<u32>().copied(), filter_tag));
        },
        Some(Arc::new("layout")),
      )
      .unwrap();

    center.send_full(object(), "resize", Some(Arc::new(640u32))).unwrap();
    assert_eq!(*seen.lock().unwrap(), Some((Some(640), Some("layout"))));
  }

  #[test]
  #[traced_test]
  fn empty_names_are_rejected() {
    let center = MessageCenter::new();
    let err = center.filter(None, "", |_, _, _| {}, None);
    assert_eq!(err, Err(MessageError::EmptyName));
    assert_eq!(center.filter_count(), 0);
    assert_eq!(center.send_full(object(), "", None), Err(MessageError::EmptyName));
    assert!(logs_contain("send rejected"));
  }

  #[rxpattern_macro::test]
  fn removed_filter_and_listener_stop_firing() {
    let center = MessageCenter::new();
    let log = Log::default();
    let id = record(&center, &log, None, "x", "f");
    let c_log = log.clone();
    let listener = center.connect(move |_| c_log.lock().unwrap().push("listener".into()));

    assert!(center.remove_filter(id));
    assert!(!center.remove_filter(id));
    assert!(center.disconnect(listener));
    assert!(!center.disconnect(listener));

    center.send_full(object(), "x", None).unwrap();
    assert!(log.lock().unwrap().is_empty());
  }

  #[rxpattern_macro::test]
  fn callbacks_may_use_the_center_reentrantly() {
    let center = MessageCenter::new();
    let log = Log::default();
    let c_log = log.clone();
    center
      .filter(
        None,
        "first",
        move |center, m, _| {
          c_log.lock().unwrap().push("first".into());
          let c_log = c_log.clone();
          center
            .filter(None, "first", move |_, _, _| c_log.lock().unwrap().push("late".into()), None)
            .unwrap();
          center.send_full(m.sender().clone(), "second", None).unwrap();
        },
        None,
      )
      .unwrap();
    record(&center, &log, None, "second", "f");

    center.send_full(object(), "first", None).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["first", "f:second"]);
    assert_eq!(center.filter_count(), 3);
  }

  #[rxpattern_macro::test]
  fn zero_delay_sends_synchronously() {
    let center = MessageCenter::with_scheduler(TestScheduler);
    TestScheduler::init();
    let log = Log::default();
    record(&center, &log, None, "now", "f");

    let handle = center.send_with_delay(Message::new(object(), "now").unwrap(), Duration::ZERO);
    assert!(handle.is_closed());
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(TestScheduler::is_empty());
  }

  #[rxpattern_macro::test]
  fn delayed_send_waits_for_the_delay() {
    let center = MessageCenter::with_scheduler(TestScheduler);
    TestScheduler::init();
    let log = Log::default();
    let c_log = log.clone();
    center
      .filter(
        None,
        "later",
        move |_, _, _| c_log.lock().unwrap().push(format!("{:?}", TestScheduler::now())),
        None,
      )
      .unwrap();

    let handle = center
      .send_full_with_delay(object(), "later", None, Duration::from_millis(100))
      .unwrap();
    TestScheduler::advance_by(Duration::from_millis(99));
    assert!(log.lock().unwrap().is_empty());
    assert!(!handle.is_closed());

    TestScheduler::advance_by(Duration::from_millis(1));
    assert_eq!(*log.lock().unwrap(), vec!["100ms"]);
    assert!(handle.is_closed());
  }

  #[rxpattern_macro::test]
  fn delayed_send_can_be_cancelled() {
    let center = MessageCenter::with_scheduler(TestScheduler);
    TestScheduler::init();
    let log = Log::default();
    record(&center, &log, None, "later", "f");

    let message = Message::new(object(), "later").unwrap();
    let handle = center.send_with_delay(message, Duration::from_secs(1));
    handle.unsubscribe();
    TestScheduler::flush();
    assert!(log.lock().unwrap().is_empty());
  }

  #[rxpattern_macro::test]
  fn cancel_from_the_delivered_callback_is_too_late() {
    let center = MessageCenter::with_scheduler(TestScheduler);
    TestScheduler::init();
    let delivered = Arc::new(Mutex::new(0));
    let slot: Arc<Mutex<Option<TaskHandle>>> = Arc::default();

    let (c_delivered, c_slot) = (delivered.clone(), slot.clone());
    let callback = move |_: &MessageCenter, _: &Message, _: Option<&UserData>| {
      *c_delivered.lock().unwrap() += 1;
      if let Some(handle) = &*c_slot.lock().unwrap() {
        handle.unsubscribe();
      }
    };
    center.filter(None, "later", callback, None).unwrap();

    let handle = center.send_full_with_delay(object(), "later", None, Duration::from_millis(5));
    *slot.lock().unwrap() = Some(handle.unwrap());
    TestScheduler::flush();

    let handle = slot.lock().unwrap().clone().unwrap();
    assert_eq!(*delivered.lock().unwrap(), 1);
    assert!(!handle.is_cancelled());
    assert!(handle.is_closed());
  }

  #[rxpattern_macro::test]
  fn dead_sender_filters_are_pruned_on_send() {
    let center = MessageCenter::new();
    let log = Log::default();
    let sender = object();
    record(&center, &log, Some(&sender), "x", "owned");
    record(&center, &log, None, "x", "any");
    assert_eq!(center.filter_count(), 2);

    drop(sender);
    center.send_full(object(), "x", None).unwrap();
    assert_eq!(center.filter_count(), 1);
    assert_eq!(*log.lock().unwrap(), vec!["any:x"]);
  }

  #[rxpattern_macro::test]
  fn panicking_filter_leaves_the_center_usable() {
    let center = MessageCenter::new();
    let log = Log::default();
    let callback = |_: &MessageCenter, m: &Message, _: Option<&UserData>| {
      if m.name() == "boom" {
        panic!("filter failed");
      }
    };
    center.filter(None, "boom", callback, None).unwrap();
    record(&center, &log, None, "ok", "f");

    let result = catch_unwind(AssertUnwindSafe(|| center.send_full(object(), "boom", None)));
    assert!(result.is_err());

    center.send_full(object(), "ok", None).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["f:ok"]);
    assert_eq!(center.filter_count(), 2);
  }

  #[rxpattern_macro::test]
  fn delayed_send_keeps_message_until_it_fires() {
    let center = MessageCenter::with_scheduler(TestScheduler);
    TestScheduler::init();
    let sender = object();
    let weak = Arc::downgrade(&sender);
    center.send_full_with_delay(sender, "later", None, Duration::from_millis(5)).unwrap();

    assert!(weak.upgrade().is_some());
    TestScheduler::flush();
    assert!(weak.upgrade().is_none());
  }

  #[rxpattern_macro::test]
  fn filter_observer_feeds_a_subject() {
    let center = MessageCenter::new();
    let subject = SharedReactiveSubject::<Message, ()>::new();
    let observer: SharedObserverRef<Message, ()> = SharedObserverRef::new(subject.clone());
    center.filter_observer(None, "ping", observer).unwrap();

    let names = Arc::new(Mutex::new(Vec::new()));
    let c_names = names.clone();
    subject.subscribe_with(ObserverFns::new(
      move |m: Message| c_names.lock().unwrap().push(m.name().to_string()),
      |_: ()| {},
      || {},
    ));

    center.send_full(object(), "ping", None).unwrap();
    center.send_full(object(), "pong", None).unwrap();
    assert_eq!(*names.lock().unwrap(), vec!["ping"]);
    assert_eq!(subject.items().len(), 1);
  }

  #[rxpattern_macro::test]
  fn get_returns_one_instance() {
    assert!(std::ptr::eq(MessageCenter::get(), MessageCenter::get()));
    let a = std::thread::spawn(|| MessageCenter::get() as *const _ as usize).join().unwrap();
    assert_eq!(a, MessageCenter::get() as *const _ as usize);
  }
}
