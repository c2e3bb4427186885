use std::{
  any::Any,
  fmt,
  sync::{Arc, Weak},
};

use super::MessageCenter;
use crate::message::{Message, ObjectRef, UserData};

/// Called with the center that dispatched, the message and the filter's own
/// user data.
pub type FilterCallback = Arc<dyn Fn(&MessageCenter, &Message, Option<&UserData>) + Send + Sync>;

/// Plain listener, called for every message.
pub type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Identifies a filter registered with [`MessageCenter::filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(pub(crate) u64);

/// Identifies a listener registered with [`MessageCenter::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct Filter {
  pub(crate) id: FilterId,
  // Weak so a filter does not keep its sender alive. The allocation stays
  // reserved while the filter exists, so the address cannot be reused.
  sender: Option<Weak<dyn Any + Send + Sync>>,
  name: Box<str>,
  callback: FilterCallback,
  user_data: Option<UserData>,
}

impl Filter {
  pub(crate) fn new(
    id: FilterId, sender: Option<&ObjectRef>, name: &str, callback: FilterCallback,
    user_data: Option<UserData>,
  ) -> Self {
    Self { id, sender: sender.map(Arc::downgrade), name: name.into(), callback, user_data }
  }

  /// Sender unset or identical, and exact name match.
  pub(crate) fn matches(&self, message: &Message) -> bool {
    let sender_ok = match &self.sender {
      None => true,
      Some(sender) => std::ptr::addr_eq(sender.as_ptr(), Arc::as_ptr(message.sender())),
    };
    sender_ok && *self.name == *message.name()
  }

  /// The filter watches a sender that no longer exists, so it can never
  /// match again.
  pub(crate) fn is_orphaned(&self) -> bool {
    self.sender.as_ref().is_some_and(|sender| sender.strong_count() == 0)
  }

  pub(crate) fn invoke(&self, center: &MessageCenter, message: &Message) {
    (self.callback)(center, message, self.user_data.as_ref())
  }
}

impl fmt::Debug for Filter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Filter")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("any_sender", &self.sender.is_none())
      .finish()
  }
}
