//! Messages carried by the [`MessageCenter`](crate::message_center::MessageCenter).

use std::{any::Any, fmt, sync::Arc};

use crate::error::MessageError;

/// Shared reference to the object that sent a message. Filters compare
/// senders by identity.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Opaque payload attached to a message or a filter.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// An immutable named event. Cloning is cheap: every part is shared.
///
/// ```rust
/// use std::sync::Arc;
/// use rxpattern::message::{Message, ObjectRef};
///
/// let window: ObjectRef = Arc::new("main window");
/// let msg = Message::with_user_data(window.clone(), "resized", Arc::new((800, 600))).unwrap();
/// assert_eq!(msg.name(), "resized");
/// assert!(msg.is_from(&window));
/// assert_eq!(msg.user_data_as::<(i32, i32)>(), Some(&(800, 600)));
/// ```
#[derive(Clone)]
pub struct Message {
  sender: ObjectRef,
  name: Arc<str>,
  user_data: Option<UserData>,
}

impl Message {
  pub fn new(sender: ObjectRef, name: &str) -> Result<Self, MessageError> {
    Self::build(sender, name, None)
  }

  pub fn with_user_data(
    sender: ObjectRef, name: &str, user_data: UserData,
  ) -> Result<Self, MessageError> {
    Self::build(sender, name, Some(user_data))
  }

  pub(crate) fn build(
    sender: ObjectRef, name: &str, user_data: Option<UserData>,
  ) -> Result<Self, MessageError> {
    if name.is_empty() {
      return Err(MessageError::EmptyName);
    }
    Ok(Self { sender, name: Arc::from(name), user_data })
  }

  #[inline]
  pub fn sender(&self) -> &ObjectRef { &self.sender }

  #[inline]
  pub fn name(&self) -> &str { &self.name }

  #[inline]
  pub fn user_data(&self) -> Option<&UserData> { self.user_data.as_ref() }

  /// The payload, if there is one of type `T`.
  pub fn user_data_as<T: Any>(&self) -> Option<&T> { self.user_data.as_deref()?.downcast_ref() }

  /// The sender, if it is a `T`.
  pub fn sender_as<T: Any>(&self) -> Option<&T> { (*self.sender).downcast_ref() }

  /// Whether `sender` is the very object that sent this message.
  pub fn is_from(&self, sender: &ObjectRef) -> bool { same_object(&self.sender, sender) }
}

pub(crate) fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
  std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl fmt::Debug for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Message")
      .field("name", &self.name)
      .field("sender", &Arc::as_ptr(&self.sender))
      .field("user_data", &self.user_data.is_some())
      .finish()
  }
}
