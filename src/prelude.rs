//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Errors
pub use crate::error::{MessageError, PropertyError, SubjectError};
// Messages
pub use crate::message::{Message, ObjectRef, UserData};
pub use crate::message_center::{DistributedMessageCenter, FilterId, ListenerId, MessageCenter};
// Core traits
pub use crate::observable::Observable;
pub use crate::observer::{
  FnMutObserver, IntoObserverRef, LocalObserverRef, Observer, ObserverFns, SharedObserverRef,
};
// Shared handles
pub use crate::rc::{MutArc, MutRc, PtrEq, RcDeref, RcDerefMut};
// Scheduler Core types
pub use crate::scheduler::{Scheduler, Task, TaskHandle};
// Subject
pub use crate::subject::{
  HandlerId, LocalReactiveSubject, NotifyHandler, NotifyProperty, PropertySubject,
  SharedReactiveSubject, SubjectConfig, SubjectState,
};
