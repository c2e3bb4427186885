//! # rxpattern: subjects and a message center
//!
//! In-process event distribution on top of a small observer protocol:
//! producers push values, a failure or completion to subscribed observers.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::{cell::RefCell, convert::Infallible, rc::Rc};
//! use rxpattern::prelude::*;
//!
//! // Keep the last two values and replay them to late subscribers
//! let mut subject = LocalReactiveSubject::<i32, Infallible>::new_full(true, false, 2);
//! (1..=3).for_each(|v| subject.next(v));
//!
//! let seen = Rc::new(RefCell::new(vec![]));
//! let c_seen = seen.clone();
//! subject.subscribe_with(FnMutObserver(move |v: i32| c_seen.borrow_mut().push(v)));
//! assert_eq!(*seen.borrow(), vec![2, 3]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observer`] / [`Observable`] | The consumer and producer sides of the protocol |
//! | [`LocalReactiveSubject`] / [`SharedReactiveSubject`] | Multicast with cache, replay and async flush |
//! | [`PropertySubject`] | Subject mirroring a property of a watched object |
//! | [`MessageCenter`] | Process-wide named message bus with filters and delayed sends |
//! | [`Scheduler`] | Timers behind delayed sends |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): futures thread pool timer for delayed
//!   sends
//! - **`tokio-scheduler`**: [`TokioScheduler`](scheduler::TokioScheduler) on a
//!   tokio runtime
//!
//! The crate logs through `tracing` and never installs a subscriber.
//!
//! [`Observer`]: observer::Observer
//! [`Observable`]: observable::Observable
//! [`LocalReactiveSubject`]: subject::LocalReactiveSubject
//! [`SharedReactiveSubject`]: subject::SharedReactiveSubject
//! [`PropertySubject`]: subject::PropertySubject
//! [`MessageCenter`]: message_center::MessageCenter
//! [`Scheduler`]: scheduler::Scheduler

pub mod error;
pub mod message;
pub mod message_center;
pub mod observable;
pub mod observer;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subject;

// Re-export the prelude module
pub use prelude::*;

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
