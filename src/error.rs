//! Error types.
//!
//! Every error here describes a caller mistake that was rejected without side
//! effects. Stream failures are not errors of this crate: they travel to
//! observers through [`Observer::error`](crate::observer::Observer::error).

use thiserror::Error;

/// A push into a subject that already reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubjectError {
  #[error("subject has already completed")]
  Completed,
  #[error("subject has already failed")]
  Erred,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
  /// Messages and filters are matched by exact name, an empty one can never
  /// be meaningful.
  #[error("message name must not be empty")]
  EmptyName,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
  #[error("watched object has no property named `{0}`")]
  UnknownProperty(String),
}
