use thiserror::Error;

use crate::session::SessionError;
use crate::store::StoreError;

/// Internal failure taxonomy of a login attempt.
///
/// None of these ever reach the caller verbatim: the dispatcher logs them and renders the same
/// generic failure regardless of the cause.
#[derive(Debug, Error)]
pub enum AuthError {
  #[error("Bad credentials: {0}")]
  BadCredentials(&'static str),
  #[error("Storage: {0}")]
  Storage(#[from] StoreError),
  #[error("Session: {0}")]
  Session(#[from] SessionError),
  #[error("Failed dependency: {0}")]
  FailedDependency(Box<dyn std::error::Error + Send + Sync>),
  #[error("Internal: {0}")]
  Internal(Box<dyn std::error::Error + Send + Sync>),
}
