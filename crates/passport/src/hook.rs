use async_trait::async_trait;
use thiserror::Error;

use crate::dispatcher::AuthRequest;
use crate::session::SessionData;
use crate::user::UserRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
  Success,
  Failure,
}

/// What the hook gets to see of a login attempt.
pub struct LoginContext<'a> {
  /// Name of the selected mechanism, e.g. "local" or "github".
  pub mechanism: &'a str,
  /// The reconciled user. `None` for failures.
  pub user: Option<&'a UserRecord>,
  /// Session state prior to binding.
  pub session: &'a SessionData,
  pub request: &'a AuthRequest,
}

#[derive(Debug, Error)]
pub enum HookError {
  /// Rejects an otherwise successful login. The reason is only logged.
  #[error("Veto: {0}")]
  Veto(String),
  #[error("Other: {0}")]
  Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Host extension point, awaited once per login attempt before the session is bound.
///
/// Any error on a successful attempt turns it into a failure. Errors on failed attempts are
/// logged and otherwise ignored.
#[async_trait]
pub trait LoginHook: Send + Sync {
  async fn on_login(
    &self,
    ctx: LoginContext<'_>,
    outcome: LoginOutcome,
  ) -> Result<(), HookError>;
}
