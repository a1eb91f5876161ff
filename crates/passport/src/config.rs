use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
  DEFAULT_SALT_LEN, DEFAULT_USERS_COLLECTION, ENV_BASE_URL, ENV_BASE_URL_LEGACY,
};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Parse error: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("Invalid config: {0}")]
  Invalid(String),
  #[error("Missing: {0}")]
  Missing(&'static str),
}

/// Operator settings of the auth resource.
///
/// Key names follow the resource's settings dashboard, e.g. `usersCollection` or `allowGitHub`.
/// Boolean `allow*` flags only request a mechanism, whether it is actually enabled is decided by
/// [crate::mechanism::Mechanisms::from_config], which also requires credentials and `baseURL`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PassportConfig {
  pub users_collection: Option<String>,
  #[serde(rename = "SALT_LEN")]
  pub salt_len: Option<usize>,
  #[serde(rename = "baseURL")]
  pub base_url: Option<String>,
  /// Case-insensitive regular expression gating the `redirectURL` query parameter. Unset means
  /// no redirects are allowed.
  #[serde(rename = "allowedRedirectURLs")]
  pub allowed_redirect_urls: Option<String>,
  /// Don't append `sid` and `uid` to redirect URLs. Clients can still get the session id from
  /// the cookie.
  pub disable_session_id: bool,

  pub allow_local: bool,
  pub allow_twitter: bool,
  pub allow_facebook: bool,
  #[serde(rename = "allowGitHub")]
  pub allow_github: bool,
  pub allow_google: bool,

  pub twitter_consumer_key: Option<String>,
  pub twitter_consumer_secret: Option<String>,

  pub facebook_app_id: Option<String>,
  pub facebook_app_secret: Option<String>,
  /// JSON array, e.g. `["email", "user_friends"]`.
  pub facebook_scope: Option<String>,

  pub github_client_id: Option<String>,
  pub github_client_secret: Option<String>,
  /// JSON array, e.g. `["repo"]`.
  pub github_scope: Option<String>,

  pub google_client_id: Option<String>,
  pub google_client_secret: Option<String>,
  /// Space separated, defaults to "profile email".
  pub google_scope: Option<String>,
}

impl PassportConfig {
  /// Parses the JSON settings and applies environment fallbacks.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let config: PassportConfig = serde_json::from_str(json)?;
    return Ok(config.with_env_fallbacks());
  }

  pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
    let config: PassportConfig = serde_json::from_value(value)?;
    return Ok(config.with_env_fallbacks());
  }

  /// Falls back to `PASSPORT_BASE_URL`, then `DPD_PASSPORT_BASEURL`, for a missing `baseURL`.
  pub fn with_env_fallbacks(self) -> Self {
    return self.with_fallbacks_from(|name| std::env::var(name).ok());
  }

  fn with_fallbacks_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if non_empty(&self.base_url).is_some() {
      return self;
    }

    for name in [ENV_BASE_URL, ENV_BASE_URL_LEGACY] {
      if let Some(base_url) = lookup(name).filter(|v| !v.is_empty()) {
        debug!("Using {name} as baseURL: {base_url}");
        self.base_url = Some(base_url);
        break;
      }
    }
    return self;
  }

  pub fn users_collection(&self) -> &str {
    return non_empty(&self.users_collection).unwrap_or(DEFAULT_USERS_COLLECTION);
  }

  pub fn salt_len(&self) -> usize {
    return match self.salt_len {
      Some(len) if len > 0 => len,
      _ => DEFAULT_SALT_LEN,
    };
  }

  pub fn base_url(&self) -> Option<&str> {
    return non_empty(&self.base_url);
  }

  pub fn allowed_redirect_urls(&self) -> Option<&str> {
    return non_empty(&self.allowed_redirect_urls);
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let collection = self.users_collection();
    if !collection
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
      return Err(ConfigError::Invalid(format!(
        "usersCollection must be alphanumeric: {collection}"
      )));
    }
    return Ok(());
  }
}

/// Settings are often edited through forms, where clearing a field leaves an empty string behind.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
  return value.as_deref().filter(|v| !v.is_empty());
}
