//! Endpoints and profile layouts of the built-in OAuth 2 providers.
//!
//! Twitter only speaks OAuth 1.0a for user login and has no entry here, hosts wanting Twitter
//! logins need to register their own [crate::verifier::Verifier].

mod facebook;
mod github;
mod google;

use serde_json::Value;

use crate::error::AuthError;
use crate::mechanism::ProviderId;
use crate::verifier::ExternalIdentity;

/// Static per-provider settings.
#[derive(Debug)]
pub struct ProviderDefaults {
  pub auth_url: &'static str,
  pub token_url: &'static str,
  pub user_api_url: &'static str,
  pub scopes: &'static [&'static str],
}

pub fn defaults(id: ProviderId) -> Option<&'static ProviderDefaults> {
  return match id {
    ProviderId::Twitter => None,
    ProviderId::Facebook => Some(&facebook::DEFAULTS),
    ProviderId::GitHub => Some(&github::DEFAULTS),
    ProviderId::Google => Some(&google::DEFAULTS),
  };
}

/// Maps the provider's user info response to an external identity.
pub(crate) fn external_identity(
  id: ProviderId,
  profile: Value,
) -> Result<ExternalIdentity, AuthError> {
  let (external_id, display_name) = match id {
    ProviderId::Twitter => None,
    ProviderId::Facebook => facebook::identity(&profile),
    ProviderId::GitHub => github::identity(&profile),
    ProviderId::Google => google::identity(&profile),
  }
  .ok_or(AuthError::BadCredentials("profile without id"))?;

  if external_id.is_empty() {
    return Err(AuthError::BadCredentials("profile without id"));
  }

  return Ok(ExternalIdentity {
    external_id,
    provider: id.name().to_string(),
    display_name,
    raw_profile: profile,
  });
}

/// Some providers send numeric ids, others strings.
fn id_field(profile: &Value, key: &str) -> Option<String> {
  return match profile.get(key)? {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  };
}

fn str_field(profile: &Value, key: &str) -> Option<String> {
  return profile
    .get(key)
    .and_then(|v| v.as_str())
    .filter(|s| !s.is_empty())
    .map(|s| s.to_string());
}
