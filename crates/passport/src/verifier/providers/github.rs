use serde_json::Value;

use crate::verifier::providers::{ProviderDefaults, id_field, str_field};

pub(super) const DEFAULTS: ProviderDefaults = ProviderDefaults {
  auth_url: "https://github.com/login/oauth/authorize",
  token_url: "https://github.com/login/oauth/access_token",
  user_api_url: "https://api.github.com/user",
  // Public profile information only.
  scopes: &[],
};

/// See https://docs.github.com/en/rest/users/users#get-the-authenticated-user. `name` is often
/// unset, fall back to the login handle.
pub(super) fn identity(profile: &Value) -> Option<(String, Option<String>)> {
  let id = id_field(profile, "id")?;
  let name = str_field(profile, "name").or_else(|| str_field(profile, "login"));
  return Some((id, name));
}
