use serde_json::Value;

use crate::verifier::providers::{ProviderDefaults, id_field, str_field};

pub(super) const DEFAULTS: ProviderDefaults = ProviderDefaults {
  auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
  token_url: "https://oauth2.googleapis.com/token",
  user_api_url: "https://openidconnect.googleapis.com/v1/userinfo",
  scopes: &["profile", "email"],
};

pub(super) fn identity(profile: &Value) -> Option<(String, Option<String>)> {
  return Some((id_field(profile, "sub")?, str_field(profile, "name")));
}
