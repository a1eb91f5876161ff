use serde_json::Value;

use crate::verifier::providers::{ProviderDefaults, id_field, str_field};

pub(super) const DEFAULTS: ProviderDefaults = ProviderDefaults {
  auth_url: "https://www.facebook.com/v18.0/dialog/oauth",
  token_url: "https://graph.facebook.com/v18.0/oauth/access_token",
  // The graph API only returns the requested fields.
  user_api_url: "https://graph.facebook.com/v18.0/me?fields=id,name,email",
  scopes: &[],
};

pub(super) fn identity(profile: &Value) -> Option<(String, Option<String>)> {
  return Some((id_field(profile, "id")?, str_field(profile, "name")));
}
