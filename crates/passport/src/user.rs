use serde::{Deserialize, Serialize};

/// A local user as stored in the users collection.
///
/// Users created through an external provider carry `social_account` + `social_account_id` and
/// have neither `username` nor `password` once reconciled.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
  pub id: String,
  pub username: Option<String>,
  /// Salt-prefixed password hash, see [crate::verifier::local::split_salted_hash].
  pub password: Option<String>,
  pub social_account_id: Option<String>,
  pub social_account: Option<String>,
  pub name: Option<String>,
  pub profile: Option<serde_json::Value>,
}

impl UserRecord {
  pub fn is_external(&self) -> bool {
    return self.social_account.is_some() && self.social_account_id.is_some();
  }
}

/// Insert payload. The store insists on credentials for new records, external users get a
/// placeholder that is cleared right after.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewUser {
  pub username: String,
  pub password: String,
  pub social_account_id: Option<String>,
  pub social_account: Option<String>,
  pub name: Option<String>,
  pub profile: Option<serde_json::Value>,
}

/// Field-wise update. `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserUpdate {
  pub username: Option<Option<String>>,
  pub password: Option<Option<String>>,
  pub profile: Option<serde_json::Value>,
}

impl UserUpdate {
  pub fn clear_credentials() -> Self {
    return Self {
      username: Some(None),
      password: Some(None),
      profile: None,
    };
  }

  pub fn profile(profile: serde_json::Value) -> Self {
    return Self {
      profile: Some(profile),
      ..Default::default()
    };
  }

  pub(crate) fn apply(self, user: &mut UserRecord) {
    if let Some(username) = self.username {
      user.username = username;
    }
    if let Some(password) = self.password {
      user.password = password;
    }
    if let Some(profile) = self.profile {
      user.profile = Some(profile);
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UserQuery {
  Id(String),
  Username(String),
  SocialAccount {
    provider: String,
    external_id: String,
  },
}

impl UserQuery {
  pub(crate) fn matches(&self, user: &UserRecord) -> bool {
    return match self {
      Self::Id(id) => &user.id == id,
      Self::Username(username) => user.username.as_ref() == Some(username),
      Self::SocialAccount {
        provider,
        external_id,
      } => {
        user.social_account.as_ref() == Some(provider)
          && user.social_account_id.as_ref() == Some(external_id)
      }
    };
  }
}
