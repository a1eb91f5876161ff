use base64::prelude::*;
use log::*;
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::store::{StoreError, UserStore};
use crate::user::{NewUser, UserQuery, UserRecord, UserUpdate};
use crate::verifier::ExternalIdentity;

/// Find-or-create the local user owning an external identity.
///
/// Known users get their profile refreshed (last login wins). New users are inserted with a
/// placeholder username and password of `<provider>_<external id>`, which the store insists on.
/// Either way, username and password are cleared afterwards so that external users can never log
/// in locally.
pub async fn reconcile(
  users: &dyn UserStore,
  identity: &ExternalIdentity,
) -> Result<UserRecord, AuthError> {
  let query = UserQuery::SocialAccount {
    provider: identity.provider.clone(),
    external_id: identity.external_id.clone(),
  };

  let mut user = match users.first(&query).await? {
    Some(existing) => refresh_profile(users, existing, identity).await?,
    None => {
      let placeholder = placeholder_username(identity);
      let new_user = NewUser {
        username: placeholder.clone(),
        password: placeholder,
        social_account_id: Some(identity.external_id.clone()),
        social_account: Some(identity.provider.clone()),
        name: identity.display_name.clone(),
        profile: Some(identity.raw_profile.clone()),
      };

      match users.insert(new_user).await {
        Ok(user) => {
          info!(
            "Created user {} for {} id {}",
            user.id, identity.provider, identity.external_id
          );
          user
        }
        Err(StoreError::Conflict) => {
          // Lost a race against a concurrent first login of the same identity.
          debug!("Concurrent first login, continuing with existing user");
          let Some(existing) = users.first(&query).await? else {
            // Nobody owns the identity, thus the placeholder username itself is taken.
            warn!(
              "Cannot create user for {} id {}: username {} is taken by another user",
              identity.provider, identity.external_id, placeholder_username(identity)
            );
            return Err(StoreError::Conflict.into());
          };
          refresh_profile(users, existing, identity).await?
        }
        Err(err) => return Err(err.into()),
      }
    }
  };

  users
    .update(&user.id, UserUpdate::clear_credentials())
    .await?;
  user.username = None;
  user.password = None;

  return Ok(user);
}

fn placeholder_username(identity: &ExternalIdentity) -> String {
  return format!("{}_{}", identity.provider, identity.external_id);
}

async fn refresh_profile(
  users: &dyn UserStore,
  mut user: UserRecord,
  identity: &ExternalIdentity,
) -> Result<UserRecord, AuthError> {
  users
    .update(&user.id, UserUpdate::profile(identity.raw_profile.clone()))
    .await?;
  user.profile = Some(identity.raw_profile.clone());
  return Ok(user);
}

/// Stable per-user hash stored alongside the session.
///
/// External users hash to their provider + external id. Local users hash to a digest of their
/// username and stored password, so a password change invalidates it. `None` for records that
/// have neither.
pub fn identity_hash(user: &UserRecord) -> Option<String> {
  if user.is_external() {
    return Some(format!(
      "{}{}",
      user.social_account.as_deref()?,
      user.social_account_id.as_deref()?
    ));
  }

  let (Some(username), Some(password)) = (&user.username, &user.password) else {
    return None;
  };

  let mut sha = Sha256::new();
  sha.update(username);
  sha.update(password);
  return Some(BASE64_URL_SAFE_NO_PAD.encode(sha.finalize()));
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::Arc;

  use super::*;
  use crate::store::MemoryUserStore;

  fn github_identity(external_id: &str, login: &str) -> ExternalIdentity {
    return ExternalIdentity {
      external_id: external_id.to_string(),
      provider: "github".to_string(),
      display_name: Some(login.to_string()),
      raw_profile: json!({"id": external_id, "login": login}),
    };
  }

  #[tokio::test]
  async fn test_reconcile_creates_once() {
    let users = MemoryUserStore::new();

    let first = reconcile(&users, &github_identity("999", "octocat"))
      .await
      .unwrap();
    assert_eq!(first.social_account_id.as_deref(), Some("999"));
    assert_eq!(first.social_account.as_deref(), Some("github"));
    assert_eq!(first.name.as_deref(), Some("octocat"));
    assert_eq!(first.username, None);
    assert_eq!(first.password, None);

    let second = reconcile(&users, &github_identity("999", "renamed"))
      .await
      .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.profile, Some(json!({"id": "999", "login": "renamed"})));

    let stored = users.users();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].username, None);
    assert_eq!(stored[0].password, None);
    assert_eq!(stored[0].profile, Some(json!({"id": "999", "login": "renamed"})));
    // Name is only set at creation.
    assert_eq!(stored[0].name.as_deref(), Some("octocat"));
  }

  /// Store reporting "not found" once before an insert conflict, as seen by the loser of a race.
  struct RacingStore {
    inner: MemoryUserStore,
    hide_once: parking_lot::Mutex<bool>,
  }

  #[async_trait]
  impl UserStore for RacingStore {
    async fn first(&self, query: &UserQuery) -> Result<Option<UserRecord>, StoreError> {
      if std::mem::take(&mut *self.hide_once.lock()) {
        return Ok(None);
      }
      return self.inner.first(query).await;
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
      return self.inner.insert(user).await;
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<(), StoreError> {
      return self.inner.update(id, update).await;
    }
  }

  #[tokio::test]
  async fn test_reconcile_insert_conflict() {
    let users = Arc::new(RacingStore {
      inner: MemoryUserStore::new(),
      hide_once: parking_lot::Mutex::new(false),
    });

    let winner = reconcile(users.as_ref(), &github_identity("999", "octocat"))
      .await
      .unwrap();

    *users.hide_once.lock() = true;
    let loser = reconcile(users.as_ref(), &github_identity("999", "octocat"))
      .await
      .unwrap();

    assert_eq!(loser.id, winner.id);
    assert_eq!(users.inner.len(), 1);
  }

  #[tokio::test]
  async fn test_reconcile_placeholder_taken() {
    let users = MemoryUserStore::new();
    users
      .insert(NewUser {
        username: "github_999".to_string(),
        password: "hash".to_string(),
        ..Default::default()
      })
      .await
      .unwrap();

    let result = reconcile(&users, &github_identity("999", "octocat")).await;
    assert!(
      matches!(result, Err(AuthError::Storage(StoreError::Conflict))),
      "{result:?}"
    );

    // The local user is left alone.
    let stored = users.users();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].username.as_deref(), Some("github_999"));
    assert_eq!(stored[0].social_account, None);

    // Other identities are unaffected.
    reconcile(&users, &github_identity("1000", "hubot"))
      .await
      .unwrap();
  }

  #[test]
  fn test_identity_hash() {
    let external = UserRecord {
      id: "1".to_string(),
      social_account: Some("github".to_string()),
      social_account_id: Some("999".to_string()),
      ..Default::default()
    };
    assert_eq!(identity_hash(&external).as_deref(), Some("github999"));

    let local = UserRecord {
      id: "2".to_string(),
      username: Some("alice".to_string()),
      password: Some("saltHASH".to_string()),
      ..Default::default()
    };
    let hash = identity_hash(&local).unwrap();
    assert_ne!(
      hash,
      identity_hash(&UserRecord {
        password: Some("saltOTHER".to_string()),
        ..local.clone()
      })
      .unwrap()
    );

    assert_eq!(identity_hash(&UserRecord::default()), None);
  }
}
