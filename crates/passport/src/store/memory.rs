use async_trait::async_trait;
use parking_lot::RwLock;

use crate::store::{StoreError, UserStore};
use crate::user::{NewUser, UserQuery, UserRecord, UserUpdate};

/// Users kept in process memory, mostly useful for tests and demos.
#[derive(Default)]
pub struct MemoryUserStore {
  users: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
  pub fn new() -> Self {
    return Self::default();
  }

  pub fn len(&self) -> usize {
    return self.users.read().len();
  }

  pub fn is_empty(&self) -> bool {
    return self.users.read().is_empty();
  }

  pub fn users(&self) -> Vec<UserRecord> {
    return self.users.read().clone();
  }
}

#[async_trait]
impl UserStore for MemoryUserStore {
  async fn first(&self, query: &UserQuery) -> Result<Option<UserRecord>, StoreError> {
    return Ok(self.users.read().iter().find(|u| query.matches(u)).cloned());
  }

  async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
    if user.username.is_empty() {
      return Err(StoreError::Invalid("username required"));
    }
    if user.password.is_empty() {
      return Err(StoreError::Invalid("password required"));
    }

    let mut users = self.users.write();
    let username = UserQuery::Username(user.username.clone());
    if users.iter().any(|u| username.matches(u)) {
      return Err(StoreError::Conflict);
    }
    if let (Some(provider), Some(external_id)) = (&user.social_account, &user.social_account_id) {
      let social = UserQuery::SocialAccount {
        provider: provider.clone(),
        external_id: external_id.clone(),
      };
      if users.iter().any(|u| social.matches(u)) {
        return Err(StoreError::Conflict);
      }
    }

    let record = UserRecord {
      id: uuid::Uuid::new_v4().to_string(),
      username: Some(user.username),
      password: Some(user.password),
      social_account_id: user.social_account_id,
      social_account: user.social_account,
      name: user.name,
      profile: user.profile,
    };
    users.push(record.clone());

    return Ok(record);
  }

  async fn update(&self, id: &str, update: UserUpdate) -> Result<(), StoreError> {
    let mut users = self.users.write();

    if let Some(Some(ref username)) = update.username
      && users
        .iter()
        .any(|u| u.id != id && u.username.as_ref() == Some(username))
    {
      return Err(StoreError::Conflict);
    }

    let Some(user) = users.iter_mut().find(|u| u.id == id) else {
      return Err(StoreError::NotFound);
    };
    update.apply(user);

    return Ok(());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn github_user(external_id: &str) -> NewUser {
    let placeholder = format!("github_{external_id}");
    return NewUser {
      username: placeholder.clone(),
      password: placeholder,
      social_account_id: Some(external_id.to_string()),
      social_account: Some("github".to_string()),
      ..Default::default()
    };
  }

  #[tokio::test]
  async fn test_uniqueness() {
    let store = MemoryUserStore::new();

    let first = store.insert(github_user("999")).await.unwrap();
    store
      .update(&first.id, UserUpdate::clear_credentials())
      .await
      .unwrap();

    // Same external identity is rejected even after the placeholder username was cleared.
    assert!(matches!(
      store.insert(github_user("999")).await,
      Err(StoreError::Conflict)
    ));
    assert_eq!(store.len(), 1);

    store.insert(github_user("1000")).await.unwrap();
    assert_eq!(store.len(), 2);
  }

  #[tokio::test]
  async fn test_update() {
    let store = MemoryUserStore::new();
    let user = store
      .insert(NewUser {
        username: "alice".to_string(),
        password: "hash".to_string(),
        ..Default::default()
      })
      .await
      .unwrap();

    assert!(matches!(
      store
        .insert(NewUser {
          username: "bob".to_string(),
          password: "".to_string(),
          ..Default::default()
        })
        .await,
      Err(StoreError::Invalid(_))
    ));

    store
      .update(&user.id, UserUpdate::profile(serde_json::json!({"a": 1})))
      .await
      .unwrap();

    let found = store
      .first(&UserQuery::Username("alice".to_string()))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(found.password.as_deref(), Some("hash"));
    assert_eq!(found.profile, Some(serde_json::json!({"a": 1})));

    assert!(matches!(
      store.update("missing", UserUpdate::clear_credentials()).await,
      Err(StoreError::NotFound)
    ));
  }
}
