//! Adapters for the users collection.
//!
//! The gateway only needs find-one, insert and field updates. Stores are expected to enforce
//! uniqueness of `username` and of `(social_account, social_account_id)`: the reconciler relies on
//! it when two first logins of the same external identity race.

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::user::{NewUser, UserQuery, UserRecord, UserUpdate};

pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;

#[derive(Debug, Error)]
pub enum StoreError {
  /// Uniqueness constraint violated.
  #[error("Conflict")]
  Conflict,
  #[error("NotFound")]
  NotFound,
  #[error("Invalid: {0}")]
  Invalid(&'static str),
  #[error("Backend: {0}")]
  Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl From<rusqlite::Error> for StoreError {
  fn from(err: rusqlite::Error) -> Self {
    return match err {
      rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
      rusqlite::Error::SqliteFailure(sqlite_err, msg) => match sqlite_err.extended_code {
        // List of error codes: https://www.sqlite.org/rescode.html
        1555 | 2067 => Self::Conflict,
        1299 => Self::Invalid("sqlite constraint: not null"),
        _ => Self::Backend(rusqlite::Error::SqliteFailure(sqlite_err, msg).into()),
      },
      err => Self::Backend(err.into()),
    };
  }
}

#[async_trait]
pub trait UserStore: Send + Sync {
  async fn first(&self, query: &UserQuery) -> Result<Option<UserRecord>, StoreError>;

  async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError>;

  async fn update(&self, id: &str, update: UserUpdate) -> Result<(), StoreError>;
}
