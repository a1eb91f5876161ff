use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{OptionalExtension, params, params_from_iter, types::Value};
use std::path::Path;
use std::sync::Arc;

use crate::store::{StoreError, UserStore};
use crate::user::{NewUser, UserQuery, UserRecord, UserUpdate};

/// Users collection backed by a SQLite table.
///
/// The schema carries a unique index over `(social_account, social_account_id)`, which is what
/// keeps concurrent first logins of one external identity from creating two records.
#[derive(Clone)]
pub struct SqliteUserStore {
  conn: Arc<Mutex<rusqlite::Connection>>,
  table: String,
}

impl SqliteUserStore {
  pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
    return Self::new(rusqlite::Connection::open(path)?, table);
  }

  pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
    return Self::new(rusqlite::Connection::open_in_memory()?, table);
  }

  fn new(conn: rusqlite::Connection, table: &str) -> Result<Self, StoreError> {
    if table.is_empty()
      || !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
      return Err(StoreError::Invalid("invalid table name"));
    }

    conn.execute_batch(&format!(
      r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
          id                  TEXT PRIMARY KEY NOT NULL,
          username            TEXT UNIQUE,
          password            TEXT,
          social_account_id   TEXT,
          social_account      TEXT,
          name                TEXT,
          profile             TEXT
        ) STRICT;

        CREATE UNIQUE INDEX IF NOT EXISTS "__{table}__social_account_index"
          ON "{table}" (social_account, social_account_id);
      "#
    ))?;

    return Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
      table: table.to_string(),
    });
  }

  async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection, &str) -> Result<T, StoreError> + Send + 'static,
  {
    let conn = self.conn.clone();
    let table = self.table.clone();

    return tokio::task::spawn_blocking(move || {
      let conn = conn.lock();
      return f(&conn, &table);
    })
    .await
    .map_err(|err| StoreError::Backend(err.into()))?;
  }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
  let profile: Option<String> = row.get("profile")?;

  return Ok(UserRecord {
    id: row.get("id")?,
    username: row.get("username")?,
    password: row.get("password")?,
    social_account_id: row.get("social_account_id")?,
    social_account: row.get("social_account")?,
    name: row.get("name")?,
    profile: profile.and_then(|p| serde_json::from_str(&p).ok()),
  });
}

fn text(value: Option<String>) -> Value {
  return value.map_or(Value::Null, Value::Text);
}

#[async_trait]
impl UserStore for SqliteUserStore {
  async fn first(&self, query: &UserQuery) -> Result<Option<UserRecord>, StoreError> {
    let query = query.clone();

    return self
      .call(move |conn, table| {
        let (filter, values) = match query {
          UserQuery::Id(id) => ("id = ?1", vec![id]),
          UserQuery::Username(username) => ("username = ?1", vec![username]),
          UserQuery::SocialAccount {
            provider,
            external_id,
          } => (
            "social_account = ?1 AND social_account_id = ?2",
            vec![provider, external_id],
          ),
        };

        return Ok(
          conn
            .query_row(
              &format!(r#"SELECT * FROM "{table}" WHERE {filter} LIMIT 1"#),
              params_from_iter(values.iter()),
              user_from_row,
            )
            .optional()?,
        );
      })
      .await;
  }

  async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
    if user.username.is_empty() {
      return Err(StoreError::Invalid("username required"));
    }
    if user.password.is_empty() {
      return Err(StoreError::Invalid("password required"));
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
    let profile = record
      .profile
      .as_ref()
      .map(serde_json::to_string)
      .transpose()
      .map_err(|err| StoreError::Backend(err.into()))?;

    let row = record.clone();
    self
      .call(move |conn, table| {
        conn.execute(
          &format!(
            r#"
              INSERT INTO "{table}" (
                id, username, password, social_account_id, social_account, name, profile
              ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#
          ),
          params![
            row.id,
            row.username,
            row.password,
            row.social_account_id,
            row.social_account,
            row.name,
            profile
          ],
        )?;
        return Ok(());
      })
      .await?;

    return Ok(record);
  }

  async fn update(&self, id: &str, update: UserUpdate) -> Result<(), StoreError> {
    let mut columns: Vec<&'static str> = vec![];
    let mut values: Vec<Value> = vec![];

    if let Some(username) = update.username {
      columns.push("username");
      values.push(text(username));
    }
    if let Some(password) = update.password {
      columns.push("password");
      values.push(text(password));
    }
    if let Some(profile) = update.profile {
      columns.push("profile");
      values.push(Value::Text(
        serde_json::to_string(&profile).map_err(|err| StoreError::Backend(err.into()))?,
      ));
    }

    let assignments = if columns.is_empty() {
      // Nothing to change, still report unknown ids.
      "id = id".to_string()
    } else {
      columns
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("{column} = ?{}", idx + 1))
        .collect::<Vec<_>>()
        .join(", ")
    };
    let id_param = values.len() + 1;
    values.push(Value::Text(id.to_string()));

    let rows_affected = self
      .call(move |conn, table| {
        return Ok(conn.execute(
          &format!(r#"UPDATE "{table}" SET {assignments} WHERE id = ?{id_param}"#),
          params_from_iter(values),
        )?);
      })
      .await?;

    return match rows_affected {
      0 => Err(StoreError::NotFound),
      _ => Ok(()),
    };
  }
}
