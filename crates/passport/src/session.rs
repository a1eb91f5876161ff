use async_trait::async_trait;
use log::*;
use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{DEFAULT_SESSION_TIME_TO_IDLE, SESSION_ID_LENGTH, SESSION_MAX_CAPACITY};
use crate::rand::generate_random_string;

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("Backend: {0}")]
  Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Round-trip state of an OAuth authorization code flow, written when redirecting to the provider
/// and consumed by the callback.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct OAuthState {
  pub provider: String,
  pub csrf_secret: String,
  pub pkce_code_verifier: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SessionData {
  pub id: Option<String>,
  pub path: Option<String>,
  pub uid: Option<String>,
  pub userhash: Option<String>,

  /// Validated post-login destination, held between the initial request and the callback.
  #[serde(rename = "redirectURL")]
  pub redirect_url: Option<String>,
  pub oauth: Option<OAuthState>,
}

/// Normalized outcome of a successful login.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
  pub path: String,
  pub uid: String,
  pub userhash: Option<String>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError>;

  /// Persists `data` under `id`, or under a freshly minted id if `None`. Returns the id.
  async fn save(&self, id: Option<&str>, data: &SessionData) -> Result<String, SessionError>;

  async fn remove(&self, id: &str) -> Result<(), SessionError>;
}

/// Sessions kept in process memory. Idle sessions expire and the number of sessions is capped,
/// since anonymous clients create one per OAuth challenge.
pub struct MemorySessionStore {
  sessions: Cache<String, SessionData>,
}

impl Default for MemorySessionStore {
  fn default() -> Self {
    return Self::with_time_to_idle(DEFAULT_SESSION_TIME_TO_IDLE);
  }
}

impl MemorySessionStore {
  pub fn new() -> Self {
    return Self::default();
  }

  pub fn with_time_to_idle(time_to_idle: Duration) -> Self {
    return Self {
      sessions: Cache::builder()
        .time_to_idle(time_to_idle)
        .max_capacity(SESSION_MAX_CAPACITY)
        .build(),
    };
  }

  pub fn len(&self) -> usize {
    return self.sessions.iter().count();
  }

  pub fn is_empty(&self) -> bool {
    return self.len() == 0;
  }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
  async fn load(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
    return Ok(self.sessions.get(&id.to_string()));
  }

  async fn save(&self, id: Option<&str>, data: &SessionData) -> Result<String, SessionError> {
    let id = id
      .map(|id| id.to_string())
      .unwrap_or_else(|| generate_random_string(SESSION_ID_LENGTH));

    let mut data = data.clone();
    data.id = Some(id.clone());
    self.sessions.insert(id.clone(), data);

    return Ok(id);
  }

  async fn remove(&self, id: &str) -> Result<(), SessionError> {
    self.sessions.invalidate(&id.to_string());
    return Ok(());
  }
}

/// The caller's session for the duration of one request.
pub struct Session {
  store: Arc<dyn SessionStore>,
  id: Option<String>,
  data: SessionData,
}

impl Session {
  pub fn new(store: Arc<dyn SessionStore>) -> Self {
    return Self {
      store,
      id: None,
      data: SessionData::default(),
    };
  }

  /// Loads the session for `id`. Unknown ids and store failures yield an empty session.
  pub async fn load(store: Arc<dyn SessionStore>, id: Option<&str>) -> Self {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
      return Self::new(store);
    };

    return match store.load(id).await {
      Ok(Some(data)) => Self {
        store,
        id: Some(id.to_string()),
        data,
      },
      Ok(None) => Self::new(store),
      Err(err) => {
        warn!("Failed to load session: {err}");
        Self::new(store)
      }
    };
  }

  pub fn id(&self) -> Option<&str> {
    return self.id.as_deref();
  }

  pub fn data(&self) -> &SessionData {
    return &self.data;
  }

  pub(crate) fn data_mut(&mut self) -> &mut SessionData {
    return &mut self.data;
  }

  pub(crate) fn set_redirect_url(&mut self, redirect_url: String) {
    self.data.redirect_url = Some(redirect_url);
  }

  pub(crate) fn take_redirect_url(&mut self) -> Option<String> {
    return self.data.redirect_url.take();
  }

  /// Persists the current data, keeping the id if there is one.
  pub async fn save(&mut self) -> Result<String, SessionError> {
    let id = self.store.save(self.id.as_deref(), &self.data).await?;
    self.data.id = Some(id.clone());
    self.id = Some(id.clone());
    return Ok(id);
  }

  /// Replaces all session data with `record` and persists it under a new id. The previous
  /// session, if any, is removed.
  pub async fn bind(&mut self, record: SessionRecord) -> Result<String, SessionError> {
    if let Some(previous) = self.id.take()
      && let Err(err) = self.store.remove(&previous).await
    {
      warn!("Failed to remove previous session: {err}");
    }

    self.data = SessionData {
      id: None,
      path: Some(record.path),
      uid: Some(record.uid),
      userhash: record.userhash,
      redirect_url: None,
      oauth: None,
    };

    return self.save().await;
  }

  pub async fn destroy(&mut self) -> Result<(), SessionError> {
    self.data = SessionData::default();
    if let Some(id) = self.id.take() {
      self.store.remove(&id).await?;
    }
    return Ok(());
  }
}
