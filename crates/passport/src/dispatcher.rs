use axum::http::Method;
use log::*;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::config::{ConfigError, PassportConfig};
use crate::constants::{BAD_CREDENTIALS, DEFAULT_BASE_PATH, LOGOUT_PATH};
use crate::hook::{LoginContext, LoginHook, LoginOutcome};
use crate::mechanism::{LoginMechanism, MechanismOptions, Mechanisms, ProviderId};
use crate::reconcile::{identity_hash, reconcile};
use crate::redirect::RedirectValidator;
use crate::response::{
  AuthResponse, CookieAction, RedirectOutcome, ResponseKind, SessionView, redirect_response,
};
use crate::session::{Session, SessionRecord};
use crate::store::UserStore;
use crate::user::UserRecord;
use crate::verifier::{
  Credentials, LocalVerifier, OAuth2Verifier, OAuthEndpoints, PasswordDigest, Sha256Digest,
  Verification, VerifiedIdentity, Verifier, VerifyContext,
};

/// Transport-independent view of an inbound request.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthRequest {
  /// Path relative to the mount point, e.g. "/github/callback".
  pub path: String,
  pub method: Method,
  pub query: HashMap<String, String>,
  /// Username and password from the body, only consulted by local logins.
  pub credentials: Option<Credentials>,
}

impl AuthRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    return Self {
      path: path.into(),
      method,
      query: HashMap::new(),
      credentials: None,
    };
  }

  pub fn with_query(mut self, key: &str, value: &str) -> Self {
    self.query.insert(key.to_string(), value.to_string());
    return self;
  }
}

#[derive(Default)]
struct Verifiers {
  local: Option<Arc<dyn Verifier>>,
  providers: HashMap<ProviderId, Arc<dyn Verifier>>,
}

impl Verifiers {
  fn get(&self, mechanism: &LoginMechanism) -> Option<&Arc<dyn Verifier>> {
    return match mechanism {
      LoginMechanism::Local => self.local.as_ref(),
      LoginMechanism::Provider(provider) => self.providers.get(&provider.id),
    };
  }
}

pub struct DispatcherBuilder {
  config: PassportConfig,
  base_path: Option<String>,
  users: Option<Arc<dyn UserStore>>,
  digest: Arc<dyn PasswordDigest>,
  hook: Option<Arc<dyn LoginHook>>,
  verifiers: HashMap<ProviderId, Arc<dyn Verifier>>,
  endpoints: HashMap<ProviderId, OAuthEndpoints>,
}

impl DispatcherBuilder {
  /// Mount point of the auth routes, used to derive provider callback URLs. "/" mounts them at
  /// the root.
  pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
    self.base_path = Some(base_path.into());
    return self;
  }

  pub fn user_store(mut self, users: Arc<dyn UserStore>) -> Self {
    self.users = Some(users);
    return self;
  }

  pub fn digest(mut self, digest: Arc<dyn PasswordDigest>) -> Self {
    self.digest = digest;
    return self;
  }

  pub fn hook(mut self, hook: Arc<dyn LoginHook>) -> Self {
    self.hook = Some(hook);
    return self;
  }

  /// Replaces the built-in verifier of a provider. Required for Twitter.
  pub fn verifier(mut self, id: ProviderId, verifier: Arc<dyn Verifier>) -> Self {
    self.verifiers.insert(id, verifier);
    return self;
  }

  /// Overrides a built-in provider's well-known endpoints.
  pub fn oauth_endpoints(mut self, id: ProviderId, endpoints: OAuthEndpoints) -> Self {
    self.endpoints.insert(id, endpoints);
    return self;
  }

  pub fn build(self) -> Result<Dispatcher, ConfigError> {
    self.config.validate()?;
    let Some(users) = self.users else {
      return Err(ConfigError::Missing("user store"));
    };

    let base_path = normalize_base_path(self.base_path.as_deref());

    let mechanisms = Mechanisms::from_config(&self.config, &base_path);
    if mechanisms.is_empty() {
      warn!("No login mechanism enabled, every login will fail");
    }

    return Ok(Dispatcher {
      redirects: RedirectValidator::new(self.config.allowed_redirect_urls()),
      config: self.config,
      base_path,
      mechanisms,
      users,
      digest: self.digest,
      hook: self.hook,
      supplied: self.verifiers,
      endpoints: self.endpoints,
      verifiers: OnceLock::new(),
    });
  }
}

fn normalize_base_path(base_path: Option<&str>) -> String {
  let Some(base_path) = base_path else {
    return DEFAULT_BASE_PATH.to_string();
  };

  return match base_path.trim_end_matches('/') {
    "" => String::new(),
    path if path.starts_with('/') => path.to_string(),
    path => format!("/{path}"),
  };
}

/// Routes login requests to their mechanism and drives a login attempt from verification to the
/// final response.
pub struct Dispatcher {
  config: PassportConfig,
  base_path: String,
  mechanisms: Mechanisms,
  users: Arc<dyn UserStore>,
  digest: Arc<dyn PasswordDigest>,
  hook: Option<Arc<dyn LoginHook>>,
  supplied: HashMap<ProviderId, Arc<dyn Verifier>>,
  endpoints: HashMap<ProviderId, OAuthEndpoints>,

  verifiers: OnceLock<Verifiers>,
  redirects: RedirectValidator,
}

impl Dispatcher {
  pub fn builder(config: PassportConfig) -> DispatcherBuilder {
    return DispatcherBuilder {
      config,
      base_path: None,
      users: None,
      digest: Arc::new(Sha256Digest),
      hook: None,
      verifiers: HashMap::new(),
      endpoints: HashMap::new(),
    };
  }

  pub fn config(&self) -> &PassportConfig {
    return &self.config;
  }

  /// Normalized mount point without trailing slash. Empty when mounted at the root.
  pub fn base_path(&self) -> &str {
    return &self.base_path;
  }

  pub fn mechanisms(&self) -> &Mechanisms {
    return &self.mechanisms;
  }

  /// Builds the verifiers of all enabled mechanisms. Idempotent, also happens implicitly on first
  /// use.
  pub fn init(&self) {
    self.verifiers();
  }

  fn verifiers(&self) -> &Verifiers {
    return self.verifiers.get_or_init(|| {
      let mut verifiers = Verifiers::default();

      for mechanism in self.mechanisms.iter() {
        match mechanism {
          LoginMechanism::Local => {
            debug!("Initializing local login");
            verifiers.local = Some(Arc::new(LocalVerifier::new(
              self.users.clone(),
              self.digest.clone(),
              self.config.salt_len(),
            )));
          }
          LoginMechanism::Provider(provider) => {
            if let Some(verifier) = self.supplied.get(&provider.id) {
              verifiers.providers.insert(provider.id, verifier.clone());
              continue;
            }

            let endpoints = match self.endpoints.get(&provider.id) {
              Some(endpoints) => Some(endpoints.clone()),
              None => OAuthEndpoints::for_provider(provider.id).unwrap_or_else(|err| {
                error!("Invalid {} endpoints: {err}", provider.id);
                None
              }),
            };
            let Some(endpoints) = endpoints else {
              warn!("No verifier for {}, disabling", provider.id);
              continue;
            };

            match OAuth2Verifier::new(provider, endpoints) {
              Ok(verifier) => {
                verifiers.providers.insert(provider.id, Arc::new(verifier));
              }
              Err(err) => error!("Failed to initialize {}, disabling: {err}", provider.id),
            };
          }
        }
      }

      return verifiers;
    });
  }

  /// Handles a request addressed to the auth routes. Never fails: every error ends up as a
  /// generic failure response.
  pub async fn handle(&self, request: AuthRequest, session: &mut Session) -> AuthResponse {
    if request.path == LOGOUT_PATH {
      return self.logout(session).await;
    }

    let segment = request.path.split('/').find(|p| !p.is_empty());
    let Some((mechanism, verifier)) = self.mechanisms.select(segment, &request.method).and_then(
      |mechanism| {
        return Some((mechanism, self.verifiers().get(mechanism)?.clone()));
      },
    ) else {
      debug!(
        "No login mechanism for {} {}",
        request.method, request.path
      );
      return self.fail(session).await;
    };

    if let Some(redirect_url) = request.query.get("redirectURL")
      && self.redirects.is_configured()
    {
      if self.redirects.accepts(redirect_url) {
        session.set_redirect_url(redirect_url.clone());
      } else {
        debug!("Redirect target rejected: {redirect_url}");
      }
    }

    let options = MechanismOptions {
      scope: match mechanism {
        LoginMechanism::Provider(provider) => provider.scope.clone(),
        LoginMechanism::Local => None,
      },
    };

    let verification = verifier
      .verify(VerifyContext {
        request: &request,
        session: session.data_mut(),
        options: &options,
      })
      .await;

    let identity = match verification {
      Ok(Verification::Verified { identity, info }) => {
        if let Some(info) = info {
          debug!("{} login info: {info}", mechanism.name());
        }
        identity
      }
      Ok(Verification::Challenge { location }) => {
        return self.challenge(session, location.to_string()).await;
      }
      Ok(Verification::NoIdentity { reason }) => {
        debug!(
          "{} login without identity: {}",
          mechanism.name(),
          reason.as_deref().unwrap_or("unknown")
        );
        return self.failure(mechanism, &request, session).await;
      }
      Err(err) => {
        warn!("{} login failed: {err}", mechanism.name());
        return self.failure(mechanism, &request, session).await;
      }
    };

    let user = match identity {
      VerifiedIdentity::Local(user) => user,
      VerifiedIdentity::External(external) => match reconcile(self.users.as_ref(), &external).await
      {
        Ok(user) => user,
        Err(err) => {
          error!("Failed to reconcile {} user: {err}", external.provider);
          return self.failure(mechanism, &request, session).await;
        }
      },
    };

    return self.success(mechanism, &request, session, user).await;
  }

  async fn logout(&self, session: &mut Session) -> AuthResponse {
    if let Err(err) = session.destroy().await {
      warn!("Failed to destroy session: {err}");
    }
    return AuthResponse {
      kind: ResponseKind::LoggedOut,
      cookie: CookieAction::Clear,
    };
  }

  /// Persists the session across the round trip to the identity provider.
  async fn challenge(&self, session: &mut Session, location: String) -> AuthResponse {
    return match session.save().await {
      Ok(id) => AuthResponse {
        kind: ResponseKind::Redirect { location },
        cookie: CookieAction::Set(id),
      },
      Err(err) => {
        error!("Failed to persist session before challenge: {err}");
        self.fail(session).await
      }
    };
  }

  async fn success(
    &self,
    mechanism: &LoginMechanism,
    request: &AuthRequest,
    session: &mut Session,
    user: UserRecord,
  ) -> AuthResponse {
    let record = SessionRecord {
      path: format!("/{}", self.config.users_collection()),
      uid: user.id.clone(),
      userhash: identity_hash(&user),
    };

    if let Some(ref hook) = self.hook {
      let result = hook
        .on_login(
          LoginContext {
            mechanism: mechanism.name(),
            user: Some(&user),
            session: session.data(),
            request,
          },
          LoginOutcome::Success,
        )
        .await;

      if let Err(err) = result {
        info!("Login of user {} rejected by hook: {err}", user.id);
        return self.fail(session).await;
      }
    }

    let redirect_url = session.take_redirect_url();
    let sid = match session.bind(record.clone()).await {
      Ok(sid) => sid,
      Err(err) => {
        error!("Failed to bind session: {err}");
        if let Some(redirect_url) = redirect_url {
          session.set_redirect_url(redirect_url);
        }
        return self.fail(session).await;
      }
    };

    debug!("User {} logged in via {}", user.id, mechanism.name());

    let kind = match redirect_url {
      Some(target) => redirect_response(
        &target,
        RedirectOutcome::Success {
          sid: &sid,
          uid: &record.uid,
        },
        self.config.disable_session_id,
      ),
      None => ResponseKind::Session(SessionView {
        path: record.path,
        id: sid.clone(),
        uid: record.uid,
      }),
    };

    return AuthResponse {
      kind,
      cookie: CookieAction::Set(sid),
    };
  }

  /// Runs the hook for a failed attempt, then renders the failure.
  async fn failure(
    &self,
    mechanism: &LoginMechanism,
    request: &AuthRequest,
    session: &mut Session,
  ) -> AuthResponse {
    if let Some(ref hook) = self.hook {
      let result = hook
        .on_login(
          LoginContext {
            mechanism: mechanism.name(),
            user: None,
            session: session.data(),
            request,
          },
          LoginOutcome::Failure,
        )
        .await;

      if let Err(err) = result {
        warn!("Login hook failed: {err}");
      }
    }

    return self.fail(session).await;
  }

  /// Renders the generic failure, consuming the stored redirect target if any.
  async fn fail(&self, session: &mut Session) -> AuthResponse {
    let redirect_url = session.take_redirect_url();

    // Drop consumed state, e.g. the redirect target or OAuth secrets, from persisted sessions.
    if session.id().is_some()
      && let Err(err) = session.save().await
    {
      warn!("Failed to update session: {err}");
    }

    return match redirect_url {
      Some(target) => AuthResponse {
        kind: redirect_response(
          &target,
          RedirectOutcome::Failure {
            error: BAD_CREDENTIALS,
          },
          self.config.disable_session_id,
        ),
        cookie: CookieAction::Keep,
      },
      None => AuthResponse::unauthorized(),
    };
  }
}
