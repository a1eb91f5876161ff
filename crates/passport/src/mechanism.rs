use axum::http::Method;
use log::*;
use url::Url;

use crate::config::{PassportConfig, non_empty};
use crate::constants::{CALLBACK_PATH, DEFAULT_GOOGLE_SCOPE, LOCAL_LOGIN_PATH};

/// External identity providers the gateway knows how to route to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderId {
  Twitter,
  Facebook,
  GitHub,
  Google,
}

impl ProviderId {
  pub const ALL: [ProviderId; 4] = [
    ProviderId::Twitter,
    ProviderId::Facebook,
    ProviderId::GitHub,
    ProviderId::Google,
  ];

  /// Route segment and `socialAccount` value.
  pub fn name(&self) -> &'static str {
    return match self {
      Self::Twitter => "twitter",
      Self::Facebook => "facebook",
      Self::GitHub => "github",
      Self::Google => "google",
    };
  }

  pub fn from_name(name: &str) -> Option<Self> {
    return Self::ALL.into_iter().find(|id| id.name() == name);
  }
}

impl std::fmt::Display for ProviderId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return f.write_str(self.name());
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderMechanism {
  pub id: ProviderId,
  pub client_id: String,
  pub client_secret: String,
  /// Scope override. `None` means the provider's default scopes.
  pub scope: Option<Vec<String>>,
  pub callback_url: Url,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoginMechanism {
  Local,
  Provider(ProviderMechanism),
}

impl LoginMechanism {
  pub fn name(&self) -> &'static str {
    return match self {
      Self::Local => "local",
      Self::Provider(provider) => provider.id.name(),
    };
  }
}

/// Per-request options handed to a verifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MechanismOptions {
  pub scope: Option<Vec<String>>,
}

/// The immutable set of enabled login mechanisms, derived once from config.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mechanisms {
  mechanisms: Vec<LoginMechanism>,
}

impl Mechanisms {
  /// Validation pass turning scattered `allow*` flags into enabled mechanisms.
  ///
  /// A mechanism missing credentials or `baseURL` is disabled rather than treated as an error. So
  /// are malformed scope settings: they're logged and the provider falls back to its defaults.
  pub fn from_config(config: &PassportConfig, base_path: &str) -> Self {
    let mut mechanisms = vec![];

    if config.allow_local {
      mechanisms.push(LoginMechanism::Local);
    }

    let base_url = config.base_url().and_then(|base_url| {
      return Url::parse(base_url)
        .map_err(|err| {
          warn!("Invalid baseURL '{base_url}': {err}");
          return err;
        })
        .ok();
    });

    if base_url.is_none() {
      debug!("baseURL missing, cannot enable any OAuth provider");
    }

    for id in ProviderId::ALL {
      let (allowed, client_id, client_secret) = match id {
        ProviderId::Twitter => (
          config.allow_twitter,
          &config.twitter_consumer_key,
          &config.twitter_consumer_secret,
        ),
        ProviderId::Facebook => (
          config.allow_facebook,
          &config.facebook_app_id,
          &config.facebook_app_secret,
        ),
        ProviderId::GitHub => (
          config.allow_github,
          &config.github_client_id,
          &config.github_client_secret,
        ),
        ProviderId::Google => (
          config.allow_google,
          &config.google_client_id,
          &config.google_client_secret,
        ),
      };

      if !allowed {
        continue;
      }

      let (Some(base_url), Some(client_id), Some(client_secret)) = (
        base_url.as_ref(),
        non_empty(client_id),
        non_empty(client_secret),
      ) else {
        debug!("{id} login requested but not configured, disabling");
        continue;
      };

      let callback_url = match base_url.join(&format!(
        "{base_path}/{name}/{CALLBACK_PATH}",
        base_path = base_path.trim_end_matches('/'),
        name = id.name()
      )) {
        Ok(url) => url,
        Err(err) => {
          warn!("Failed to build {id} callback url: {err}");
          continue;
        }
      };

      debug!("Initializing {id} login, cb: {callback_url}");
      mechanisms.push(LoginMechanism::Provider(ProviderMechanism {
        id,
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scope: parse_scope(id, config),
        callback_url,
      }));
    }

    return Self { mechanisms };
  }

  pub fn iter(&self) -> impl Iterator<Item = &LoginMechanism> {
    return self.mechanisms.iter();
  }

  pub fn is_empty(&self) -> bool {
    return self.mechanisms.is_empty();
  }

  pub fn local(&self) -> Option<&LoginMechanism> {
    return self
      .mechanisms
      .iter()
      .find(|m| matches!(m, LoginMechanism::Local));
  }

  pub fn provider(&self, id: ProviderId) -> Option<&LoginMechanism> {
    return self.mechanisms.iter().find(|m| match m {
      LoginMechanism::Provider(provider) => provider.id == id,
      _ => false,
    });
  }

  /// Selects the mechanism for the first path segment. `None` for unknown segments, disabled
  /// mechanisms and method mismatches alike.
  pub fn select(&self, segment: Option<&str>, method: &Method) -> Option<&LoginMechanism> {
    return match segment? {
      LOCAL_LOGIN_PATH if method == Method::POST => self.local(),
      LOCAL_LOGIN_PATH => None,
      name => self.provider(ProviderId::from_name(name)?),
    };
  }
}

fn parse_scope(id: ProviderId, config: &PassportConfig) -> Option<Vec<String>> {
  return match id {
    ProviderId::Twitter => None,
    ProviderId::Facebook => parse_json_scope(id, non_empty(&config.facebook_scope)?),
    ProviderId::GitHub => parse_json_scope(id, non_empty(&config.github_scope)?),
    ProviderId::Google => Some(
      non_empty(&config.google_scope)
        .unwrap_or(DEFAULT_GOOGLE_SCOPE)
        .split_whitespace()
        .map(|s| s.to_string())
        .collect(),
    ),
  };
}

fn parse_json_scope(id: ProviderId, scope: &str) -> Option<Vec<String>> {
  return match serde_json::from_str::<Vec<String>>(scope) {
    Ok(scope) => Some(scope),
    Err(err) => {
      warn!("Error parsing the {id}Scope '{scope}', ignoring: {err}");
      None
    }
  };
}
