use async_trait::async_trait;
use log::*;
use oauth2::{
  AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
  PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse as _, TokenUrl,
};
use std::time::Duration;
use url::Url;

use crate::constants::OAUTH_HTTP_TIMEOUT_SECS;
use crate::error::AuthError;
use crate::mechanism::{ProviderId, ProviderMechanism};
use crate::session::OAuthState;
use crate::verifier::providers;
use crate::verifier::{Verification, VerifiedIdentity, Verifier, VerifyContext};

type OAuthClient = oauth2::basic::BasicClient<
  EndpointSet,
  EndpointNotSet,
  EndpointNotSet,
  EndpointNotSet,
  EndpointSet,
>;

#[derive(Clone, Debug, PartialEq)]
pub struct OAuthEndpoints {
  pub auth_url: Url,
  pub token_url: Url,
  pub user_api_url: Url,
}

impl OAuthEndpoints {
  /// Well-known endpoints of a built-in provider. `None` for providers without OAuth 2 login.
  pub fn for_provider(id: ProviderId) -> Result<Option<Self>, url::ParseError> {
    let Some(defaults) = providers::defaults(id) else {
      return Ok(None);
    };

    return Ok(Some(Self {
      auth_url: Url::parse(defaults.auth_url)?,
      token_url: Url::parse(defaults.token_url)?,
      user_api_url: Url::parse(defaults.user_api_url)?,
    }));
  }
}

/// Generic authorization code flow with PKCE.
///
/// A request without `code` starts the flow and challenges the user agent to visit the provider.
/// The provider redirects back to the callback with either `code` + `state` or `error`.
pub struct OAuth2Verifier {
  provider: ProviderId,
  client: OAuthClient,
  user_api_url: Url,
  http_client: reqwest::Client,
}

impl OAuth2Verifier {
  pub fn new(mechanism: &ProviderMechanism, endpoints: OAuthEndpoints) -> Result<Self, AuthError> {
    let client = oauth2::basic::BasicClient::new(ClientId::new(mechanism.client_id.clone()))
      .set_client_secret(ClientSecret::new(mechanism.client_secret.clone()))
      .set_auth_uri(AuthUrl::from_url(endpoints.auth_url))
      .set_token_uri(TokenUrl::from_url(endpoints.token_url))
      .set_redirect_uri(RedirectUrl::from_url(mechanism.callback_url.clone()));

    let http_client = reqwest::ClientBuilder::new()
      // Following redirects might set us up for server-side request forgery (SSRF).
      .redirect(reqwest::redirect::Policy::none())
      .timeout(Duration::from_secs(OAUTH_HTTP_TIMEOUT_SECS))
      // GitHub rejects API requests without user agent.
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|err| AuthError::Internal(err.into()))?;

    return Ok(Self {
      provider: mechanism.id,
      client,
      user_api_url: endpoints.user_api_url,
      http_client,
    });
  }

  fn challenge(&self, ctx: VerifyContext<'_>) -> Verification {
    let scopes: Vec<String> = match ctx.options.scope {
      Some(ref scope) => scope.clone(),
      None => providers::defaults(self.provider)
        .map(|d| d.scopes.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default(),
    };

    let (pkce_code_challenge, pkce_code_verifier) = PkceCodeChallenge::new_random_sha256();
    let (authorize_url, csrf_state) = self
      .client
      .authorize_url(CsrfToken::new_random)
      .add_scopes(scopes.into_iter().map(Scope::new))
      .set_pkce_challenge(pkce_code_challenge)
      .url();

    ctx.session.oauth = Some(OAuthState {
      provider: self.provider.name().to_string(),
      csrf_secret: csrf_state.secret().to_string(),
      pkce_code_verifier: pkce_code_verifier.secret().to_string(),
    });

    return Verification::Challenge {
      location: authorize_url,
    };
  }

  async fn callback(
    &self,
    ctx: VerifyContext<'_>,
    auth_code: String,
  ) -> Result<Verification, AuthError> {
    // Single use, whatever the outcome.
    let Some(oauth_state) = ctx.session.oauth.take() else {
      return Err(AuthError::BadCredentials("missing oauth state"));
    };

    if oauth_state.provider != self.provider.name() {
      return Err(AuthError::BadCredentials("oauth state of other provider"));
    }

    let Some(state) = ctx.request.query.get("state") else {
      return Err(AuthError::BadCredentials("missing state"));
    };
    if *state != oauth_state.csrf_secret {
      return Err(AuthError::BadCredentials("invalid state"));
    }

    let token_response = self
      .client
      .exchange_code(AuthorizationCode::new(auth_code))
      .set_pkce_verifier(PkceCodeVerifier::new(oauth_state.pkce_code_verifier))
      .request_async(&self.http_client)
      .await
      .map_err(|err| AuthError::FailedDependency(err.into()))?;

    if *token_response.token_type() != oauth2::basic::BasicTokenType::Bearer {
      return Err(AuthError::Internal(
        format!("Unexpected token type: {:?}", token_response.token_type()).into(),
      ));
    }

    let profile = self
      .http_client
      .get(self.user_api_url.clone())
      .bearer_auth(token_response.access_token().secret())
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .and_then(|response| response.error_for_status())
      .map_err(|err| AuthError::FailedDependency(err.into()))?
      .json::<serde_json::Value>()
      .await
      .map_err(|err| AuthError::FailedDependency(err.into()))?;

    let identity = providers::external_identity(self.provider, profile)?;
    debug!(
      "{} asserted external id {}",
      self.provider, identity.external_id
    );

    let info = token_response.scopes().map(|scopes| {
      serde_json::json!({
        "scope": scopes.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
      })
    });

    return Ok(Verification::Verified {
      identity: VerifiedIdentity::External(identity),
      info,
    });
  }
}

#[async_trait]
impl Verifier for OAuth2Verifier {
  async fn verify(&self, ctx: VerifyContext<'_>) -> Result<Verification, AuthError> {
    if let Some(error) = ctx.request.query.get("error") {
      debug!("{} callback with error: {error}", self.provider);
      ctx.session.oauth = None;
      return Ok(Verification::NoIdentity {
        reason: Some(format!("provider error: {error}")),
      });
    }

    if let Some(code) = ctx.request.query.get("code") {
      let code = code.clone();
      return self.callback(ctx, code).await;
    }

    return Ok(self.challenge(ctx));
  }
}
