//! Mechanism-specific verification of credentials and external assertions.

pub mod local;
pub mod oauth;
pub mod providers;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::dispatcher::AuthRequest;
use crate::error::AuthError;
use crate::mechanism::MechanismOptions;
use crate::session::SessionData;
use crate::user::UserRecord;

pub use local::{LocalVerifier, PasswordDigest, Sha256Digest};
pub use oauth::{OAuth2Verifier, OAuthEndpoints};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Credentials {
  pub username: String,
  pub password: String,
}

/// Identity as asserted by an external provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalIdentity {
  pub external_id: String,
  pub provider: String,
  pub display_name: Option<String>,
  pub raw_profile: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VerifiedIdentity {
  External(ExternalIdentity),
  Local(UserRecord),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verification {
  Verified {
    identity: VerifiedIdentity,
    /// Supplementary information, e.g. provider tokens metadata. Logged at debug level only.
    info: Option<serde_json::Value>,
  },
  NoIdentity {
    reason: Option<String>,
  },
  /// The user agent needs to visit `location` first, e.g. the provider's consent screen.
  Challenge {
    location: Url,
  },
}

pub struct VerifyContext<'a> {
  pub request: &'a AuthRequest,
  /// Mutable so verifiers can carry round-trip state, e.g. CSRF secrets, across a challenge.
  pub session: &'a mut SessionData,
  pub options: &'a MechanismOptions,
}

#[async_trait]
pub trait Verifier: Send + Sync {
  async fn verify(&self, ctx: VerifyContext<'_>) -> Result<Verification, AuthError>;
}
