use async_trait::async_trait;
use base64::prelude::*;
use log::*;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::rand::generate_random_string;
use crate::store::UserStore;
use crate::user::UserQuery;
use crate::verifier::{Verification, VerifiedIdentity, Verifier, VerifyContext};

/// The password hashing primitive: `hash(password, salt) -> digest`.
pub trait PasswordDigest: Send + Sync {
  fn hash(&self, password: &str, salt: &str) -> String;
}

/// Reference digest: base64UrlNoPad(sha256(salt + password)).
///
/// NOTE: A plain digest is fast to brute-force. Hosts with real users should plug in a proper
/// password hashing function.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Digest;

impl PasswordDigest for Sha256Digest {
  fn hash(&self, password: &str, salt: &str) -> String {
    let mut sha = Sha256::new();
    sha.update(salt);
    sha.update(password);
    return BASE64_URL_SAFE_NO_PAD.encode(sha.finalize());
  }
}

/// Produces the stored form of a password: a fresh random salt of `salt_len` characters followed
/// by the digest.
pub fn hash_password(digest: &dyn PasswordDigest, password: &str, salt_len: usize) -> String {
  let salt = generate_random_string(salt_len);
  let hash = digest.hash(password, &salt);
  return format!("{salt}{hash}");
}

/// Splits a stored password into `(salt, hash)`, where the salt is the first `salt_len`
/// characters. `None` if nothing remains for the hash.
pub fn split_salted_hash(stored: &str, salt_len: usize) -> Option<(&str, &str)> {
  let (idx, _) = stored.char_indices().nth(salt_len)?;
  return Some(stored.split_at(idx));
}

/// Username/password verification against the users collection.
pub struct LocalVerifier {
  users: Arc<dyn UserStore>,
  digest: Arc<dyn PasswordDigest>,
  salt_len: usize,
}

impl LocalVerifier {
  pub fn new(users: Arc<dyn UserStore>, digest: Arc<dyn PasswordDigest>, salt_len: usize) -> Self {
    return Self {
      users,
      digest,
      salt_len,
    };
  }
}

#[async_trait]
impl Verifier for LocalVerifier {
  async fn verify(&self, ctx: VerifyContext<'_>) -> Result<Verification, AuthError> {
    let Some(ref credentials) = ctx.request.credentials else {
      return Ok(Verification::NoIdentity {
        reason: Some("missing credentials".to_string()),
      });
    };

    if credentials.username.is_empty() || credentials.password.is_empty() {
      return Ok(Verification::NoIdentity {
        reason: Some("missing credentials".to_string()),
      });
    }

    let Some(user) = self
      .users
      .first(&UserQuery::Username(credentials.username.clone()))
      .await?
    else {
      return Ok(Verification::NoIdentity {
        reason: Some("unknown user".to_string()),
      });
    };

    // External users have their credentials cleared and can only log in through their provider.
    let Some((salt, expected)) = user
      .password
      .as_deref()
      .and_then(|stored| split_salted_hash(stored, self.salt_len))
    else {
      debug!("User {} has no usable password", user.id);
      return Ok(Verification::NoIdentity {
        reason: Some("no password".to_string()),
      });
    };

    let actual = self.digest.hash(&credentials.password, salt);
    if !bool::from(actual.as_bytes().ct_eq(expected.as_bytes())) {
      return Ok(Verification::NoIdentity {
        reason: Some("password mismatch".to_string()),
      });
    }

    return Ok(Verification::Verified {
      identity: VerifiedIdentity::Local(user),
      info: None,
    });
  }
}
