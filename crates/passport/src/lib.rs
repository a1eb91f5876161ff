#![forbid(unsafe_code, clippy::unwrap_used)]
#![allow(clippy::needless_return)]
#![warn(clippy::await_holding_lock, clippy::inefficient_to_string)]

pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod hook;
pub mod logging;
pub mod mechanism;
pub mod reconcile;
pub mod redirect;
pub mod response;
pub mod router;
pub mod session;
pub mod store;
pub mod user;
pub mod verifier;


pub use config::{ConfigError, PassportConfig};
pub use dispatcher::{AuthRequest, Dispatcher, DispatcherBuilder};
pub use error::AuthError;
pub use hook::{HookError, LoginContext, LoginHook, LoginOutcome};
pub use mechanism::{LoginMechanism, Mechanisms, ProviderId};
pub use response::{AuthResponse, CookieAction, ResponseKind, SessionView};
pub use router::{PassportState, router};
pub use session::{MemorySessionStore, Session, SessionData, SessionStore};
pub use store::{MemoryUserStore, SqliteUserStore, StoreError, UserStore};
pub use user::UserRecord;

pub(crate) mod rand {
  use rand::{
    CryptoRng,
    distr::{Alphanumeric, SampleString},
  };

  pub(crate) fn generate_random_string(length: usize) -> String {
    let mut rng = rand::rng();
    let _: &dyn CryptoRng = &rng;

    return Alphanumeric.sample_string(&mut rng, length);
  }

}
