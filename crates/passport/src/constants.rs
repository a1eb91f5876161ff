use std::time::Duration;

/// Collection backing local and external users unless `usersCollection` says otherwise.
pub const DEFAULT_USERS_COLLECTION: &str = "users";

/// Length of the salt prefixed to stored password hashes.
pub const DEFAULT_SALT_LEN: usize = 256;

/// Default mount point of the auth routes.
pub const DEFAULT_BASE_PATH: &str = "/auth";

/// Path segment appended to a provider's route for the redirect back from the provider.
pub const CALLBACK_PATH: &str = "callback";

pub const LOCAL_LOGIN_PATH: &str = "login";
pub const LOGOUT_PATH: &str = "/logout";

pub const COOKIE_SESSION_ID: &str = "sid";

/// The only failure message ever rendered to callers.
pub const BAD_CREDENTIALS: &str = "bad credentials";

/// Environment variables consulted, in order, when `baseURL` is not configured. The second is the
/// name used by deployments of the Deployd passport module.
pub const ENV_BASE_URL: &str = "PASSPORT_BASE_URL";
pub const ENV_BASE_URL_LEGACY: &str = "DPD_PASSPORT_BASEURL";

pub const DEFAULT_GOOGLE_SCOPE: &str = "profile email";

pub(crate) const SESSION_ID_LENGTH: usize = 32;

/// Sessions not read or written for this long are dropped, including abandoned OAuth round trips.
pub const DEFAULT_SESSION_TIME_TO_IDLE: Duration = Duration::from_secs(24 * 60 * 60);
pub(crate) const SESSION_MAX_CAPACITY: u64 = 100_000;
pub(crate) const OAUTH_HTTP_TIMEOUT_SECS: u64 = 30;
