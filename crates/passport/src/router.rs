use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use std::collections::HashMap;
use std::sync::Arc;
use tower_cookies::{
  Cookie, CookieManagerLayer, Cookies,
  cookie::{self, SameSite},
};
use tower_http::trace::TraceLayer;

use crate::constants::COOKIE_SESSION_ID;
use crate::dispatcher::{AuthRequest, Dispatcher};
use crate::response::CookieAction;
use crate::session::{Session, SessionStore};
use crate::verifier::Credentials;

#[derive(Clone)]
pub struct PassportState {
  pub dispatcher: Arc<Dispatcher>,
  pub sessions: Arc<dyn SessionStore>,
  /// Dev mode allows session cookies over plain HTTP.
  pub dev: bool,
}

/// Routes everything below the dispatcher's base path to the dispatcher.
pub fn router(state: PassportState) -> Router {
  state.dispatcher.init();

  let base_path = state.dispatcher.base_path();
  let mount = if base_path.is_empty() { "/" } else { base_path };
  return Router::new()
    .route(mount, any(auth_handler))
    .route(&format!("{base_path}/{{*rest}}"), any(auth_handler))
    .layer(CookieManagerLayer::new())
    .layer(TraceLayer::new_for_http())
    .with_state(state);
}

async fn auth_handler(
  State(state): State<PassportState>,
  method: Method,
  uri: Uri,
  Query(query): Query<HashMap<String, String>>,
  headers: HeaderMap,
  cookies: Cookies,
  body: Bytes,
) -> Response {
  let dispatcher = &state.dispatcher;
  let path = match uri.path().strip_prefix(dispatcher.base_path()) {
    Some("") | None => "/".to_string(),
    Some(path) => path.to_string(),
  };

  let credentials = parse_credentials(&headers, &body, &query);
  let request = AuthRequest {
    path,
    method,
    query,
    credentials,
  };

  let session_id = cookies
    .get(COOKIE_SESSION_ID)
    .map(|cookie| cookie.value().to_string());
  let mut session = Session::load(state.sessions.clone(), session_id.as_deref()).await;

  let response = dispatcher.handle(request, &mut session).await;

  match response.cookie {
    CookieAction::Keep => {}
    CookieAction::Set(id) => cookies.add(new_session_cookie(id, state.dev)),
    CookieAction::Clear => cookies.add(expired_session_cookie(state.dev)),
  };

  return response.kind.into_response();
}

/// Username and password from a JSON or form body, falling back to the query string.
fn parse_credentials(
  headers: &HeaderMap,
  body: &[u8],
  query: &HashMap<String, String>,
) -> Option<Credentials> {
  if !body.is_empty() {
    let is_json = headers
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.starts_with("application/json"));

    let credentials = if is_json {
      serde_json::from_slice::<Credentials>(body).ok()
    } else {
      serde_urlencoded::from_bytes::<Credentials>(body).ok()
    };
    if credentials.is_some() {
      return credentials;
    }
  }

  return match (query.get("username"), query.get("password")) {
    (Some(username), Some(password)) => Some(Credentials {
      username: username.clone(),
      password: password.clone(),
    }),
    _ => None,
  };
}

fn new_session_cookie(id: String, dev: bool) -> Cookie<'static> {
  return Cookie::build((COOKIE_SESSION_ID, id))
    .path("/")
    // Not available to client-side JS.
    .http_only(true)
    // Only send cookie over HTTPs.
    .secure(!dev)
    // Needs to be included on the top-level redirect back from the identity provider.
    .same_site(SameSite::Lax)
    .build();
}

/// Browsers don't reliably drop cookies, thus overwrite with an expired one.
fn expired_session_cookie(dev: bool) -> Cookie<'static> {
  let mut expired = new_session_cookie(String::new(), dev);
  expired.set_max_age(cookie::time::Duration::ZERO);
  return expired;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_credentials() {
    let mut json_headers = HeaderMap::new();
    json_headers.insert(
      header::CONTENT_TYPE,
      "application/json; charset=utf-8".parse().unwrap(),
    );
    let empty = HashMap::new();

    assert_eq!(
      parse_credentials(
        &json_headers,
        br#"{"username": "alice", "password": "secret"}"#,
        &empty
      ),
      Some(Credentials {
        username: "alice".to_string(),
        password: "secret".to_string(),
      })
    );

    assert_eq!(
      parse_credentials(&HeaderMap::new(), b"username=alice&password=s%26cret", &empty),
      Some(Credentials {
        username: "alice".to_string(),
        password: "s&cret".to_string(),
      })
    );

    let query = HashMap::from([
      ("username".to_string(), "bob".to_string()),
      ("password".to_string(), "pw".to_string()),
    ]);
    assert_eq!(
      parse_credentials(&json_headers, b"not json", &query),
      Some(Credentials {
        username: "bob".to_string(),
        password: "pw".to_string(),
      })
    );

    assert_eq!(parse_credentials(&HeaderMap::new(), b"", &empty), None);
  }

  #[test]
  fn test_session_cookie() {
    let session_cookie = new_session_cookie("abc".to_string(), false);
    assert_eq!(session_cookie.name(), COOKIE_SESSION_ID);
    assert_eq!(session_cookie.value(), "abc");
    assert_eq!(session_cookie.http_only(), Some(true));
    assert_eq!(session_cookie.secure(), Some(true));

    let expired = expired_session_cookie(true);
    assert_eq!(expired.max_age(), Some(cookie::time::Duration::ZERO));
    assert_eq!(expired.secure(), Some(false));
  }
}
