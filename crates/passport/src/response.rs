use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use log::*;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::BAD_CREDENTIALS;

/// What to do with the caller's `sid` cookie. Setting always overwrites.
#[derive(Clone, Debug, PartialEq)]
pub enum CookieAction {
  Keep,
  Set(String),
  Clear,
}

/// Body of a successful login without redirect target.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SessionView {
  pub path: String,
  pub id: String,
  pub uid: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResponseKind {
  /// 302 to either the stored redirect target or, mid-flow, an identity provider.
  Redirect { location: String },
  Session(SessionView),
  Unauthorized,
  LoggedOut,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthResponse {
  pub kind: ResponseKind,
  pub cookie: CookieAction,
}

impl AuthResponse {
  pub(crate) fn unauthorized() -> Self {
    return Self {
      kind: ResponseKind::Unauthorized,
      cookie: CookieAction::Keep,
    };
  }

  pub fn status(&self) -> StatusCode {
    return match self.kind {
      ResponseKind::Redirect { .. } => StatusCode::FOUND,
      ResponseKind::Session(_) | ResponseKind::LoggedOut => StatusCode::OK,
      ResponseKind::Unauthorized => StatusCode::UNAUTHORIZED,
    };
  }
}

impl IntoResponse for ResponseKind {
  fn into_response(self) -> Response {
    return match self {
      Self::Redirect { location } => {
        let body = format!("This page has moved to {location}");
        (StatusCode::FOUND, [(header::LOCATION, location)], body).into_response()
      }
      Self::Session(view) => Json(view).into_response(),
      Self::Unauthorized => (StatusCode::UNAUTHORIZED, BAD_CREDENTIALS).into_response(),
      Self::LoggedOut => StatusCode::OK.into_response(),
    };
  }
}

/// Outcome as reflected in the redirect target's query string.
pub enum RedirectOutcome<'a> {
  Success { sid: &'a str, uid: &'a str },
  Failure { error: &'a str },
}

/// Builds the final redirect location: the target's own query is dropped and replaced by
/// `success` plus either `error` or, unless `disable_session_id`, `sid` and `uid`.
pub fn compose_redirect(
  target: &str,
  outcome: RedirectOutcome<'_>,
  disable_session_id: bool,
) -> Result<Url, url::ParseError> {
  let mut url = Url::parse(target)?;
  url.set_query(None);

  {
    let mut query = url.query_pairs_mut();
    match outcome {
      RedirectOutcome::Success { sid, uid } => {
        query.append_pair("success", "true");
        if !disable_session_id {
          query.append_pair("sid", sid);
          query.append_pair("uid", uid);
        }
      }
      RedirectOutcome::Failure { error } => {
        query.append_pair("success", "false");
        query.append_pair("error", error);
      }
    }
  }

  return Ok(url);
}

/// Renders the redirect response. Composition failures are logged and fall back to an empty
/// location rather than failing the request.
pub(crate) fn redirect_response(
  target: &str,
  outcome: RedirectOutcome<'_>,
  disable_session_id: bool,
) -> ResponseKind {
  let location = match compose_redirect(target, outcome, disable_session_id) {
    Ok(url) => url.to_string(),
    Err(err) => {
      warn!("Failed to compose redirect to '{target}': {err}");
      String::new()
    }
  };
  return ResponseKind::Redirect { location };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_compose_redirect() {
    let success = RedirectOutcome::Success {
      sid: "s1",
      uid: "u1",
    };
    assert_eq!(
      compose_redirect("https://myapp.example/welcome?foo=bar#top", success, false)
        .unwrap()
        .as_str(),
      "https://myapp.example/welcome?success=true&sid=s1&uid=u1#top"
    );

    let success = RedirectOutcome::Success {
      sid: "s1",
      uid: "u1",
    };
    assert_eq!(
      compose_redirect("https://myapp.example/", success, true)
        .unwrap()
        .as_str(),
      "https://myapp.example/?success=true"
    );

    let failure = RedirectOutcome::Failure {
      error: BAD_CREDENTIALS,
    };
    assert_eq!(
      compose_redirect("https://myapp.example/?sid=forged", failure, false)
        .unwrap()
        .as_str(),
      "https://myapp.example/?success=false&error=bad+credentials"
    );
  }

  #[test]
  fn test_redirect_response_fallback() {
    let kind = redirect_response(
      "not a url",
      RedirectOutcome::Failure {
        error: BAD_CREDENTIALS,
      },
      false,
    );
    assert_eq!(
      kind,
      ResponseKind::Redirect {
        location: "".to_string()
      }
    );
  }
}
