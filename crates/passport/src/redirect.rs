use log::*;
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// Gates caller-supplied post-login redirect targets.
///
/// The operator pattern is compiled on first use and cached for the validator's lifetime. It is
/// matched case-insensitively against the entire target. A malformed pattern is logged once and
/// rejects every target.
#[derive(Debug, Default)]
pub struct RedirectValidator {
  pattern: Option<String>,
  compiled: OnceLock<Option<Regex>>,
}

impl RedirectValidator {
  pub fn new(pattern: Option<&str>) -> Self {
    return Self {
      pattern: pattern.filter(|p| !p.is_empty()).map(|p| p.to_string()),
      compiled: OnceLock::new(),
    };
  }

  pub fn is_configured(&self) -> bool {
    return self.pattern.is_some();
  }

  fn regex(&self) -> Option<&Regex> {
    return self
      .compiled
      .get_or_init(|| {
        let pattern = self.pattern.as_ref()?;
        return RegexBuilder::new(&format!("^(?:{pattern})$"))
          .case_insensitive(true)
          .build()
          .map_err(|err| {
            warn!("Invalid allowedRedirectURLs pattern '{pattern}', redirects disabled: {err}");
          })
          .ok();
      })
      .as_ref();
  }

  pub fn accepts(&self, target: &str) -> bool {
    return self.regex().is_some_and(|re| re.is_match(target));
  }
}
