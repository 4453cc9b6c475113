use super::ValidationError;
use std::fmt;

/// Graph API access token with validation.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new access token with validation
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();

        if token.is_empty() {
            return Err(ValidationError::InvalidAccessToken {
                reason: "access token cannot be empty".to_string(),
            });
        }

        if token.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidAccessToken {
                reason: "access token cannot contain whitespace".to_string(),
            });
        }

        Ok(Self(token))
    }

    /// Get the access token as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redact the token in display
        let visible: String = self.0.chars().take(6).collect();
        write!(f, "{}...", visible)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", self)
    }
}

/// Optional `since`/`until` bounds passed through to every feed request.
///
/// Values are forwarded verbatim; the API accepts both unix timestamps and
/// `strtotime`-style dates, so only emptiness and characters that would
/// break the query string are checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<String>,
    pub until: Option<String>,
}

impl TimeWindow {
    pub fn new(since: Option<String>, until: Option<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            since: since.map(check_bound).transpose()?,
            until: until.map(check_bound).transpose()?,
        })
    }

    /// Renders the bounds as query parameters, each prefixed with `&`.
    pub fn query_suffix(&self) -> String {
        let mut suffix = String::new();
        if let Some(since) = &self.since {
            suffix.push_str("&since=");
            suffix.push_str(since);
        }
        if let Some(until) = &self.until {
            suffix.push_str("&until=");
            suffix.push_str(until);
        }
        suffix
    }
}

fn check_bound(value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidTimeBound {
            value,
            reason: "empty".to_string(),
        });
    }
    if trimmed.contains(['&', '?', '#', ' ']) {
        return Err(ValidationError::InvalidTimeBound {
            value: value.clone(),
            reason: "contains query separators".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
