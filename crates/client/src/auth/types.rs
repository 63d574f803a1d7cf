//! OAuth 2.0 token types
//!
//! Defines the token state held by the client, the token endpoint response
//! shape, and the provider's OAuth error body.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{B24Error, Result};

/// Current access/refresh token pair with its computed expiry
///
/// A token is either unauthenticated (all fields `None`) or issued, in which
/// case `expires_at` was computed as issue time plus the provider-reported
/// lifetime. Tokens are replaced wholesale and never partially mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Short-lived credential attached to remote calls
    pub access_token: Option<String>,

    /// Longer-lived credential used to obtain a new access token
    pub refresh_token: Option<String>,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Token placeholder before any acquisition
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Token issued by the provider at `issued_at` with a lifetime of
    /// `expires_in` seconds
    ///
    /// Returns `None` when the expiry falls outside the representable range.
    #[must_use]
    pub fn issued(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Option<Self> {
        let expires_at = TimeDelta::try_seconds(expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))?;

        Some(Self {
            access_token: Some(access_token),
            refresh_token,
            expires_at: Some(expires_at),
        })
    }

    /// Whether an access token has been acquired
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Check whether the token is expired at the current time
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check whether the token is expired at `now`
    ///
    /// True iff `now` is strictly after `expires_at`; there is no early
    /// renewal margin. A token without an expiry is never usable and counts as
    /// expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now > expires_at)
    }

    /// Seconds until expiration, `None` for an unauthenticated token
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

/// Check if `token` is expired right now
#[must_use]
pub fn is_expired(token: &Token) -> bool {
    token.is_expired()
}

/// Token endpoint response
///
/// Deserializes `{access_token, refresh_token, expires_in}`. Bitrix24 adds
/// portal metadata alongside, which is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a [`Token`] issued at `issued_at`
    ///
    /// # Errors
    /// Returns [`B24Error::Parse`] if `expires_in` does not yield a
    /// representable expiry
    pub fn into_token(self, issued_at: DateTime<Utc>) -> Result<Token> {
        let expires_in = self.expires_in;
        Token::issued(self.access_token, self.refresh_token, expires_in, issued_at).ok_or_else(
            || B24Error::Parse(format!("expires_in out of range: {expires_in}")),
        )
    }
}

/// OAuth error response from the authorization server (RFC 6749 §5.2)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
