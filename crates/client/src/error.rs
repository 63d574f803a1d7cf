//! Error types for the token lifecycle and REST dispatcher
//!
//! Every failure surfaced by this crate is a [`B24Error`]. Errors are
//! classified into an [`ErrorCategory`] so callers can decide whether to
//! re-authorize, retry, or give up. Nothing in this crate retries on its own.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::auth::types::OAuthError;

/// Result alias used throughout the crate.
pub type Result<T, E = B24Error> = std::result::Result<T, E>;

/// Categories of errors, used by callers to pick a recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid initialization fields - fatal, fix the config
    Configuration,
    /// Used before setup or before any token was acquired - programmer misuse
    Uninitialized,
    /// Credentials or grants rejected - recover by re-authorizing
    Authentication,
    /// Network failures and unexpected responses - potentially transient
    Transport,
    /// Structured error reported by the provider - request specific
    Provider,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Uninitialized => "uninitialized",
            Self::Authentication => "authentication",
            Self::Transport => "transport",
            Self::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// Configuration section a missing field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    /// `url`
    Url,
    /// `credentials.client`
    Client,
    /// `credentials.auth`
    Auth,
    /// `credentials.user`
    User,
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Url => "url",
            Self::Client => "client",
            Self::Auth => "auth",
            Self::User => "user",
        };
        f.write_str(name)
    }
}

/// Failures of the best-effort password bootstrap
///
/// Each step fails with its own variant so callers can tell "bad
/// credentials" apart from "the provider's login pages changed".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("portal login rejected (HTTP {status}), check login/password")]
    LoginRejected { status: u16 },

    #[error("unexpected redirect during authorization: {0}")]
    UnexpectedRedirect(String),

    #[error("authorization payload not found in portal response")]
    MissingPayload,

    #[error("password bootstrap is not supported by this client")]
    Unsupported,

    #[error("bootstrap request failed: {0}")]
    Transport(String),
}

/// Errors produced by configuration, token lifecycle and remote calls
#[derive(Debug, Clone, Error)]
pub enum B24Error {
    #[error("missing {section} setting `{field}`")]
    MissingConfig { section: ConfigSection, field: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("client not initialized: call initialize() first")]
    Uninitialized,

    #[error("no token acquired yet, complete authorization first")]
    NotAuthenticated,

    #[error("token has no refresh token")]
    NoRefreshToken,

    #[error("authorization rejected: {0}")]
    Authorization(OAuthError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: Value },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("{error}")]
    Provider { error: String, description: Option<String> },
}

impl B24Error {
    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingConfig { .. } | Self::Config(_) => ErrorCategory::Configuration,
            Self::Uninitialized | Self::NotAuthenticated => ErrorCategory::Uninitialized,
            Self::NoRefreshToken | Self::Authorization(_) => ErrorCategory::Authentication,
            Self::Bootstrap(BootstrapError::Transport(_)) => ErrorCategory::Transport,
            Self::Bootstrap(_) => ErrorCategory::Authentication,
            Self::Transport(_) | Self::Parse(_) => ErrorCategory::Transport,
            Self::Status { status, .. } => match *status {
                401 => ErrorCategory::Authentication,
                429 | 500..=599 => ErrorCategory::Transport,
                _ => ErrorCategory::Provider,
            },
            Self::Provider { .. } => ErrorCategory::Provider,
        }
    }

    /// Check if a caller-level retry is appropriate
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Bootstrap(BootstrapError::LoginRejected { status }) => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for B24Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for BootstrapError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
