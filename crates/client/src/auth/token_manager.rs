//! Token manager with single-flight refresh
//!
//! Manages the OAuth token lifecycle:
//! - Authorization-code exchange
//! - Expiry detection and transparent refresh
//! - Wholesale replacement of the token state
//!
//! At most one refresh is in flight per manager. Concurrent callers that
//! observe an expired token join the pending refresh and receive its outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::traits::TokenEndpoint;
use super::types::Token;
use crate::error::{B24Error, Result};

type PendingRefresh = Shared<BoxFuture<'static, Result<Token>>>;

enum RefreshTicket {
    Fresh(Token),
    Pending(PendingRefresh),
}

/// Token state holder
///
/// Owns the current [`Token`] exclusively; external code reads snapshots and
/// changes it only through acquisition, refresh or restore.
pub struct TokenManager<E: TokenEndpoint> {
    endpoint: Arc<E>,
    current: Arc<RwLock<Token>>,
    pending_refresh: Arc<Mutex<Option<PendingRefresh>>>,
}

impl<E: TokenEndpoint> TokenManager<E> {
    /// Create an unauthenticated token manager
    #[must_use]
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            current: Arc::new(RwLock::new(Token::unauthenticated())),
            pending_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Snapshot of the current token (without refreshing)
    #[must_use]
    pub fn current(&self) -> Token {
        self.current.read().clone()
    }

    /// Whether a token has been acquired
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_authenticated()
    }

    /// Replace the token state wholesale with externally stored material
    ///
    /// # Errors
    /// Returns [`B24Error::Config`] if the token has an access token but no
    /// expiry
    pub fn restore(&self, token: Token) -> Result<()> {
        if token.access_token.is_some() && token.expires_at.is_none() {
            return Err(B24Error::Config("restored access token has no expiry".to_string()));
        }
        *self.current.write() = token;
        info!("Token state restored");
        Ok(())
    }

    /// Exchange an authorization code and install the issued token
    ///
    /// On failure the previous token state is left untouched.
    ///
    /// # Errors
    /// Returns error if the code exchange fails
    #[instrument(skip_all)]
    pub async fn complete_authorization(&self, code: &str) -> Result<Token> {
        let response = self.endpoint.exchange_code(code).await?;
        let token = response.into_token(Utc::now())?;

        *self.current.write() = token.clone();
        info!("Authorization completed, token installed");

        Ok(token)
    }

    /// Get the current token, refreshing first if it is expired
    ///
    /// # Errors
    /// Returns error if no token was ever acquired or the refresh fails
    pub async fn fresh_token(&self) -> Result<Token> {
        match self.join_refresh(false)? {
            RefreshTicket::Fresh(token) => Ok(token),
            RefreshTicket::Pending(refresh) => refresh.await,
        }
    }

    /// Refresh the token now, joining an in-flight refresh if there is one
    ///
    /// Fails fast, before any network call, when no token was ever acquired.
    ///
    /// # Errors
    /// Returns error if not authenticated, no refresh token is held, or the
    /// refresh grant fails
    pub async fn refresh(&self) -> Result<Token> {
        match self.join_refresh(true)? {
            RefreshTicket::Fresh(token) => Ok(token),
            RefreshTicket::Pending(refresh) => refresh.await,
        }
    }

    /// Whether a refresh is currently in flight
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.pending_refresh.lock().is_some()
    }

    fn join_refresh(&self, force: bool) -> Result<RefreshTicket> {
        let mut pending = self.pending_refresh.lock();
        if let Some(refresh) = pending.as_ref() {
            debug!("Joining in-flight token refresh");
            return Ok(RefreshTicket::Pending(refresh.clone()));
        }

        // Checked under the refresh lock so a refresh that completed since
        // the caller's last look is not repeated.
        let token = self.current.read().clone();
        if !token.is_authenticated() {
            return Err(B24Error::NotAuthenticated);
        }
        if !force && !token.is_expired() {
            return Ok(RefreshTicket::Fresh(token));
        }
        let refresh_token = token.refresh_token.ok_or(B24Error::NoRefreshToken)?;

        let refresh = run_refresh(
            Arc::clone(&self.endpoint),
            Arc::clone(&self.current),
            Arc::clone(&self.pending_refresh),
            refresh_token,
        )
        .boxed()
        .shared();

        *pending = Some(refresh.clone());
        Ok(RefreshTicket::Pending(refresh))
    }
}

async fn run_refresh<E: TokenEndpoint>(
    endpoint: Arc<E>,
    current: Arc<RwLock<Token>>,
    pending: Arc<Mutex<Option<PendingRefresh>>>,
    refresh_token: String,
) -> Result<Token> {
    info!("Refreshing access token");

    // The pending slot is released on every outcome, a panicking endpoint included
    let outcome = AssertUnwindSafe(endpoint.refresh_access_token(&refresh_token))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(B24Error::Transport("token refresh panicked".to_string())))
        .and_then(|response| response.into_token(Utc::now()));

    match &outcome {
        Ok(token) => {
            *current.write() = token.clone();
            info!("Successfully refreshed access token");
        }
        Err(e) => warn!(error = %e, "Token refresh failed, keeping previous token"),
    }

    pending.lock().take();
    outcome
}
