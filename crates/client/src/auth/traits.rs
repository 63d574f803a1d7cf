//! Capabilities behind the token lifecycle
//!
//! These traits enable dependency injection and testing by abstracting the
//! token endpoint and the password bootstrap strategy.

use async_trait::async_trait;

use super::types::TokenResponse;
use crate::config::{Credentials, UserCredentials};
use crate::error::{BootstrapError, Result};

/// Token endpoint grants
#[async_trait]
pub trait TokenEndpoint: Send + Sync + 'static {
    /// Exchange an authorization code (`grant_type=authorization_code`)
    ///
    /// # Errors
    /// Returns error if the provider rejects the code or the response cannot
    /// be parsed
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse>;

    /// Exchange a refresh token (`grant_type=refresh_token`)
    ///
    /// # Errors
    /// Returns error if the refresh token is invalid/revoked or the request
    /// fails
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// Strategy that mints an authorization code without a browser
///
/// Implementations are best effort. Callers treat any failure as routine and
/// fall back to the authorization-code redirect.
#[async_trait]
pub trait Bootstrapper: Send + Sync {
    /// Obtain an authorization code for `credentials` by logging in as `user`
    ///
    /// # Errors
    /// Returns a [`BootstrapError`] identifying the failed step
    async fn authorization_code(
        &self,
        credentials: &Credentials,
        user: &UserCredentials,
    ) -> std::result::Result<String, BootstrapError>;
}
