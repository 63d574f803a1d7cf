//! Best-effort password bootstrap
//!
//! Mints an authorization code without a browser by walking the provider's
//! own web login and OAuth consent pages with a shared cookie jar:
//!
//! 1. Submit the portal login form, expecting a redirect as proof of success
//! 2. Request the authorize endpoint without following its redirect
//! 3. Follow the `redirect_uri` it points at, hop by hop
//! 4. Extract the embedded consent location from the page and request it;
//!    the provider answers with a redirect carrying `code`
//!
//! This depends on the provider's unversioned web UI and is expected to break
//! when that UI changes. Callers fall back to the authorization-code redirect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::traits::Bootstrapper;
use crate::config::{Credentials, UserCredentials};
use crate::error::BootstrapError;

/// Provider's public web login endpoint
pub const DEFAULT_LOGIN_URL: &str = "https://www.bitrix24.net/auth/";

const MAX_REDIRECT_HOPS: usize = 5;

/// Matches a scripted navigation such as `window.location = '/oauth/...';`
static CONSENT_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"location(?:\.href)?\s*=\s*['"]([^'"]+)['"]"#)
        .expect("CONSENT_LOCATION should compile - this is a bug")
});

type BootstrapResult<T> = std::result::Result<T, BootstrapError>;

/// Bootstrapper that always reports the strategy as unsupported
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBootstrapper;

#[async_trait]
impl Bootstrapper for DisabledBootstrapper {
    async fn authorization_code(
        &self,
        _credentials: &Credentials,
        _user: &UserCredentials,
    ) -> BootstrapResult<String> {
        Err(BootstrapError::Unsupported)
    }
}

/// Bootstrapper that simulates the provider's browser login
#[derive(Debug, Clone)]
pub struct PortalLoginBootstrapper {
    timeout: Duration,
}

impl Default for PortalLoginBootstrapper {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl PortalLoginBootstrapper {
    /// Create a bootstrapper whose requests time out after `timeout`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn session_client(&self) -> BootstrapResult<Client> {
        // One jar per attempt; the whole sequence shares the login session
        let jar = Arc::new(Jar::default());
        Client::builder()
            .cookie_provider(jar)
            .redirect(Policy::none())
            .timeout(self.timeout)
            .build()
            .map_err(BootstrapError::from)
    }

    async fn login(&self, client: &Client, user: &UserCredentials) -> BootstrapResult<()> {
        let login_url = user.login_url.as_deref().unwrap_or(DEFAULT_LOGIN_URL);
        debug!(%login_url, "submitting portal login form");

        let form = [
            ("AUTH_FORM", "Y"),
            ("TYPE", "AUTH"),
            ("USER_LOGIN", user.login.as_str()),
            ("USER_PASSWORD", user.password.as_str()),
            ("USER_REMEMBER", "N"),
        ];
        let response = client.post(login_url).form(&form).send().await?;

        if response.status().is_redirection() {
            Ok(())
        } else {
            Err(BootstrapError::LoginRejected { status: response.status().as_u16() })
        }
    }

    async fn consent_page(
        &self,
        client: &Client,
        credentials: &Credentials,
    ) -> BootstrapResult<String> {
        let authorize_url = format!(
            "{}/oauth/authorize/?client_id={}",
            credentials.service_url(),
            urlencoding::encode(credentials.client_id())
        );
        let response = client.get(&authorize_url).send().await?;
        let location = redirect_target(&response).ok_or_else(|| {
            BootstrapError::UnexpectedRedirect(format!("HTTP {}", response.status()))
        })?;

        let target = query_value(&location, "redirect_uri")
            .ok_or_else(|| BootstrapError::UnexpectedRedirect(location.to_string()))?;
        debug!(%target, "following portal redirect");

        let mut next = Url::parse(&target)
            .map_err(|_| BootstrapError::UnexpectedRedirect(target.clone()))?;
        for _ in 0..MAX_REDIRECT_HOPS {
            let response = client.get(next.clone()).send().await?;
            match redirect_target(&response) {
                Some(hop) => next = hop,
                None => return Ok(response.text().await?),
            }
        }

        Err(BootstrapError::UnexpectedRedirect(format!(
            "more than {MAX_REDIRECT_HOPS} redirects from {target}"
        )))
    }

    fn consent_location(&self, page: &str, credentials: &Credentials) -> BootstrapResult<Url> {
        let raw = CONSENT_LOCATION
            .captures(page)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or(BootstrapError::MissingPayload)?;
        let decoded = urlencoding::decode(raw).map_err(|_| BootstrapError::MissingPayload)?;

        let service_url = credentials.service_url();
        let base = Url::parse(&format!("{service_url}/"))
            .map_err(|_| BootstrapError::UnexpectedRedirect(service_url.to_string()))?;
        base.join(&decoded).map_err(|_| BootstrapError::MissingPayload)
    }
}

#[async_trait]
impl Bootstrapper for PortalLoginBootstrapper {
    #[instrument(skip_all, fields(login = %user.login))]
    async fn authorization_code(
        &self,
        credentials: &Credentials,
        user: &UserCredentials,
    ) -> BootstrapResult<String> {
        let client = self.session_client()?;

        self.login(&client, user).await?;
        let page = self.consent_page(&client, credentials).await?;
        let consent = self.consent_location(&page, credentials)?;

        let response = client.get(consent).send().await?;
        let Some(location) = redirect_target(&response) else {
            let status = response.status();
            warn!(%status, "consent request did not redirect");
            return Err(BootstrapError::UnexpectedRedirect(format!("HTTP {status}")));
        };

        let code = query_value(&location, "code")
            .ok_or_else(|| BootstrapError::UnexpectedRedirect(location.to_string()))?;

        info!("Password bootstrap obtained an authorization code");
        Ok(code)
    }
}

fn redirect_target(response: &Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
