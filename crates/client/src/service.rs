//! Host-facing service facade
//!
//! [`B24Service`] ties the credential store, token state, bootstrapper and
//! REST dispatcher together behind the operations a host application uses:
//!
//! ```no_run
//! use b24link_client::{B24Service, ClientConfig};
//!
//! # async fn run(config: ClientConfig) -> b24link_client::Result<()> {
//! let service = B24Service::builder().build()?;
//! let token = service.initialize(&config).await?;
//!
//! if !token.is_authenticated() {
//!     // Send the end user here, then feed the returned code back in
//!     let url = service.authorization_redirect()?;
//!     # let _ = url;
//!     let code = "code-from-callback";
//!     service.complete_authorization(code).await?;
//! }
//!
//! let leads = service.call_method("crm.lead.list", None).await?;
//! # let _ = leads;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::auth::{Bootstrapper, OAuthClient, PortalLoginBootstrapper, Token, TokenManager};
use crate::config::{ClientConfig, Credentials};
use crate::error::{B24Error, Result};
use crate::rest::RestDispatcher;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything bound to one successful `initialize`
struct Session {
    credentials: Arc<Credentials>,
    oauth: OAuthClient,
    tokens: TokenManager<OAuthClient>,
    dispatcher: RestDispatcher,
}

impl Session {
    fn new(credentials: Credentials, http: &Client) -> Self {
        let credentials = Arc::new(credentials);
        let oauth = OAuthClient::new(Arc::clone(&credentials), http.clone());

        Self {
            tokens: TokenManager::new(oauth.clone()),
            dispatcher: RestDispatcher::new(Arc::clone(&credentials), http.clone()),
            credentials,
            oauth,
        }
    }
}

/// OAuth token lifecycle manager and authenticated REST client
///
/// Every operation except [`initialize`](Self::initialize) fails with
/// [`B24Error::Uninitialized`] until initialization has succeeded.
pub struct B24Service {
    http: Client,
    bootstrapper: Arc<dyn Bootstrapper>,
    session: RwLock<Option<Arc<Session>>>,
}

impl std::fmt::Debug for B24Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.read();
        f.debug_struct("B24Service")
            .field("credentials", &session.as_ref().map(|s| Arc::clone(&s.credentials)))
            .finish_non_exhaustive()
    }
}

impl B24Service {
    /// Start building a new service
    #[must_use]
    pub fn builder() -> B24ServiceBuilder {
        B24ServiceBuilder::default()
    }

    /// Validate `config`, install a fresh credential store and token state,
    /// and acquire a token when a portal user is configured
    ///
    /// Without a user section the returned token is unauthenticated and the
    /// host is expected to drive the authorization-code flow. Calling this
    /// again replaces both credentials and token state.
    ///
    /// # Errors
    /// - [`B24Error::MissingConfig`] when a required field is absent; no
    ///   network call is made and any previous session is kept
    /// - [`B24Error::Bootstrap`] when the password bootstrap fails; the new
    ///   credentials stay installed so the redirect flow can be used instead
    /// - Any token endpoint error from exchanging the bootstrapped code
    #[instrument(skip_all)]
    pub async fn initialize(&self, config: &ClientConfig) -> Result<Token> {
        let credentials = config.validate()?;
        let user = config.user_credentials()?;

        let session = Arc::new(Session::new(credentials, &self.http));
        *self.session.write() = Some(Arc::clone(&session));
        info!(service_url = %session.credentials.service_url(), "Client initialized");

        let Some(user) = user else {
            return Ok(session.tokens.current());
        };

        let code = self
            .bootstrapper
            .authorization_code(&session.credentials, &user)
            .await
            .map_err(|e| {
                warn!(error = %e, "Password bootstrap failed, authorization redirect required");
                B24Error::from(e)
            })?;

        session.tokens.complete_authorization(&code).await
    }

    /// Authorization URL the end user's browser should be sent to
    ///
    /// # Errors
    /// Returns [`B24Error::Uninitialized`] before initialization
    pub fn authorization_redirect(&self) -> Result<String> {
        Ok(self.session()?.oauth.authorization_url())
    }

    /// Exchange the authorization code delivered to the application's
    /// callback and install the issued token
    ///
    /// # Errors
    /// Returns error if uninitialized or the exchange fails; the token state
    /// is unchanged on failure
    pub async fn complete_authorization(&self, code: &str) -> Result<Token> {
        self.session()?.tokens.complete_authorization(code).await
    }

    /// Invoke a remote REST method, refreshing the token first if expired
    ///
    /// # Errors
    /// - [`B24Error::Uninitialized`] or [`B24Error::NotAuthenticated`] before
    ///   any token was acquired, without a network call
    /// - The refresh error when the token is expired and refreshing fails;
    ///   the call itself is not attempted
    /// - [`B24Error::Provider`], [`B24Error::Status`] or [`B24Error::Parse`]
    ///   for a failed call
    #[instrument(skip(self, params))]
    pub async fn call_method(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let session = self.session()?;
        let token = session.tokens.fresh_token().await?;
        let access_token = token.access_token.ok_or(B24Error::NotAuthenticated)?;

        session.dispatcher.call(method, params, &access_token).await
    }

    /// Current token, refreshed first if expired
    ///
    /// # Errors
    /// Returns error if uninitialized, no token was acquired, or the refresh
    /// fails
    pub async fn get_token(&self) -> Result<Token> {
        self.session()?.tokens.fresh_token().await
    }

    /// Refresh the token now, even if it is still fresh
    ///
    /// # Errors
    /// Returns error if uninitialized, no token was acquired, or the refresh
    /// fails; the token state is unchanged on failure
    pub async fn refresh(&self) -> Result<Token> {
        self.session()?.tokens.refresh().await
    }

    /// Install previously persisted token material
    ///
    /// # Errors
    /// Returns error if uninitialized or the token has an access token but no
    /// expiry
    pub fn restore_token(&self, token: Token) -> Result<()> {
        self.session()?.tokens.restore(token)
    }

    /// Snapshot of the token state, unauthenticated before initialization
    #[must_use]
    pub fn current_token(&self) -> Token {
        self.session
            .read()
            .as_ref()
            .map_or_else(Token::unauthenticated, |session| session.tokens.current())
    }

    /// Whether `initialize` has succeeded
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.read().is_some()
    }

    /// Whether a token has been acquired
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.read().as_ref().is_some_and(|session| session.tokens.is_authenticated())
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.session.read().clone().ok_or(B24Error::Uninitialized)
    }
}

/// Builder for [`B24Service`]
pub struct B24ServiceBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    http_client: Option<Client>,
    bootstrapper: Option<Arc<dyn Bootstrapper>>,
}

impl Default for B24ServiceBuilder {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, user_agent: None, http_client: None, bootstrapper: None }
    }
}

impl B24ServiceBuilder {
    /// Request timeout for token endpoint and REST calls
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// User agent sent with every request
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Use a preconfigured HTTP client; `timeout` and `user_agent` are then
    /// ignored for token endpoint and REST calls
    #[must_use]
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Strategy used when a portal user is configured
    #[must_use]
    pub fn bootstrapper(mut self, bootstrapper: impl Bootstrapper + 'static) -> Self {
        self.bootstrapper = Some(Arc::new(bootstrapper));
        self
    }

    /// Build the service
    ///
    /// # Errors
    /// Returns [`B24Error::Config`] if the HTTP client cannot be constructed
    pub fn build(self) -> Result<B24Service> {
        let http = match self.http_client {
            Some(client) => client,
            None => {
                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("b24link-client/{}", env!("CARGO_PKG_VERSION")));
                Client::builder()
                    .timeout(self.timeout)
                    .user_agent(user_agent)
                    .build()
                    .map_err(|e| B24Error::Config(format!("failed to build HTTP client: {e}")))?
            }
        };

        let bootstrapper = self
            .bootstrapper
            .unwrap_or_else(|| Arc::new(PortalLoginBootstrapper::new(self.timeout)));

        Ok(B24Service { http, bootstrapper, session: RwLock::new(None) })
    }
}
