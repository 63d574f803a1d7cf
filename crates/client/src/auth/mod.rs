//! OAuth 2.0 token lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   B24Service    │  Host-facing facade
//! └────────┬────────┘
//!          │
//!          ├──► TokenManager       (token state + single-flight refresh)
//!          │         │
//!          │         └──► OAuthClient   (token endpoint grants)
//!          │
//!          └──► Bootstrapper       (optional password bootstrap)
//! ```

pub mod bootstrap;
pub mod client;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use bootstrap::{DisabledBootstrapper, PortalLoginBootstrapper, DEFAULT_LOGIN_URL};
pub use client::OAuthClient;
pub use token_manager::TokenManager;
pub use traits::{Bootstrapper, TokenEndpoint};
pub use types::{is_expired, OAuthError, Token, TokenResponse};
