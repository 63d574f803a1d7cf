//! OAuth 2.0 token lifecycle and authenticated REST dispatch for Bitrix24.
//!
//! # Overview
//!
//! - [`config`]: raw configuration and validation into [`Credentials`]
//! - [`auth`]: tokens, the token endpoint client, single-flight refresh and
//!   the best-effort password bootstrap
//! - [`rest`]: remote method invocation and response classification
//! - [`service`]: the [`B24Service`] facade hosts talk to
//! - `callback` (feature `callback`): axum routes for the redirect flow
//!
//! Nothing in this crate retries on its own. Every failure surfaces as a
//! [`B24Error`] whose [`ErrorCategory`] tells the caller how to recover.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod auth;
#[cfg(feature = "callback")]
pub mod callback;
pub mod config;
pub mod error;
pub mod rest;
pub mod service;

pub use auth::{is_expired, Bootstrapper, DisabledBootstrapper, PortalLoginBootstrapper, Token};
pub use config::{ClientConfig, Credentials, UserCredentials};
pub use error::{B24Error, BootstrapError, ErrorCategory, Result};
pub use service::{B24Service, B24ServiceBuilder};
