//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Once;

use b24link_client::{B24Service, ClientConfig, DisabledBootstrapper};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

pub const CLIENT_ID: &str = "app.test";
pub const CLIENT_SECRET: &str = "test-secret";
pub const TOKEN_PATH: &str = "/oauth/token/";
pub const AUTHORIZE_PATH: &str = "/oauth/authorize/";

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Raw configuration with every endpoint pointing at `server_uri`.
pub fn config_json(server_uri: &str) -> Value {
    json!({
        "url": server_uri,
        "credentials": {
            "client": {"id": CLIENT_ID, "secret": CLIENT_SECRET},
            "auth": {
                "tokenHost": server_uri,
                "tokenPath": TOKEN_PATH,
                "authorizePath": AUTHORIZE_PATH
            }
        }
    })
}

pub fn config_for(server_uri: &str) -> ClientConfig {
    serde_json::from_value(config_json(server_uri)).expect("test config should deserialize")
}

/// Configuration with a portal user whose login form lives on `server_uri`.
pub fn config_with_user(server_uri: &str) -> ClientConfig {
    let mut value = config_json(server_uri);
    value["credentials"]["user"] = json!({
        "login": "admin@example.com",
        "password": "hunter2",
        "loginUrl": format!("{server_uri}/auth/")
    });
    serde_json::from_value(value).expect("test config should deserialize")
}

/// Token endpoint success body.
pub fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
        "scope": "crm",
        "domain": "example.bitrix24.com",
        "member_id": "abc"
    })
}

/// Service with the password bootstrap switched off.
pub fn service() -> B24Service {
    init_tracing();
    B24Service::builder()
        .bootstrapper(DisabledBootstrapper)
        .build()
        .expect("service should build")
}
