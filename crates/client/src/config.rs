//! Client configuration
//!
//! [`ClientConfig`] is the raw, deserializable shape hosts hand to
//! [`B24Service::initialize`](crate::B24Service::initialize). Validation turns
//! it into immutable [`Credentials`]; every required field must be present and
//! non-empty or initialization fails with the section that was missing.
//!
//! ## File Formats
//! [`load_from_file`] reads TOML or JSON, chosen by file extension:
//!
//! ```toml
//! url = "https://example.bitrix24.com"
//!
//! [credentials]
//! scope = "crm,task"
//!
//! [credentials.client]
//! id = "app.5f1e"
//! secret = "s3cr3t"
//!
//! [credentials.auth]
//! tokenHost = "https://oauth.bitrix.info"
//! tokenPath = "/oauth/token/"
//! authorizePath = "/oauth/authorize/"
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{B24Error, ConfigSection, Result};

/// Scope requested when the configuration does not name one
pub const DEFAULT_SCOPE: &str = "crm";

/// Raw client configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base service URL of the portal, e.g. `https://example.bitrix24.com`
    pub url: Option<String>,

    /// OAuth client, endpoint and user credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Top-level scope, used when `credentials.scope` is absent
    pub scope: Option<String>,
}

/// `credentials` section of [`ClientConfig`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    /// Registered application credentials
    pub client: Option<ClientSection>,
    /// Authorization server endpoints
    pub auth: Option<AuthSection>,
    /// Requested scope
    pub scope: Option<String>,
    /// Optional portal user for the password bootstrap
    pub user: Option<UserSection>,
}

/// `credentials.client` section
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSection {
    /// OAuth client id
    pub id: Option<String>,
    /// OAuth client secret
    pub secret: Option<String>,
}

impl fmt::Debug for ClientSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSection")
            .field("id", &self.id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `credentials.auth` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSection {
    /// Authorization server origin, e.g. `https://oauth.bitrix.info`
    pub token_host: Option<String>,
    /// Token endpoint path relative to `token_host`
    pub token_path: Option<String>,
    /// Authorize endpoint path relative to `token_host`
    pub authorize_path: Option<String>,
}

/// `credentials.user` section
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSection {
    /// Portal login
    pub login: Option<String>,
    /// Portal password
    pub password: Option<String>,
    /// Override for the provider's web login endpoint
    pub login_url: Option<String>,
}

impl fmt::Debug for UserSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSection")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("login_url", &self.login_url)
            .finish()
    }
}

/// Validated, immutable credential store
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    service_url: String,
    client_id: String,
    client_secret: String,
    token_host: String,
    token_path: String,
    authorize_path: String,
    scope: String,
}

impl Credentials {
    /// Base service URL without a trailing slash
    #[must_use]
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// OAuth client id
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// OAuth client secret
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Requested scope
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Token endpoint URL (`tokenHost + tokenPath`)
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{}", self.token_host, self.token_path)
    }

    /// Authorize endpoint URL (`tokenHost + authorizePath`)
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!("{}{}", self.token_host, self.authorize_path)
    }

    /// REST endpoint for a remote method (`<serviceUrl>/rest/<method>`)
    #[must_use]
    pub fn rest_url(&self, method: &str) -> String {
        format!("{}/rest/{}", self.service_url, method.trim_start_matches('/'))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("service_url", &self.service_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_host", &self.token_host)
            .field("token_path", &self.token_path)
            .field("authorize_path", &self.authorize_path)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Portal user for the password bootstrap
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredentials {
    /// Portal login
    pub login: String,
    /// Portal password
    pub password: String,
    /// Override for the provider's web login endpoint
    pub login_url: Option<String>,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("login_url", &self.login_url)
            .finish()
    }
}

impl ClientConfig {
    /// Validate the configuration into an immutable credential store
    ///
    /// # Errors
    /// Returns [`B24Error::MissingConfig`] naming the first absent or empty
    /// required field.
    pub fn validate(&self) -> Result<Credentials> {
        let service_url = required(self.url.as_deref(), ConfigSection::Url, "url")?;

        let client = self.credentials.client.as_ref();
        let client_id = required(
            client.and_then(|c| c.id.as_deref()),
            ConfigSection::Client,
            "credentials.client.id",
        )?;
        let client_secret = required(
            client.and_then(|c| c.secret.as_deref()),
            ConfigSection::Client,
            "credentials.client.secret",
        )?;

        let auth = self.credentials.auth.as_ref();
        let token_host = required(
            auth.and_then(|a| a.token_host.as_deref()),
            ConfigSection::Auth,
            "credentials.auth.tokenHost",
        )?;
        let token_path = required(
            auth.and_then(|a| a.token_path.as_deref()),
            ConfigSection::Auth,
            "credentials.auth.tokenPath",
        )?;
        let authorize_path = required(
            auth.and_then(|a| a.authorize_path.as_deref()),
            ConfigSection::Auth,
            "credentials.auth.authorizePath",
        )?;

        let scope = non_empty(self.credentials.scope.as_deref())
            .or_else(|| non_empty(self.scope.as_deref()))
            .unwrap_or(DEFAULT_SCOPE)
            .to_string();

        Ok(Credentials {
            service_url: service_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_host: token_host.trim_end_matches('/').to_string(),
            token_path: token_path.to_string(),
            authorize_path: authorize_path.to_string(),
            scope,
        })
    }

    /// Validate the optional user section
    ///
    /// Returns `Ok(None)` when no user is configured.
    ///
    /// # Errors
    /// Returns [`B24Error::MissingConfig`] when only one of login/password is
    /// set.
    pub fn user_credentials(&self) -> Result<Option<UserCredentials>> {
        let Some(user) = self.credentials.user.as_ref() else {
            return Ok(None);
        };

        let login = non_empty(user.login.as_deref());
        let password = non_empty(user.password.as_deref());
        if login.is_none() && password.is_none() {
            return Ok(None);
        }

        let login = required(login, ConfigSection::User, "credentials.user.login")?;
        let password = required(password, ConfigSection::User, "credentials.user.password")?;

        Ok(Some(UserCredentials {
            login: login.to_string(),
            password: password.to_string(),
            login_url: non_empty(user.login_url.as_deref()).map(str::to_string),
        }))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn required<'a>(
    value: Option<&'a str>,
    section: ConfigSection,
    field: &'static str,
) -> Result<&'a str> {
    non_empty(value).ok_or(B24Error::MissingConfig { section, field })
}

/// Load configuration from a TOML or JSON file
///
/// # Errors
/// Returns [`B24Error::Config`] if the file cannot be read or parsed.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(B24Error::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading client configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| B24Error::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`), defaulting to
/// JSON.
///
/// # Errors
/// Returns [`B24Error::Config`] if the format is unsupported or invalid.
pub fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| B24Error::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| B24Error::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(B24Error::Config(format!("Unsupported config format: {extension}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    fn full_config() -> serde_json::Value {
        json!({
            "url": "https://example.bitrix24.com/",
            "credentials": {
                "client": {"id": "app.1", "secret": "secret"},
                "auth": {
                    "tokenHost": "https://oauth.bitrix.info",
                    "tokenPath": "/oauth/token/",
                    "authorizePath": "/oauth/authorize/"
                }
            }
        })
    }

    fn config_from(value: serde_json::Value) -> ClientConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_full_config() {
        let credentials = config_from(full_config()).validate().unwrap();

        assert_eq!(credentials.service_url(), "https://example.bitrix24.com");
        assert_eq!(credentials.client_id(), "app.1");
        assert_eq!(credentials.scope(), DEFAULT_SCOPE);
        assert_eq!(credentials.token_url(), "https://oauth.bitrix.info/oauth/token/");
        assert_eq!(credentials.authorize_url(), "https://oauth.bitrix.info/oauth/authorize/");
        assert_eq!(
            credentials.rest_url("crm.lead.list"),
            "https://example.bitrix24.com/rest/crm.lead.list"
        );
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        let cases = [
            ("/url", ConfigSection::Url, "url"),
            ("/credentials/client/id", ConfigSection::Client, "credentials.client.id"),
            ("/credentials/client/secret", ConfigSection::Client, "credentials.client.secret"),
            ("/credentials/auth/tokenHost", ConfigSection::Auth, "credentials.auth.tokenHost"),
            ("/credentials/auth/tokenPath", ConfigSection::Auth, "credentials.auth.tokenPath"),
            (
                "/credentials/auth/authorizePath",
                ConfigSection::Auth,
                "credentials.auth.authorizePath",
            ),
        ];

        for (pointer, expected_section, expected_field) in cases {
            let mut value = full_config();
            *value.pointer_mut(pointer).unwrap() = serde_json::Value::Null;

            match config_from(value).validate() {
                Err(B24Error::MissingConfig { section, field }) => {
                    assert_eq!(section, expected_section);
                    assert_eq!(field, expected_field);
                }
                other => panic!("expected missing {expected_field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_sections_are_reported() {
        let mut value = full_config();
        value["credentials"].as_object_mut().unwrap().remove("client");
        assert!(matches!(
            config_from(value).validate(),
            Err(B24Error::MissingConfig { section: ConfigSection::Client, .. })
        ));

        let value = json!({"url": "https://example.bitrix24.com"});
        assert!(matches!(
            config_from(value).validate(),
            Err(B24Error::MissingConfig { section: ConfigSection::Client, .. })
        ));
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let mut value = full_config();
        value["credentials"]["client"]["secret"] = json!("  ");

        assert!(matches!(
            config_from(value).validate(),
            Err(B24Error::MissingConfig { field: "credentials.client.secret", .. })
        ));
    }

    #[test]
    fn test_scope_resolution() {
        let mut value = full_config();
        value["scope"] = json!("task");
        assert_eq!(config_from(value.clone()).validate().unwrap().scope(), "task");

        value["credentials"]["scope"] = json!("crm,user");
        assert_eq!(config_from(value).validate().unwrap().scope(), "crm,user");
    }

    #[test]
    fn test_user_credentials() {
        let value = full_config();
        assert!(config_from(value).user_credentials().unwrap().is_none());

        let mut value = full_config();
        value["credentials"]["user"] = json!({"login": "admin", "password": "pw"});
        let user = config_from(value).user_credentials().unwrap().unwrap();
        assert_eq!(user.login, "admin");
        assert_eq!(user.password, "pw");
        assert!(user.login_url.is_none());

        let mut value = full_config();
        value["credentials"]["user"] = json!({"login": "admin"});
        assert!(matches!(
            config_from(value).user_credentials(),
            Err(B24Error::MissingConfig { section: ConfigSection::User, .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut value = full_config();
        value["credentials"]["user"] = json!({"login": "admin", "password": "hunter2"});
        let config = config_from(value);

        let credentials = format!("{:?}", config.validate().unwrap());
        assert!(!credentials.contains("\"secret\""));
        assert!(credentials.contains("<redacted>"));

        let user = format!("{:?}", config.user_credentials().unwrap().unwrap());
        assert!(!user.contains("hunter2"));
    }

    #[test]
    fn test_parse_toml_config() {
        let contents = r#"
            url = "https://example.bitrix24.com"

            [credentials]
            scope = "crm,task"

            [credentials.client]
            id = "app.1"
            secret = "secret"

            [credentials.auth]
            tokenHost = "https://oauth.bitrix.info"
            tokenPath = "/oauth/token/"
            authorizePath = "/oauth/authorize/"
        "#;

        let config = parse_config(contents, &PathBuf::from("b24.toml")).unwrap();
        let credentials = config.validate().unwrap();
        assert_eq!(credentials.scope(), "crm,task");
        assert_eq!(credentials.client_id(), "app.1");
    }

    #[test]
    fn test_parse_unsupported_format() {
        let result = parse_config("url: x", &PathBuf::from("b24.yaml"));
        assert!(matches!(result, Err(B24Error::Config(msg)) if msg.contains("yaml")));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_config("{not json", &PathBuf::from("b24.json"));
        assert!(matches!(result, Err(B24Error::Config(msg)) if msg.contains("Invalid JSON")));
    }
}
