//! REST method dispatcher
//!
//! Issues `POST <serviceUrl>/rest/<method>` with a JSON body made of the
//! caller's parameters plus the access token under `auth`, then classifies
//! the response:
//!
//! | Response | Outcome |
//! |----------|---------|
//! | 200 + non-empty `error` field | [`B24Error::Provider`] |
//! | 200 without `error` (or `null`, `false`, `0`, `""`) | `Ok(result)` |
//! | other status | [`B24Error::Status`] with status and body |
//! | 200 + unparseable body | [`B24Error::Parse`] |

use std::sync::Arc;

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::Credentials;
use crate::error::{B24Error, Result};

/// Field name the provider reads the access token from
pub const AUTH_FIELD: &str = "auth";

/// Authenticated remote method invoker
#[derive(Debug, Clone)]
pub struct RestDispatcher {
    credentials: Arc<Credentials>,
    client: Client,
}

impl RestDispatcher {
    /// Create a dispatcher sharing the given HTTP client
    #[must_use]
    pub fn new(credentials: Arc<Credentials>, client: Client) -> Self {
        Self { credentials, client }
    }

    /// Invoke `method` with `params` using `access_token`
    ///
    /// `params` defaults to an empty set when absent or not a JSON object. The
    /// payload's schema is never inspected.
    ///
    /// # Errors
    /// Returns error if the request fails or the provider reports an error
    #[instrument(skip(self, params, access_token))]
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        access_token: &str,
    ) -> Result<Value> {
        if method.trim().is_empty() {
            return Err(B24Error::Config("remote method name is empty".to_string()));
        }

        let url = self.credentials.rest_url(method);
        let body = with_auth(params, access_token);
        debug!(%url, "calling remote method");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        debug!(status, "remote method responded");
        classify(status, &text)
    }
}

/// Merge the access token into the caller's parameters
fn with_auth(params: Option<Value>, access_token: &str) -> Value {
    let mut fields = match params {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    fields.insert(AUTH_FIELD.to_string(), Value::String(access_token.to_string()));
    Value::Object(fields)
}

/// Map a remote method response to its result or a classified error
pub(crate) fn classify(status: u16, text: &str) -> Result<Value> {
    let body: Value = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(e) if status == 200 => return Err(B24Error::Parse(e.to_string())),
        Err(_) => {
            return Err(B24Error::Status { status, body: Value::String(text.to_string()) })
        }
    };

    if status != 200 {
        return Err(B24Error::Status { status, body });
    }

    if let Some(error) = body.get("error").filter(|e| is_truthy(e)) {
        let error = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        let description =
            body.get("error_description").and_then(Value::as_str).map(str::to_string);
        return Err(B24Error::Provider { error, description });
    }

    Ok(body.get("result").cloned().unwrap_or(Value::Null))
}

/// `null`, `false`, `0` and `""` do not signal an error
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
