//! axum adapter for the authorization-code flow
//!
//! Mount [`router`] in the host application to expose:
//!
//! - `GET /auth` redirects the browser to the provider's authorization page
//! - `GET /callback?code=...` exchanges the code and installs the token
//!
//! The callback only answers with success once a token is installed. A
//! failed exchange is reported with an error status so the host pipeline
//! never continues without a token.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info, warn};

use crate::error::{B24Error, ErrorCategory};
use crate::service::B24Service;

/// Build the router exposing the redirect and callback routes
pub fn router(service: Arc<B24Service>) -> Router {
    Router::new()
        .route("/auth", get(handle_authorize))
        .route("/callback", get(handle_callback))
        .with_state(service)
}

async fn handle_authorize(State(service): State<Arc<B24Service>>) -> Response {
    match service.authorization_redirect() {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        Err(err) => failure(&err),
    }
}

async fn handle_callback(
    State(service): State<Arc<B24Service>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(code) = params.get("code").filter(|code| !code.is_empty()) else {
        warn!("Authorization callback without code");
        return (
            StatusCode::BAD_REQUEST,
            Html(
                r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>Missing authorization code.</p></body>
</html>"#,
            ),
        )
            .into_response();
    };

    match service.complete_authorization(code).await {
        Ok(_) => {
            info!("Authorization callback completed");
            Html(
                r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#,
            )
            .into_response()
        }
        Err(err) => failure(&err),
    }
}

fn failure(err: &B24Error) -> Response {
    error!(error = %err, category = %err.category(), "Authorization route failed");
    let status = match err.category() {
        ErrorCategory::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCategory::Uninitialized => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
        ErrorCategory::Transport | ErrorCategory::Provider => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Html(format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Authorization Failed</title></head>\n\
             <body><h1>Authorization Failed</h1><p>{}</p></body>\n</html>",
            err.category()
        )),
    )
        .into_response()
}
