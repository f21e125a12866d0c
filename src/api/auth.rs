//! Bearer-key authentication and CORS origin enforcement.
//!
//! Two endpoint classes: the optional-auth set (`/v1/chat/completions`,
//! `/v1/completions`, `/v1/models`) tolerates a missing `Authorization`
//! header when `webui_auth_enabled` is on, so a same-origin browser
//! front end that never attaches credentials still works. By default
//! (`webui_auth_enabled` off) every endpoint requires a valid key
//! unconditionally. A present-but-wrong key always fails, regardless of
//! mode.

use crate::api::types::ApiError;
use crate::config::{AuthConfig, ServerConfig};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;

/// Endpoints that tolerate an absent `Authorization` header in
/// browser-optional mode. Everything else always requires a valid key.
const OPTIONAL_AUTH_PATHS: &[&str] = &["/v1/chat/completions", "/v1/completions", "/v1/models"];

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Constant-time comparison against the configured key, so response timing
/// never leaks how many leading bytes matched.
fn keys_match(provided: &str, configured: &str) -> bool {
    bool::from(provided.as_bytes().ct_eq(configured.as_bytes()))
}

fn authorize(
    headers: &HeaderMap,
    auth: &AuthConfig,
    path_is_optional: bool,
    webui_auth_enabled: bool,
) -> Result<(), ApiError> {
    match extract_bearer(headers) {
        Some(token) => {
            if keys_match(token, &auth.api_key) {
                Ok(())
            } else {
                Err(ApiError::invalid_api_key())
            }
        }
        None => {
            if path_is_optional && webui_auth_enabled {
                Ok(())
            } else {
                Err(ApiError::invalid_api_key())
            }
        }
    }
}

fn check_origin(headers: &HeaderMap, server: &ServerConfig) -> Result<(), ApiError> {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    if server.allowed_origins.iter().any(|o| o == origin) {
        Ok(())
    } else {
        Err(ApiError::forbidden_origin(origin))
    }
}

/// Axum middleware enforcing both the bearer-key policy and the origin
/// allowlist ahead of every route it's mounted on.
pub async fn auth_middleware(
    State(state): State<Arc<crate::api::AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_origin(request.headers(), &state.config.server)?;

    let optional = OPTIONAL_AUTH_PATHS.contains(&request.uri().path());
    authorize(
        request.headers(),
        &state.config.auth,
        optional,
        state.config.server.webui_auth_enabled,
    )?;

    Ok(next.run(request).await)
}

/// CORS layer advertising `Authorization` explicitly — a wildcard
/// `Access-Control-Allow-Headers` does not cover it for credentialed
/// requests, which browser clients of the optional-auth endpoints send.
pub fn build_cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|o| axum::http::HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            api_key: format!("sk-{}", "a".repeat(32)),
        }
    }

    fn server_config() -> ServerConfig {
        ServerConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            ..ServerConfig::default()
        }
    }

    fn headers_with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_valid_key_authorizes() {
        let auth = auth_config();
        let headers = headers_with_bearer(&auth.api_key);
        assert!(authorize(&headers, &auth, false, false).is_ok());
    }

    #[test]
    fn test_invalid_key_rejected_even_on_optional_endpoint() {
        let auth = auth_config();
        let headers = headers_with_bearer("sk-wrongwrongwrongwrongwrongwrongwro");
        let err = authorize(&headers, &auth, true, false).unwrap_err();
        assert_eq!(err.error.code.as_deref(), Some("invalid_api_key"));
    }

    #[test]
    fn test_missing_header_allowed_on_optional_endpoint_browser_optional_mode() {
        let auth = auth_config();
        let headers = HeaderMap::new();
        assert!(authorize(&headers, &auth, true, true).is_ok());
    }

    #[test]
    fn test_missing_header_rejected_on_non_optional_endpoint() {
        let auth = auth_config();
        let headers = HeaderMap::new();
        assert!(authorize(&headers, &auth, false, false).is_err());
    }

    #[test]
    fn test_missing_header_rejected_by_default_even_on_optional_endpoint() {
        let auth = auth_config();
        let headers = HeaderMap::new();
        assert!(authorize(&headers, &auth, true, false).is_err());
    }

    #[test]
    fn test_origin_not_in_allowlist_rejected() {
        let server = server_config();
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("http://evil.example"));
        let err = check_origin(&headers, &server).unwrap_err();
        assert_eq!(err.error.code.as_deref(), Some("forbidden_origin"));
    }

    #[test]
    fn test_origin_in_allowlist_passes() {
        let server = server_config();
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"));
        assert!(check_origin(&headers, &server).is_ok());
    }

    #[test]
    fn test_no_origin_header_passes() {
        let server = server_config();
        assert!(check_origin(&HeaderMap::new(), &server).is_ok());
    }

    #[test]
    fn test_keys_match_rejects_different_lengths() {
        assert!(!keys_match("short", "a-much-longer-key"));
    }
}
