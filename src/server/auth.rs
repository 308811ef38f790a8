//! Shared-secret gate for the SSE transport.

use axum::{
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingCredential,
    InvalidCredential,
}

impl UnauthorizedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "unauthorized_sse_token_missing",
            Self::InvalidCredential => "unauthorized_sse_token_invalid",
        }
    }
}

impl fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one incoming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Carries the presented credential, which is empty when no secret is configured
    /// and the client sent none.
    Authorized(String),
    Unauthorized(UnauthorizedReason),
}

/// Credential accepted for the current request, available as a request extension.
/// Sessions are bound to the credential that opened them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential(pub String);

/// Compare the `Authorization` header against the configured secret. No secret
/// means every connection is accepted.
pub fn authorize(secret: Option<&str>, header: Option<&str>) -> AuthDecision {
    let header = header.unwrap_or_default();
    let token = header.strip_prefix("Bearer ").unwrap_or(header);

    match secret.filter(|s| !s.is_empty()) {
        None => AuthDecision::Authorized(token.to_string()),
        Some(_) if token.is_empty() => {
            AuthDecision::Unauthorized(UnauthorizedReason::MissingCredential)
        }
        Some(secret) if token != secret => {
            AuthDecision::Unauthorized(UnauthorizedReason::InvalidCredential)
        }
        Some(_) => AuthDecision::Authorized(token.to_string()),
    }
}

/// Rejects unauthorized requests with 401 before any stream bytes are written.
pub async fn require_api_key(
    State(secret): State<Option<Arc<str>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authorize(secret.as_deref(), header) {
        AuthDecision::Authorized(credential) => {
            request.extensions_mut().insert(Credential(credential));
            next.run(request).await
        }
        AuthDecision::Unauthorized(reason) => {
            tracing::warn!(reason = %reason, path = %request.uri().path(), "Rejected SSE request");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": reason.as_str()})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_secret_accepted() {
        assert_eq!(
            authorize(Some("S"), Some("Bearer S")),
            AuthDecision::Authorized("S".into())
        );
    }

    #[test]
    fn test_raw_secret_accepted() {
        assert_eq!(
            authorize(Some("S"), Some("S")),
            AuthDecision::Authorized("S".into())
        );
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            authorize(Some("S"), None),
            AuthDecision::Unauthorized(UnauthorizedReason::MissingCredential)
        );
        assert_eq!(
            authorize(Some("S"), Some("Bearer ")),
            AuthDecision::Unauthorized(UnauthorizedReason::MissingCredential)
        );
    }

    #[test]
    fn test_wrong_secret() {
        assert_eq!(
            authorize(Some("S"), Some("Bearer X")),
            AuthDecision::Unauthorized(UnauthorizedReason::InvalidCredential)
        );
        assert_eq!(
            authorize(Some("S"), Some("bearer S")),
            AuthDecision::Unauthorized(UnauthorizedReason::InvalidCredential)
        );
    }

    #[test]
    fn test_no_secret_accepts_everything() {
        assert_eq!(authorize(None, None), AuthDecision::Authorized(String::new()));
        assert_eq!(
            authorize(None, Some("Bearer anything")),
            AuthDecision::Authorized("anything".into())
        );
        assert_eq!(
            authorize(Some(""), Some("Bearer X")),
            AuthDecision::Authorized("X".into())
        );
    }

    #[test]
    fn test_reason_markers() {
        assert_eq!(
            UnauthorizedReason::MissingCredential.to_string(),
            "unauthorized_sse_token_missing"
        );
        assert_eq!(
            UnauthorizedReason::InvalidCredential.as_str(),
            "unauthorized_sse_token_invalid"
        );
    }
}
