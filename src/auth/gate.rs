use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::{
    claims::Claims,
    jwt::{JwtKeys, TokenError},
};
use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("missing Authorization header")]
    MissingToken,
    #[error("Authorization header is not a bearer token")]
    InvalidScheme,
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<GateError> for AppError {
    fn from(e: GateError) -> Self {
        warn!(reason = %e, "request rejected by auth gate");
        AppError::Unauthorized
    }
}

/// Pull the bearer token out of `Authorization` and verify it.
pub fn authorize(headers: &HeaderMap, keys: &JwtKeys) -> Result<Claims, GateError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(GateError::MissingToken)?
        .to_str()
        .map_err(|_| GateError::InvalidScheme)?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(GateError::InvalidScheme)?;

    Ok(keys.verify(token)?)
}

/// Middleware for protected routers: verified claims go into request
/// extensions, anything else ends the request with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authorize(req.headers(), &state.jwt)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "gate-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
            leeway_secs: 0,
        })
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn no_header_is_missing_token() {
        assert_eq!(
            authorize(&HeaderMap::new(), &keys()).unwrap_err(),
            GateError::MissingToken
        );
    }

    #[test]
    fn other_scheme_is_rejected() {
        let err = authorize(&headers_with("Basic Ym9iOnB3"), &keys()).unwrap_err();
        assert_eq!(err, GateError::InvalidScheme);
        let err = authorize(&headers_with("Bearer "), &keys()).unwrap_err();
        assert_eq!(err, GateError::InvalidScheme);
    }

    #[test]
    fn valid_bearer_yields_claims() {
        let keys = keys();
        let token = keys.issue("alice").unwrap();
        let claims = authorize(&headers_with(&format!("Bearer {token}")), &keys).unwrap();
        assert_eq!(claims.sub, "alice");
        let claims = authorize(&headers_with(&format!("bearer {token}")), &keys).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn verifier_errors_pass_through() {
        let err = authorize(&headers_with("Bearer garbage"), &keys()).unwrap_err();
        assert_eq!(err, GateError::Token(TokenError::Malformed));
    }

    #[test]
    fn every_gate_error_is_the_same_401() {
        for e in [
            GateError::MissingToken,
            GateError::InvalidScheme,
            GateError::Token(TokenError::Expired),
            GateError::Token(TokenError::BadSignature),
        ] {
            let app: AppError = e.into();
            assert!(matches!(app, AppError::Unauthorized));
            assert_eq!(app.to_string(), crate::error::UNAUTHORIZED);
        }
    }
}
