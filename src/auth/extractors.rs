use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::{claims::Claims, gate::authorize, jwt::JwtKeys};
use crate::error::AppError;

/// The verified caller. Reads claims left by `require_auth`, or runs the
/// gate itself when the route has no middleware.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>() {
            return Ok(AuthUser(claims.clone()));
        }
        let keys = JwtKeys::from_ref(state);
        let claims = authorize(&parts.headers, &keys)?;
        Ok(AuthUser(claims))
    }
}
