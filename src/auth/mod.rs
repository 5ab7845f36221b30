use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub(crate) mod extractors;
pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod services;

pub use claims::Claims;
pub use dto::{LoginResponse, PublicAccount};
pub use jwt::{JwtKeys, TokenError};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::protected_routes(state))
}
