use serde::{Deserialize, Serialize};

// Missing fields deserialize to empty strings so they are reported as
// validation errors rather than extractor rejections.

/// Request body for registration.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for a password change; `password` is the new one.
#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Public part of an account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicAccount {
    pub username: String,
    pub email: String,
}

/// Response returned after login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub email: String,
    pub token: String,
}
