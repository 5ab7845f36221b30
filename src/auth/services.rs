use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    claims::Claims,
    dto::{ChangePasswordRequest, LoginRequest, LoginResponse, PublicAccount, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, hash_password_blocking, verify_password, verify_password_blocking},
};
use crate::{
    accounts::{AccountStore, AccountView, NewAccount},
    error::AppError,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Verified against when the username is unknown, so both login failures
    // cost one Argon2 run.
    static ref DUMMY_HASH: Option<String> = hash_password("no-such-account").ok();
}

/// Builds the dummy hash on a blocking thread so no login pays for it.
pub async fn warm_up_login_timing() -> anyhow::Result<()> {
    tokio::task::spawn_blocking(|| lazy_static::initialize(&DUMMY_HASH)).await?;
    Ok(())
}

async fn verify_against_dummy(plain: String) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || {
        if let Some(dummy) = DUMMY_HASH.as_ref() {
            verify_password(&plain, dummy);
        }
    })
    .await?;
    Ok(())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn require_fields(fields: &[(&str, &str)]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

pub async fn register(
    store: &dyn AccountStore,
    req: RegisterRequest,
) -> Result<PublicAccount, AppError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    require_fields(&[
        ("username", username.as_str()),
        ("password", req.password.as_str()),
        ("email", email.as_str()),
    ])?;

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::Validation("invalid email".into()));
    }

    // Fast path only; the store decides on a race.
    if store.find_by_username(&username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(AppError::Conflict("username already exists".into()));
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let account = store
        .insert(NewAccount {
            username,
            email,
            password_hash,
        })
        .await?;

    info!(account_id = account.id, username = %account.username, "account registered");
    Ok(PublicAccount {
        username: account.username,
        email: account.email,
    })
}

pub async fn login(
    store: &dyn AccountStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<LoginResponse, AppError> {
    let username = req.username.trim();
    require_fields(&[("username", username), ("password", req.password.as_str())])?;

    let account = match store.find_by_username(username).await? {
        Some(a) => a,
        None => {
            verify_against_dummy(req.password).await?;
            warn!(%username, "login unknown username");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password_blocking(req.password, account.password_hash.clone()).await? {
        warn!(%username, account_id = account.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = keys.issue(&account.username)?;
    info!(account_id = account.id, username = %account.username, "user logged in");
    Ok(LoginResponse {
        username: account.username,
        email: account.email,
        token,
    })
}

pub async fn change_password(
    store: &dyn AccountStore,
    actor: &Claims,
    target: &str,
    req: ChangePasswordRequest,
) -> Result<AccountView, AppError> {
    require_fields(&[("password", req.password.as_str())])?;
    if let Some(body_username) = req.username.as_deref().map(str::trim) {
        if !body_username.is_empty() && body_username != target {
            return Err(AppError::Validation(
                "username in body does not match the path".into(),
            ));
        }
    }

    let account = store
        .find_by_username(target)
        .await?
        .ok_or_else(|| AppError::NotFound("account not found".into()))?;

    let password_hash = hash_password_blocking(req.password).await?;
    let updated = store
        .update_password_hash(account.id, &password_hash)
        .await?;

    info!(actor = %actor.sub, target = %updated.username, "password changed");
    Ok(updated.into())
}

pub async fn current_account(
    store: &dyn AccountStore,
    claims: &Claims,
) -> Result<AccountView, AppError> {
    store
        .find_by_username(&claims.sub)
        .await?
        .map(AccountView::from)
        .ok_or_else(|| AppError::NotFound("account not found".into()))
}
