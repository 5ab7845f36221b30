use anyhow::Context;
use serde::Deserialize;

/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");

        let ttl_minutes = var("JWT_TTL_MINUTES")
            .map(|v| v.trim().parse::<i64>())
            .transpose()
            .context("JWT_TTL_MINUTES must be an integer")?
            .unwrap_or(60);
        anyhow::ensure!(
            (1..=MAX_TTL_MINUTES).contains(&ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}"
        );

        let leeway_secs = var("JWT_LEEWAY_SECS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .context("JWT_LEEWAY_SECS must be a non-negative integer")?
            .unwrap_or(0);

        let jwt = JwtConfig {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "gamereview".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "gamereview-users".into()),
            ttl_minutes,
            leeway_secs,
        };
        Ok(Self { database_url, jwt })
    }
}
