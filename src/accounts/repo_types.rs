use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Account record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,                      // unique account ID
    pub username: String,             // unique login name
    pub email: String,                // contact email
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 PHC string, never exposed
    pub created_at: OffsetDateTime,   // creation timestamp
    pub updated_at: OffsetDateTime,   // last password change
}

/// Fields needed to create an account; the hash is computed before insert.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Account as returned to clients.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Account> for AccountView {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            username: a.username,
            email: a.email,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}
