use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::repo::{AccountStore, StoreError};
use super::repo_types::{Account, NewAccount};

#[derive(Default)]
struct Inner {
    next_id: i64,
    by_username: HashMap<String, Account>,
}

/// Process-local store keyed by username.
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: RwLock<Inner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().await.by_username.get(username).cloned())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.by_username.contains_key(&account.username) {
            return Err(StoreError::DuplicateUsername);
        }
        inner.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let created = Account {
            id: inner.next_id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner
            .by_username
            .insert(created.username.clone(), created.clone());
        Ok(created)
    }

    async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .by_username
            .values_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        account.password_hash = password_hash.to_string();
        account.updated_at = OffsetDateTime::now_utc();
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: "$argon2id$fake".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = MemoryAccountStore::new();
        let created = store.insert(new_account("alice")).await.expect("insert");
        let found = store
            .find_by_username("alice")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, "alice@example.com");
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryAccountStore::new();
        store.insert(new_account("alice")).await.expect("first insert");
        let err = store.insert(new_account("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let store = MemoryAccountStore::new();
        let a = store.insert(new_account("a")).await.unwrap();
        let b = store.insert(new_account("b")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_password_hash_replaces_hash() {
        let store = MemoryAccountStore::new();
        let created = store.insert(new_account("bob")).await.unwrap();
        let updated = store
            .update_password_hash(created.id, "$argon2id$other")
            .await
            .expect("update");
        assert_eq!(updated.password_hash, "$argon2id$other");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = MemoryAccountStore::new();
        let err = store.update_password_hash(42, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
