//! Account directory
//!
//! The persistence boundary for accounts. The authentication pipeline only
//! talks to the [`AccountDirectory`] trait; backends decide how uniqueness
//! and concurrency are enforced.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Account, DirectoryError, Result};

/// Lookup and storage of accounts
///
/// Every call may be slow or fail. Callers do not retry.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Find an account by its exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Find an account by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// List every account, oldest first
    async fn find_all(&self) -> Result<Vec<Account>>;

    /// Insert or update an account
    ///
    /// Fails with [`DirectoryError::AlreadyExists`] when another account
    /// already holds the username.
    async fn save(&self, account: Account) -> Result<Account>;

    /// Delete an account, [`DirectoryError::NotFound`] when absent
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Process-local directory used for development and tests
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Account>> {
        let mut all: Vec<Account> = self.accounts.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(all)
    }

    async fn save(&self, account: Account) -> Result<Account> {
        // Check and insert under one write lock so concurrent registrations
        // of the same name cannot both succeed.
        let mut accounts = self.accounts.write().await;

        let taken = accounts
            .values()
            .any(|existing| existing.username == account.username && existing.id != account.id);
        if taken {
            return Err(DirectoryError::AlreadyExists(account.username));
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.accounts
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(DirectoryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_save_and_find() {
        let directory = InMemoryDirectory::new();
        let saved = directory
            .save(Account::new("alice", "hash", Role::User))
            .await
            .unwrap();

        let by_name = directory.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, saved.id);

        let by_id = directory.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(directory.find_by_username("Alice").await.unwrap().is_none());
        assert!(directory.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let directory = InMemoryDirectory::new();
        directory
            .save(Account::new("alice", "hash", Role::User))
            .await
            .unwrap();

        let result = directory
            .save(Account::new("alice", "other", Role::Admin))
            .await;
        assert!(matches!(result, Err(DirectoryError::AlreadyExists(name)) if name == "alice"));
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_save_updates_existing_id() {
        let directory = InMemoryDirectory::new();
        let mut account = directory
            .save(Account::new("alice", "hash", Role::User))
            .await
            .unwrap();

        account.role = Role::Admin;
        directory.save(account.clone()).await.unwrap();

        let stored = directory.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let directory = InMemoryDirectory::new();
        let account = directory
            .save(Account::new("alice", "hash", Role::User))
            .await
            .unwrap();

        directory.delete(account.id).await.unwrap();
        assert!(directory.is_empty().await);

        let again = directory.delete(account.id).await;
        assert!(matches!(again, Err(DirectoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let directory = Arc::new(InMemoryDirectory::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move {
                    directory
                        .save(Account::new("contested", "hash", Role::User))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(directory.len().await, 1);
    }
}
