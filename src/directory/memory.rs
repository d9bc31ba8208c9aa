//! In-process directory backing the service and HTTP test suites.

use super::{Directory, DirectoryError, NewUserRecord, User, UserId};
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct Offline;

#[derive(Debug, Default)]
struct Table {
    next_id: UserId,
    users: BTreeMap<UserId, User>,
}

impl Table {
    fn email_owner(&self, email: &str) -> Option<UserId> {
        self.users
            .values()
            .find(|user| user.profile.email == email)
            .map(|user| user.id)
    }
}

/// Users held in a map behind a single lock, so uniqueness checks and writes
/// happen in one critical section. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    table: RwLock<Table>,
    unavailable: AtomicBool,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`DirectoryError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DirectoryError::unavailable(Offline))
        } else {
            Ok(())
        }
    }
}

impl Directory for MemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        self.check()?;
        let table = self.table.read().await;
        table
            .users
            .values()
            .find(|user| user.profile.email == email)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, DirectoryError> {
        self.check()?;
        let table = self.table.read().await;
        table.users.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    async fn insert(&self, user: NewUserRecord) -> Result<UserId, DirectoryError> {
        self.check()?;
        let mut table = self.table.write().await;
        if table.email_owner(&user.profile.email).is_some() {
            return Err(DirectoryError::EmailTaken);
        }

        table.next_id += 1;
        let id = table.next_id;
        table.users.insert(
            id,
            User {
                id,
                profile: user.profile,
                password_hash: user.password_hash,
            },
        );

        Ok(id)
    }

    async fn update_email(&self, id: UserId, email: &str) -> Result<u64, DirectoryError> {
        self.check()?;
        let mut table = self.table.write().await;
        if table.email_owner(email).is_some_and(|owner| owner != id) {
            return Err(DirectoryError::EmailTaken);
        }

        Ok(table.users.get_mut(&id).map_or(0, |user| {
            user.profile.email = email.to_string();
            1
        }))
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<u64, DirectoryError> {
        self.check()?;
        let mut table = self.table.write().await;

        Ok(table.users.get_mut(&id).map_or(0, |user| {
            user.password_hash = password_hash.to_string();
            1
        }))
    }

    async fn update_credentials(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<u64, DirectoryError> {
        self.check()?;
        let mut table = self.table.write().await;
        if table.email_owner(email).is_some_and(|owner| owner != id) {
            return Err(DirectoryError::EmailTaken);
        }

        Ok(table.users.get_mut(&id).map_or(0, |user| {
            user.profile.email = email.to_string();
            user.password_hash = password_hash.to_string();
            1
        }))
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        self.check()
    }
}
