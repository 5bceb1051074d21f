//! User persistence collaborator.
//!
//! Operations are parametrized: a username is always passed as a value,
//! never spliced into a query.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// One row of the users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    /// PHC string, never the plaintext
    pub password_hash: String,
    /// Registration time, `%Y-%m-%dT%H:%M:%S` local time
    pub registered: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or failed
    Unavailable(String),
    /// Unique key already taken
    Conflict(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(detail) => write!(f, "user store unavailable: {detail}"),
            StoreError::Conflict(username) => write!(f, "user {username} already exists"),
        }
    }
}

impl std::error::Error for StoreError {}

pub trait UserStore: Send + Sync {
    fn find(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new user; [`StoreError::Conflict`] when the name is taken.
    fn insert(&self, record: UserRecord) -> Result<(), StoreError>;

    /// Replace a user's password hash. Returns the number of rows changed.
    fn update_password(&self, username: &str, password_hash: &str) -> Result<u64, StoreError>;
}

/// In-process store used when no database collaborator is mounted, and in tests.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
    writes: AtomicU64,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful writes so far (inserts and password updates).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl UserStore for MemoryUserStore {
    fn find(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(username).cloned())
    }

    fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(&record.username) {
            return Err(StoreError::Conflict(record.username));
        }
        users.insert(record.username.clone(), record);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn update_password(&self, username: &str, password_hash: &str) -> Result<u64, StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        match users.get_mut(username) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                self.writes.fetch_add(1, Ordering::Relaxed);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            registered: "2024-01-01T00:00:00".to_string(),
        }
    }

    #[test]
    fn test_insert_conflict_does_not_write() {
        let store = MemoryUserStore::new();
        store.insert(record("alice")).unwrap();
        assert_eq!(
            store.insert(record("alice")),
            Err(StoreError::Conflict("alice".into()))
        );
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_password_counts_rows() {
        let store = MemoryUserStore::new();
        store.insert(record("alice")).unwrap();
        assert_eq!(store.update_password("alice", "new").unwrap(), 1);
        assert_eq!(store.update_password("bob", "new").unwrap(), 0);
        assert_eq!(store.find("alice").unwrap().unwrap().password_hash, "new");
        assert!(store.find("bob").unwrap().is_none());
    }
}
