//! Local owner accounts.
//!
//! Owners are kept under `guide-users` as a map from id to record, and the
//! signed-in owner's id under `guide-session`. Emails are trimmed and
//! lowercased before any comparison; passwords are stored as SHA-256 hex.
//! This is a convenience for a single machine, not access control.

use crate::guide::{new_id, now_millis};
use crate::store::{KeyValueStore, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

pub const USERS_KEY: &str = "guide-users";
pub const SESSION_KEY: &str = "guide-session";

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password is required")]
    EmptyPassword,
    #[error("an account already exists for {0}")]
    AlreadyRegistered(String),
    #[error("no account found for {0}")]
    UnknownEmail(String),
    #[error("wrong password")]
    WrongPassword,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

pub struct Accounts<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Accounts<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Unreadable user maps count as empty.
    fn users(&self) -> Result<BTreeMap<String, Owner>, AccountError> {
        let Some(raw) = self.store.get(USERS_KEY)? else {
            return Ok(BTreeMap::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable user map");
            BTreeMap::new()
        }))
    }

    pub fn owner_by_id(&self, id: &str) -> Result<Option<Owner>, AccountError> {
        Ok(self.users()?.remove(id))
    }

    pub fn owner_by_email(&self, email: &str) -> Result<Option<Owner>, AccountError> {
        let email = normalize_email(email);
        Ok(self.users()?.into_values().find(|o| o.email == email))
    }

    /// Create an account and sign it in.
    pub fn register(&mut self, email: &str, password: &str) -> Result<Owner, AccountError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AccountError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AccountError::EmptyPassword);
        }
        let mut users = self.users()?;
        if users.values().any(|o| o.email == email) {
            return Err(AccountError::AlreadyRegistered(email));
        }
        let owner = Owner {
            id: new_id(),
            email,
            password_hash: hash_password(password),
            created_at: now_millis(),
        };
        users.insert(owner.id.clone(), owner.clone());
        self.store.set(USERS_KEY, serde_json::to_string(&users)?)?;
        self.store.set(SESSION_KEY, owner.id.clone())?;
        tracing::info!(owner = %owner.email, "registered owner");
        Ok(owner)
    }

    /// Check credentials and sign the owner in.
    pub fn authenticate(&mut self, email: &str, password: &str) -> Result<Owner, AccountError> {
        let normalized = normalize_email(email);
        if normalized.is_empty() {
            return Err(AccountError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AccountError::EmptyPassword);
        }
        let owner = self
            .owner_by_email(&normalized)?
            .ok_or(AccountError::UnknownEmail(normalized))?;
        if owner.password_hash != hash_password(password) {
            return Err(AccountError::WrongPassword);
        }
        self.store.set(SESSION_KEY, owner.id.clone())?;
        Ok(owner)
    }

    /// The signed-in owner, if the session points at a known account.
    pub fn current_owner(&self) -> Result<Option<Owner>, AccountError> {
        match self.store.get(SESSION_KEY)? {
            Some(id) if !id.is_empty() => self.owner_by_id(&id),
            _ => Ok(None),
        }
    }

    pub fn sign_out(&mut self) -> Result<(), AccountError> {
        self.store.remove(SESSION_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn register_normalizes_email_and_signs_in() {
        let mut accounts = Accounts::new(MemoryStore::new());
        let owner = accounts.register("  Hote@Example.FR ", "secret").unwrap();
        assert_eq!(owner.email, "hote@example.fr");
        assert_eq!(owner.password_hash.len(), 64);
        assert_eq!(accounts.current_owner().unwrap(), Some(owner));
    }

    #[test]
    fn password_hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn duplicate_and_invalid_registrations_rejected() {
        let mut accounts = Accounts::new(MemoryStore::new());
        accounts.register("a@b.fr", "x").unwrap();
        assert!(matches!(
            accounts.register("A@B.FR", "y"),
            Err(AccountError::AlreadyRegistered(_))
        ));
        assert!(matches!(accounts.register("  ", "y"), Err(AccountError::InvalidEmail)));
        assert!(matches!(accounts.register("c@d.fr", ""), Err(AccountError::EmptyPassword)));
    }

    #[test]
    fn authenticate_checks_password() {
        let mut accounts = Accounts::new(MemoryStore::new());
        let owner = accounts.register("a@b.fr", "right").unwrap();
        accounts.sign_out().unwrap();
        assert_eq!(accounts.current_owner().unwrap(), None);

        assert!(matches!(
            accounts.authenticate("a@b.fr", "wrong"),
            Err(AccountError::WrongPassword)
        ));
        assert!(matches!(
            accounts.authenticate("z@b.fr", "right"),
            Err(AccountError::UnknownEmail(_))
        ));
        assert_eq!(accounts.authenticate(" A@B.fr", "right").unwrap(), owner);
        assert_eq!(accounts.current_owner().unwrap().unwrap().id, owner.id);
    }

    #[test]
    fn corrupt_user_map_reads_as_empty() {
        let mut store = MemoryStore::new();
        store.set(USERS_KEY, "[oops".into()).unwrap();
        let accounts = Accounts::new(store);
        assert_eq!(accounts.owner_by_email("a@b.fr").unwrap(), None);
    }
}
