//! Durable token storage for the storelink SDK
//!
//! Holds the three persisted client values: access token, refresh token and
//! push token, in a single JSON file. The session pair is always replaced in
//! one write so a reader never observes a half-rotated pair. The disk write
//! happens before the in-memory value becomes authoritative.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{Result, StorelinkError};

/// Persisted client state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub push_token: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Token storage configuration
#[derive(Debug, Clone, Default)]
pub struct TokenStoreConfig {
    pub enabled: bool,
    pub storage_path: Option<PathBuf>,
    pub encryption_key: Option<String>,
}

/// Token storage manager
///
/// Safe for shared use across tasks; all access goes through the inner lock.
#[derive(Debug)]
pub struct TokenStore {
    config: TokenStoreConfig,
    state: RwLock<StoredState>,
}

impl TokenStore {
    pub fn new(config: TokenStoreConfig) -> Result<Self> {
        // An empty key would make the XOR scheme divide by zero
        if config.encryption_key.as_deref() == Some("") {
            return Err(StorelinkError::invalid_input(
                "Token storage encryption key cannot be empty",
            ));
        }

        let state = if config.enabled {
            Self::load_from_disk(&config)?
        } else {
            StoredState::default()
        };

        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// Memory-only store, used when persistence is disabled and in tests
    pub fn in_memory() -> Self {
        Self {
            config: TokenStoreConfig::default(),
            state: RwLock::new(StoredState::default()),
        }
    }

    // --- Reads ---

    pub fn access_token(&self) -> Option<String> {
        self.state.read().unwrap().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().unwrap().refresh_token.clone()
    }

    pub fn push_token(&self) -> Option<String> {
        self.state.read().unwrap().push_token.clone()
    }

    pub fn has_session(&self) -> bool {
        let state = self.state.read().unwrap();
        state.access_token.is_some() && state.refresh_token.is_some()
    }

    // --- Writes ---

    /// Replace the whole credential pair in one write
    pub fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.mutate(|state| {
            state.access_token = Some(access_token.to_string());
            state.refresh_token = Some(refresh_token.to_string());
        })
    }

    /// Replace only the access token, keeping the stored refresh token
    ///
    /// Refresh responses may omit a rotated refresh token; this is still a
    /// single write of the whole record.
    pub fn set_session_access(&self, access_token: &str) -> Result<()> {
        self.mutate(|state| {
            state.access_token = Some(access_token.to_string());
        })
    }

    pub fn set_push_token(&self, token: &str) -> Result<()> {
        self.mutate(|state| {
            state.push_token = Some(token.to_string());
        })
    }

    pub fn clear_push_token(&self) -> Result<()> {
        self.mutate(|state| {
            state.push_token = None;
        })
    }

    pub fn clear_session(&self) -> Result<()> {
        self.mutate(|state| {
            state.access_token = None;
            state.refresh_token = None;
        })
    }

    /// Clear everything; used on logout
    pub fn clear_all(&self) -> Result<()> {
        self.mutate(|state| {
            *state = StoredState::default();
        })
    }

    // --- Internals ---

    /// Apply a mutation, persist it, then publish it to memory.
    ///
    /// The lock is held across the disk write so concurrent writers cannot
    /// interleave and the persisted file always matches the in-memory state.
    fn mutate<F: FnOnce(&mut StoredState)>(&self, f: F) -> Result<()> {
        let mut guard = self.state.write().unwrap();
        let mut next = guard.clone();
        f(&mut next);
        next.updated_at = Some(Utc::now());

        if self.config.enabled {
            self.save_to_disk(&next)?;
        }
        *guard = next;
        Ok(())
    }

    fn storage_path(config: &TokenStoreConfig) -> Result<&PathBuf> {
        config
            .storage_path
            .as_ref()
            .ok_or_else(|| StorelinkError::invalid_input("Token storage path not configured"))
    }

    fn load_from_disk(config: &TokenStoreConfig) -> Result<StoredState> {
        let path = Self::storage_path(config)?;

        if !path.exists() {
            return Ok(StoredState::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| StorelinkError::storage("Failed to read token storage", e.to_string()))?;

        if content.trim().is_empty() {
            return Ok(StoredState::default());
        }

        let decrypted = if let Some(key) = &config.encryption_key {
            decrypt_content(&content, key)?
        } else {
            content
        };

        serde_json::from_str(&decrypted)
            .map_err(|e| StorelinkError::storage("Failed to parse token storage", e.to_string()))
    }

    fn save_to_disk(&self, state: &StoredState) -> Result<()> {
        let path = Self::storage_path(&self.config)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorelinkError::storage("Failed to create storage directory", e.to_string())
            })?;
        }

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StorelinkError::storage("Failed to serialize tokens", e.to_string()))?;

        let final_content = if let Some(key) = &self.config.encryption_key {
            encrypt_content(&content, key)
        } else {
            content
        };

        fs::write(path, final_content)
            .map_err(|e| StorelinkError::storage("Failed to write token storage", e.to_string()))?;

        Ok(())
    }
}

fn encrypt_content(content: &str, key: &str) -> String {
    let key_bytes = key.as_bytes();
    let mut encrypted = Vec::with_capacity(content.len());

    for (i, &byte) in content.as_bytes().iter().enumerate() {
        encrypted.push(byte ^ key_bytes[i % key_bytes.len()]);
    }

    base64::engine::general_purpose::STANDARD.encode(encrypted)
}

fn decrypt_content(encrypted_content: &str, key: &str) -> Result<String> {
    let encrypted_bytes = base64::engine::general_purpose::STANDARD
        .decode(encrypted_content.trim())
        .map_err(|e| StorelinkError::storage("Failed to decode token storage", e.to_string()))?;

    let key_bytes = key.as_bytes();
    let mut decrypted = Vec::with_capacity(encrypted_bytes.len());

    for (i, &byte) in encrypted_bytes.iter().enumerate() {
        decrypted.push(byte ^ key_bytes[i % key_bytes.len()]);
    }

    String::from_utf8(decrypted)
        .map_err(|e| StorelinkError::storage("Failed to decode token storage", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_store(dir: &TempDir) -> TokenStore {
        TokenStore::new(TokenStoreConfig {
            enabled: true,
            storage_path: Some(dir.path().join("session.json")),
            encryption_key: None,
        })
        .unwrap()
    }

    #[test]
    fn test_session_pair_replaced_together() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir);

        store.set_session("access-1", "refresh-1").unwrap();
        store.set_session("access-2", "refresh-2").unwrap();

        let reloaded = file_store(&dir);
        assert_eq!(reloaded.access_token().as_deref(), Some("access-2"));
        assert_eq!(reloaded.refresh_token().as_deref(), Some("refresh-2"));
    }

    #[test]
    fn test_access_only_rotation_keeps_refresh() {
        let store = TokenStore::in_memory();
        store.set_session("access-1", "refresh-1").unwrap();
        store.set_session_access("access-2").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("access-2"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_clear_all_removes_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir);

        store.set_session("a", "r").unwrap();
        store.set_push_token("push").unwrap();
        store.clear_all().unwrap();

        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.push_token().is_none());

        let reloaded = file_store(&dir);
        assert!(reloaded.push_token().is_none());
    }

    #[test]
    fn test_obfuscated_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = TokenStoreConfig {
            enabled: true,
            storage_path: Some(dir.path().join("session.json")),
            encryption_key: Some("storelink-test-key".to_string()),
        };

        let store = TokenStore::new(config.clone()).unwrap();
        store.set_session("access", "refresh").unwrap();

        // Raw file must not contain the plaintext token
        let raw = std::fs::read_to_string(dir.path().join("session.json")).unwrap();
        assert!(!raw.contains("access"));

        let reloaded = TokenStore::new(config).unwrap();
        assert_eq!(reloaded.access_token().as_deref(), Some("access"));
        assert_eq!(reloaded.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn test_empty_encryption_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = TokenStore::new(TokenStoreConfig {
            enabled: true,
            storage_path: Some(dir.path().join("session.json")),
            encryption_key: Some(String::new()),
        });

        assert!(result.is_err());
    }

    #[test]
    fn test_clear_session_keeps_push_token() {
        let store = TokenStore::in_memory();
        store.set_session("a", "r").unwrap();
        store.set_push_token("push").unwrap();
        store.clear_session().unwrap();

        assert!(store.access_token().is_none());
        assert_eq!(store.push_token().as_deref(), Some("push"));
    }
}
