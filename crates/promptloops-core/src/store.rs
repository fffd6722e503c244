use promptloops_client::Credential;
use promptloops_db::{Database, HistoryEntry};
use std::sync::Mutex;
use thiserror::Error;

use crate::LoopError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Storage error: {0}")]
pub struct StoreError(pub String);

/// Where the loop records history and keeps the credential
pub trait PromptStore: Send + Sync {
    fn record_history(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    fn load_credential(&self) -> Result<Option<String>, StoreError>;

    fn save_credential(&self, credential: &Credential) -> Result<(), StoreError>;
}

impl PromptStore for Database {
    fn record_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.history()
            .append(entry)
            .map_err(|e| StoreError(e.to_string()))
    }

    fn load_credential(&self) -> Result<Option<String>, StoreError> {
        self.settings()
            .get_credential()
            .map_err(|e| StoreError(e.to_string()))
    }

    fn save_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.settings()
            .save_credential(credential.expose())
            .map_err(|e| StoreError(e.to_string()))
    }
}

/// Process-local store; nothing outlives it
#[derive(Debug, Default)]
pub struct MemoryStore {
    history: Mutex<Vec<HistoryEntry>>,
    credential: Mutex<Option<String>>,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Newest first, capped like the database
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history
            .lock()
            .map(|h| h.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing {
            Err(StoreError("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl PromptStore for MemoryStore {
    fn record_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.check()?;
        let mut history = self
            .history
            .lock()
            .map_err(|e| StoreError(e.to_string()))?;
        history.push(entry.clone());
        let excess = history.len().saturating_sub(promptloops_db::HISTORY_LIMIT);
        history.drain(..excess);
        Ok(())
    }

    fn load_credential(&self) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.credential
            .lock()
            .map(|c| c.clone())
            .map_err(|e| StoreError(e.to_string()))
    }

    fn save_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        self.check()?;
        let mut slot = self
            .credential
            .lock()
            .map_err(|e| StoreError(e.to_string()))?;
        *slot = Some(credential.expose().to_string());
        Ok(())
    }
}

/// Pick the credential: an explicit value (flag or environment) wins over the stored one.
///
/// Storage failures surface here, unlike elsewhere in the loop.
pub fn resolve_credential(
    explicit: Option<&str>,
    store: &dyn PromptStore,
) -> Result<Credential, LoopError> {
    if let Some(raw) = explicit.filter(|v| !v.trim().is_empty()) {
        return Ok(Credential::parse(raw)?);
    }

    match store.load_credential()? {
        Some(raw) => Ok(Credential::parse(&raw)?),
        None => Err(promptloops_client::CredentialError::Missing.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_client::CredentialError;

    #[test]
    fn test_explicit_credential_wins() {
        let store = MemoryStore::new();
        store
            .save_credential(&Credential::parse("sk-or-v1-stored").unwrap())
            .unwrap();

        let credential = resolve_credential(Some("sk-or-v1-flag"), &store).unwrap();
        assert_eq!(credential.expose(), "sk-or-v1-flag");
    }

    #[test]
    fn test_falls_back_to_stored_credential() {
        let store = MemoryStore::new();
        store
            .save_credential(&Credential::parse("sk-or-v1-stored").unwrap())
            .unwrap();

        let credential = resolve_credential(Some("   "), &store).unwrap();
        assert_eq!(credential.expose(), "sk-or-v1-stored");
    }

    #[test]
    fn test_missing_credential() {
        let err = resolve_credential(None, &MemoryStore::new()).unwrap_err();
        assert!(matches!(err, LoopError::Credential(CredentialError::Missing)));
    }

    #[test]
    fn test_malformed_credential() {
        let err = resolve_credential(Some("sk-ant-123"), &MemoryStore::new()).unwrap_err();
        assert!(matches!(err, LoopError::Credential(CredentialError::Malformed)));
    }

    #[test]
    fn test_storage_failure_surfaces_on_credential_path() {
        let err = resolve_credential(None, &MemoryStore::failing()).unwrap_err();
        assert!(matches!(err, LoopError::Storage(_)));
    }

    #[test]
    fn test_memory_store_caps_history() {
        let store = MemoryStore::new();
        for n in 0..(promptloops_db::HISTORY_LIMIT + 3) {
            let entry = HistoryEntry::new("out", "", format!("inst {}", n), None, "m");
            store.record_history(&entry).unwrap();
        }

        let history = store.history();
        assert_eq!(history.len(), promptloops_db::HISTORY_LIMIT);
        assert_eq!(
            history[0].instruction,
            format!("inst {}", promptloops_db::HISTORY_LIMIT + 2)
        );
    }

    #[test]
    fn test_database_store() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn PromptStore = &db;

        store
            .save_credential(&Credential::parse("sk-or-v1-db").unwrap())
            .unwrap();
        assert_eq!(
            store.load_credential().unwrap(),
            Some("sk-or-v1-db".to_string())
        );

        let entry = HistoryEntry::new("out", "ctx", "inst", Some("fb".into()), "m");
        store.record_history(&entry).unwrap();
        assert_eq!(db.history().list().unwrap(), vec![entry]);
    }
}
