use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::types::PersistedProfile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("stale profile write for {user_id}: attempted version {attempted}, stored {stored}")]
    VersionConflict {
        user_id: String,
        attempted: u64,
        stored: u64,
    },
}

/// Persistence contract for user profiles, scoped to one transaction per
/// interaction. Implementations must enforce the optimistic version check:
/// a save is valid only when the incoming version is exactly one above the
/// stored version (or the profile is new at version 1).
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<PersistedProfile>, StoreError>;
    async fn save_profile(&self, profile: &PersistedProfile) -> Result<(), StoreError>;
}

/// In-memory store used in tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, PersistedProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<PersistedProfile>, StoreError> {
        Ok(self.profiles.read().get(user_id).cloned())
    }

    async fn save_profile(&self, profile: &PersistedProfile) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write();
        let stored_version = profiles.get(&profile.user_id).map(|p| p.version).unwrap_or(0);
        if profile.version != stored_version + 1 {
            return Err(StoreError::VersionConflict {
                user_id: profile.user_id.clone(),
                attempted: profile.version,
                stored: stored_version,
            });
        }
        profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}
