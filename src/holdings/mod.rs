use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{HoldingsSnapshot, UserId};

/// Errors from the holdings lookup collaborator
#[derive(Debug, Error)]
pub enum HoldingsError {
    /// The identity has no portfolio; registration is refused
    #[error("no holdings found for user {0}")]
    NotFound(UserId),

    #[error("holdings lookup failed: {0}")]
    Lookup(String),
}

/// Identity & holdings lookup, invoked once per registration
///
/// Holdings are snapshotted into the session at connect time and never
/// refreshed mid-session; a user who changes their portfolio reconnects.
/// Production deployments implement this over their user/profile service.
#[async_trait::async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Fetch the holdings snapshot for one user
    async fn lookup_holdings(&self, user_id: UserId) -> Result<HoldingsSnapshot, HoldingsError>;
}

/// In-memory holdings store for the sim feed and tests
#[derive(Default)]
pub struct InMemoryHoldingsProvider {
    accounts: RwLock<HashMap<UserId, HoldingsSnapshot>>,
}

impl InMemoryHoldingsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: UserId, holdings: HoldingsSnapshot) {
        self.accounts.write().insert(user_id, holdings);
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.accounts.read().keys().copied().collect()
    }
}

#[async_trait::async_trait]
impl HoldingsProvider for InMemoryHoldingsProvider {
    async fn lookup_holdings(&self, user_id: UserId) -> Result<HoldingsSnapshot, HoldingsError> {
        self.accounts
            .read()
            .get(&user_id)
            .cloned()
            .ok_or(HoldingsError::NotFound(user_id))
    }
}
