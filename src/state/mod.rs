//! Conversation state persistence layer
//!
//! One small state per owner. Absent means idle; states are overwritten on
//! every transition and never deleted.

use crate::error::require_owner;
use crate::models::ConversationState;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod postgres;
pub use postgres::PostgresStateStore;

/// Trait for conversation state persistence
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, owner: &str) -> Result<ConversationState>;
    async fn set(&self, owner: &str, state: ConversationState) -> Result<()>;
}

/// In-memory state store for development and tests
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, ConversationState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, owner: &str) -> Result<ConversationState> {
        require_owner(owner)?;

        let states = self.states.read().await;
        Ok(states.get(owner).copied().unwrap_or_default())
    }

    async fn set(&self, owner: &str, state: ConversationState) -> Result<()> {
        require_owner(owner)?;

        let mut states = self.states.write().await;
        states.insert(owner.to_string(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;

    #[tokio::test]
    async fn test_absent_owner_is_idle() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.get("alice").await.unwrap(), ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = InMemoryStateStore::new();
        store.set("alice", ConversationState::AwaitingEntry).await.unwrap();
        store
            .set("alice", ConversationState::AwaitingTagAssignment)
            .await
            .unwrap();

        assert_eq!(
            store.get("alice").await.unwrap(),
            ConversationState::AwaitingTagAssignment
        );
        assert_eq!(store.get("bob").await.unwrap(), ConversationState::Idle);
    }

    #[tokio::test]
    async fn test_empty_owner_rejected() {
        let store = InMemoryStateStore::new();
        assert!(matches!(
            store.get("").await,
            Err(BotError::UnrecognizedOwner)
        ));
        assert!(store.set("", ConversationState::Idle).await.is_err());
    }
}
