//! Per-sender conversation state for the photo upload flow.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

/// Chat identifier of the conversation a message came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(pub i64);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents where a conversation is in the upload flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingPhoto,
}

/// In-memory store of conversation states keyed by sender
///
/// Unknown senders are `Idle`. Idle senders are not stored, so the map only
/// grows with conversations that are waiting for a photo. State is lost on
/// restart, which simply sends everyone back to the main menu.
#[derive(Debug, Default)]
pub struct SessionStore {
    states: RwLock<HashMap<SenderId, ConversationState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, sender: SenderId) -> ConversationState {
        self.states
            .read()
            .await
            .get(&sender)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set(&self, sender: SenderId, state: ConversationState) {
        let mut states = self.states.write().await;
        match state {
            ConversationState::Idle => {
                states.remove(&sender);
            }
            other => {
                states.insert(sender, other);
            }
        }
    }

    /// Equivalent to `set(sender, ConversationState::Idle)`
    pub async fn clear(&self, sender: SenderId) {
        self.set(sender, ConversationState::Idle).await;
    }

    /// Number of senders currently not idle
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}
