//! Process-wide mapping from call identifiers to conversation handles.

use crate::conversation::Conversation;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

/// A conversation that can be locked across the model call.
pub type SharedConversation = Arc<Mutex<Conversation>>;

/// Concurrency-safe registry of active call sessions.
///
/// Each entry is owned by the relay connection that created it. The outer
/// lock is held only for map operations, never across a model call.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SharedConversation>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `conversation` under `call_sid`, returning any entry it replaced.
    pub async fn insert(
        &self,
        call_sid: impl Into<String>,
        conversation: SharedConversation,
    ) -> Option<SharedConversation> {
        self.sessions
            .lock()
            .await
            .insert(call_sid.into(), conversation)
    }

    pub async fn get(&self, call_sid: &str) -> Option<SharedConversation> {
        self.sessions.lock().await.get(call_sid).cloned()
    }

    /// Removes the entry for `call_sid`. Removing an absent key is a no-op.
    pub async fn remove(&self, call_sid: &str) -> bool {
        self.sessions.lock().await.remove(call_sid).is_some()
    }

    /// Removes the entry for `call_sid` only while it still holds `handle`.
    ///
    /// A connection whose entry was taken over by a newer `setup` for the
    /// same call leaves the newer entry in place.
    pub async fn remove_if_same(&self, call_sid: &str, handle: &SharedConversation) -> bool {
        let mut sessions = self.sessions.lock().await;
        let same = sessions
            .get(call_sid)
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        if same {
            sessions.remove(call_sid);
        }
        same
    }

    pub async fn contains(&self, call_sid: &str) -> bool {
        self.sessions.lock().await.contains_key(call_sid)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
