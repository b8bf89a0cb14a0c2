//! Per-connection relay state machine.
//!
//! A `RelaySession` is created for every ConversationRelay WebSocket. It binds
//! the connection to a call on `setup`, forwards each `prompt` to the model
//! through the call's conversation handle and releases the registry entry
//! when the connection ends. Events are handled one at a time in arrival
//! order.

use super::protocol::{InboundEvent, OutboundEvent};
use callrelay_core::{ConversationClient, ProviderError, SessionRegistry, SharedConversation};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("malformed relay message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("prompt received with no active session (call sid: {0:?})")]
    NoSession(Option<String>),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The call a connection is serving and the conversation it registered for it.
struct Binding {
    call_sid: String,
    conversation: SharedConversation,
}

pub struct RelaySession {
    registry: Arc<SessionRegistry>,
    client: Arc<ConversationClient>,
    fallback_reply: Arc<str>,
    binding: Option<Binding>,
}

impl RelaySession {
    pub fn new(
        registry: Arc<SessionRegistry>,
        client: Arc<ConversationClient>,
        fallback_reply: Arc<str>,
    ) -> Self {
        Self {
            registry,
            client,
            fallback_reply,
            binding: None,
        }
    }

    /// The call this connection is bound to, once `setup` has been received.
    pub fn call_sid(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.call_sid.as_str())
    }

    /// Decodes and handles one text frame, returning the reply to send, if any.
    ///
    /// Never fails: malformed frames and out-of-order prompts are logged and
    /// skipped, and model failures are answered with the fallback reply.
    pub async fn handle_text(&mut self, text: &str) -> Option<OutboundEvent> {
        let result = match InboundEvent::decode(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => Err(RelayError::from(e)),
        };

        match result {
            Ok(reply) => reply,
            Err(RelayError::Provider(e)) => {
                error!(error = %e, call_sid = ?self.call_sid(), "Model call failed; sending fallback reply");
                Some(OutboundEvent::final_text(self.fallback_reply.as_ref()))
            }
            Err(e @ RelayError::Malformed(_)) => {
                warn!(error = %e, "Skipping relay message");
                None
            }
            Err(e @ RelayError::NoSession(_)) => {
                error!(error = %e, "Skipping relay message");
                None
            }
        }
    }

    pub async fn handle_event(
        &mut self,
        event: InboundEvent,
    ) -> Result<Option<OutboundEvent>, RelayError> {
        match event {
            InboundEvent::Setup {
                call_sid,
                from,
                to,
                direction,
            } => {
                self.setup(call_sid, from, to, direction).await;
                Ok(None)
            }
            InboundEvent::Prompt { voice_prompt, .. } => {
                self.prompt(&voice_prompt).await.map(Some)
            }
            InboundEvent::Interrupt {
                utterance_until_interrupt,
                duration_until_interrupt_ms,
            } => {
                info!(
                    call_sid = ?self.call_sid(),
                    heard = ?utterance_until_interrupt,
                    after_ms = ?duration_until_interrupt_ms,
                    "Caller interrupted the reply"
                );
                Ok(None)
            }
            InboundEvent::Unknown => {
                warn!(call_sid = ?self.call_sid(), "Ignoring unknown relay message type");
                Ok(None)
            }
        }
    }

    async fn setup(
        &mut self,
        call_sid: String,
        from: Option<String>,
        to: Option<String>,
        direction: Option<String>,
    ) {
        if let Some(previous) = self.binding.take() {
            if previous.call_sid != call_sid {
                warn!(previous = %previous.call_sid, %call_sid, "Connection re-bound to a different call");
            }
            self.registry
                .remove_if_same(&previous.call_sid, &previous.conversation)
                .await;
        }

        tracing::Span::current().record("call_sid", call_sid.as_str());
        info!(%call_sid, ?from, ?to, ?direction, "Setup for call");

        let conversation = Arc::new(Mutex::new(self.client.start_conversation()));
        if self
            .registry
            .insert(call_sid.clone(), conversation.clone())
            .await
            .is_some()
        {
            warn!(%call_sid, "Replaced an existing session for this call");
        }
        self.binding = Some(Binding {
            call_sid,
            conversation,
        });
    }

    async fn prompt(&mut self, utterance: &str) -> Result<OutboundEvent, RelayError> {
        let Some(binding) = &self.binding else {
            return Err(RelayError::NoSession(None));
        };
        // The entry may have been taken over by a newer connection for the same call.
        match self.registry.get(&binding.call_sid).await {
            Some(current) if Arc::ptr_eq(&current, &binding.conversation) => {}
            _ => return Err(RelayError::NoSession(Some(binding.call_sid.clone()))),
        }

        info!(call_sid = %binding.call_sid, prompt = %utterance, "Processing prompt");
        let mut conversation = binding.conversation.lock().await;
        let reply = self.client.send(&mut conversation, utterance).await?;
        info!(call_sid = %binding.call_sid, response = %reply, "Sending response");
        Ok(OutboundEvent::final_text(reply))
    }

    /// Releases the registry entry for the bound call. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(Binding {
            call_sid,
            conversation,
        }) = self.binding.take()
        {
            if self.registry.remove_if_same(&call_sid, &conversation).await {
                info!(%call_sid, "Cleared session for call");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callrelay_core::ScriptedChatModel;
    use std::time::Duration;

    fn session_with(model: Arc<ScriptedChatModel>, registry: Arc<SessionRegistry>) -> RelaySession {
        let client = Arc::new(ConversationClient::new(
            model,
            "be brief",
            Duration::from_secs(5),
        ));
        RelaySession::new(registry, client, Arc::from("Sorry, say again?"))
    }

    fn setup(call_sid: &str) -> String {
        format!(r#"{{"type":"setup","callSid":"{call_sid}"}}"#)
    }

    fn prompt(text: &str) -> String {
        format!(r#"{{"type":"prompt","voicePrompt":"{text}"}}"#)
    }

    #[tokio::test]
    async fn prompt_before_setup_is_ignored() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = session_with(Arc::new(ScriptedChatModel::new()), registry.clone());

        assert_eq!(session.handle_text(&prompt("hello")).await, None);
        assert!(matches!(
            session
                .handle_event(InboundEvent::Prompt {
                    voice_prompt: "hello".to_string(),
                    lang: None,
                    last: None,
                })
                .await,
            Err(RelayError::NoSession(None))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn setup_then_prompt_yields_one_final_text() {
        let registry = Arc::new(SessionRegistry::new());
        let model = Arc::new(ScriptedChatModel::with_replies(["Nirma keeps whites bright!"]));
        let mut session = session_with(model, registry.clone());

        assert_eq!(session.handle_text(&setup("CA1")).await, None);
        assert_eq!(session.call_sid(), Some("CA1"));
        assert!(registry.contains("CA1").await);

        let reply = session.handle_text(&prompt("hello")).await;
        assert_eq!(
            reply,
            Some(OutboundEvent::Text {
                token: "Nirma keeps whites bright!".to_string(),
                last: true,
            })
        );
    }

    #[tokio::test]
    async fn second_prompt_sees_first_exchange() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = session_with(Arc::new(ScriptedChatModel::new()), registry.clone());

        session.handle_text(&setup("CA1")).await;
        session.handle_text(&prompt("u1")).await;
        let reply = session.handle_text(&prompt("u2")).await;

        assert_eq!(reply, Some(OutboundEvent::final_text("[3 turns] you said: u2")));
        let conversation = registry.get("CA1").await.unwrap();
        assert_eq!(conversation.lock().await.history().len(), 4);
    }

    #[tokio::test]
    async fn close_removes_session_and_is_idempotent() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = session_with(Arc::new(ScriptedChatModel::new()), registry.clone());

        session.handle_text(&setup("CA1")).await;
        session.close().await;
        assert!(!registry.contains("CA1").await);
        assert_eq!(session.call_sid(), None);

        session.close().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn interrupt_and_unknown_events_produce_nothing() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = session_with(Arc::new(ScriptedChatModel::new()), registry.clone());

        assert_eq!(session.handle_text(r#"{"type":"interrupt"}"#).await, None);
        session.handle_text(&setup("CA1")).await;
        assert_eq!(
            session
                .handle_text(r#"{"type":"interrupt","utteranceUntilInterrupt":"Nir"}"#)
                .await,
            None
        );
        assert_eq!(session.handle_text(r#"{"type":"dtmf","digit":"5"}"#).await, None);
        assert!(registry.contains("CA1").await);
    }

    #[tokio::test]
    async fn malformed_messages_are_skipped() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = session_with(Arc::new(ScriptedChatModel::new()), registry.clone());

        session.handle_text(&setup("CA1")).await;
        assert_eq!(session.handle_text("{not json").await, None);
        assert_eq!(session.handle_text(r#"{"type":"prompt"}"#).await, None);

        let reply = session.handle_text(&prompt("still here?")).await;
        assert!(reply.is_some());
    }

    #[tokio::test]
    async fn provider_failure_sends_fallback_reply() {
        let registry = Arc::new(SessionRegistry::new());
        let model = Arc::new(ScriptedChatModel::new());
        model
            .push(Err(ProviderError::Upstream("503".to_string())))
            .await;
        let mut session = session_with(model, registry.clone());

        session.handle_text(&setup("CA1")).await;
        let reply = session.handle_text(&prompt("hello")).await;

        assert_eq!(reply, Some(OutboundEvent::final_text("Sorry, say again?")));
        let conversation = registry.get("CA1").await.unwrap();
        assert!(conversation.lock().await.history().is_empty());
    }

    #[tokio::test]
    async fn rebinding_to_another_call_releases_the_old_entry() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = session_with(Arc::new(ScriptedChatModel::new()), registry.clone());

        session.handle_text(&setup("CA1")).await;
        session.handle_text(&setup("CA2")).await;

        assert!(!registry.contains("CA1").await);
        assert!(registry.contains("CA2").await);
        assert_eq!(session.call_sid(), Some("CA2"));
    }

    #[tokio::test]
    async fn concurrent_calls_keep_separate_histories() {
        let registry = Arc::new(SessionRegistry::new());
        let model = Arc::new(ScriptedChatModel::new());
        let mut a = session_with(model.clone(), registry.clone());
        let mut b = session_with(model, registry.clone());

        a.handle_text(&setup("CA-A")).await;
        b.handle_text(&setup("CA-B")).await;

        let (pa, pb) = (prompt("apples"), prompt("bananas"));
        let (ra, rb) = tokio::join!(a.handle_text(&pa), b.handle_text(&pb));
        assert_eq!(ra, Some(OutboundEvent::final_text("[1 turns] you said: apples")));
        assert_eq!(rb, Some(OutboundEvent::final_text("[1 turns] you said: bananas")));

        let rb = b.handle_text(&prompt("cherries")).await;
        assert_eq!(rb, Some(OutboundEvent::final_text("[3 turns] you said: cherries")));

        let a_history = registry.get("CA-A").await.unwrap();
        assert_eq!(a_history.lock().await.history().len(), 2);
    }

    #[tokio::test]
    async fn stale_close_keeps_the_newer_connection_session() {
        let registry = Arc::new(SessionRegistry::new());
        let model = Arc::new(ScriptedChatModel::new());
        let mut old = session_with(model.clone(), registry.clone());
        let mut new = session_with(model, registry.clone());

        old.handle_text(&setup("CA1")).await;
        new.handle_text(&setup("CA1")).await;
        old.close().await;

        assert!(registry.contains("CA1").await);
        let reply = new.handle_text(&prompt("hello")).await;
        assert_eq!(reply, Some(OutboundEvent::final_text("[1 turns] you said: hello")));

        new.close().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn superseded_connection_stops_answering() {
        let registry = Arc::new(SessionRegistry::new());
        let model = Arc::new(ScriptedChatModel::new());
        let mut old = session_with(model.clone(), registry.clone());
        let mut new = session_with(model, registry.clone());

        old.handle_text(&setup("CA1")).await;
        new.handle_text(&setup("CA1")).await;

        assert_eq!(old.handle_text(&prompt("hello")).await, None);
        let conversation = registry.get("CA1").await.unwrap();
        assert!(conversation.lock().await.history().is_empty());
    }
}
