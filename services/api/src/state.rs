//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the session registry and service clients.

use crate::{config::Config, telephony::CallTrigger};
use callrelay_core::{ConversationClient, SessionRegistry};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub conversation_client: Arc<ConversationClient>,
    pub call_trigger: Arc<dyn CallTrigger>,
    pub config: Arc<Config>,
}
