use std::time::Duration;

/// Failures surfaced by the language-model provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("model provider request failed: {0}")]
    Upstream(String),
    #[error("model provider did not answer within {0:?}")]
    Timeout(Duration),
    #[error("model provider returned an empty reply")]
    EmptyReply,
}

impl From<async_openai::error::OpenAIError> for ProviderError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Self::Upstream(err.to_string())
    }
}
