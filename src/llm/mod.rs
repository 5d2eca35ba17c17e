pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::warn;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    Timeout(u64),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "Completion connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "Completion response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "Completion configuration error: {}", msg),
            LlmError::Timeout(secs) => {
                write!(f, "Completion call timed out after {} seconds", secs)
            }
        }
    }
}

impl Error for LlmError {}

/// Opaque text-generation capability: a prompt goes in, free text comes out.
/// The session id lets providers keep per-conversation state if they want to.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(&self, prompt: &str, session_id: &str) -> Result<String, LlmError>;
}

/// Selects a provider once at construction and bounds every call with a hard
/// timeout. A timed-out call is a failure, never retried.
pub struct LlmManager {
    provider: Box<dyn CompletionProvider>,
    timeout: Duration,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Box<dyn CompletionProvider> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteCompletionProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaCompletionProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported completion backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self {
            provider,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Wraps any provider, mainly for tests and embedding.
    pub fn with_provider(provider: Box<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn generate(&self, prompt: &str, session_id: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.provider.generate(prompt, session_id)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Completion call for session {} exceeded {}s",
                    session_id,
                    self.timeout.as_secs()
                );
                Err(LlmError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    #[async_trait]
    impl CompletionProvider for SlowProvider {
        async fn generate(&self, _prompt: &str, _session_id: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok("too late".to_string())
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn generate(&self, prompt: &str, _session_id: &str) -> Result<String, LlmError> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let manager = LlmManager::with_provider(Box::new(SlowProvider), Duration::from_secs(1));
        match manager.generate("hello", "s1").await {
            Err(LlmError::Timeout(1)) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn fast_provider_passes_through() {
        let manager = LlmManager::with_provider(Box::new(EchoProvider), Duration::from_secs(1));
        let answer = manager.generate("hello", "s1").await.unwrap();
        assert_eq!(answer, "hello");
    }
}
