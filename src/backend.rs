use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("model runtime failure: {0}")]
    Runtime(String),
}

/// Opaque text-generation runtime.
///
/// The runtime is a blocking collaborator: `generate` runs synchronously and
/// is only safe under external locking, which [`ModelManager`] provides.
/// Implementations own their model and tokenizer handles; the gateway never
/// looks inside them.
///
/// [`ModelManager`]: crate::manager::ModelManager
pub trait GenerationBackend: Send {
    /// Produce a completion for `prompt`, at most `max_tokens` tokens long.
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: usize,
        temperature: f64,
    ) -> Result<String, BackendError>;

    /// Drop any attention-cache state held between calls.
    fn clear_cache(&mut self);
}

/// Placeholder backend for hosts without the ML runtime installed.
///
/// Answers every request with a fixed message echoing the head of the prompt,
/// so the HTTP surface and editor integrations can be exercised end to end.
pub struct StubBackend {
    model_id: String,
}

impl StubBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl GenerationBackend for StubBackend {
    fn generate(
        &mut self,
        prompt: &str,
        _max_tokens: usize,
        _temperature: f64,
    ) -> Result<String, BackendError> {
        let head: String = prompt.chars().take(100).collect();
        Ok(format!(
            "{} runtime not available. Would process: {head}...",
            self.model_id
        ))
    }

    fn clear_cache(&mut self) {}
}
