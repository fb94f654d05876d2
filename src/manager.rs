use parking_lot::Mutex;

use crate::backend::GenerationBackend;
use crate::error::ServiceError;
use crate::protocol::GenerationRequest;

/// Owns the loaded backend handle and serializes every generation call.
///
/// The backend is injected at construction and never rotated; there is no
/// hot-reload. At most one generation runs at a time process-wide, with
/// concurrent callers queuing behind the lock in arrival order.
pub struct ModelManager {
    model_name: String,
    backend: Mutex<Box<dyn GenerationBackend>>,
}

impl ModelManager {
    pub fn new(model_name: impl Into<String>, backend: Box<dyn GenerationBackend>) -> Self {
        Self {
            model_name: model_name.into(),
            backend: Mutex::new(backend),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Run one generation under the process-wide lock.
    ///
    /// The attention cache is flushed unconditionally before and after the
    /// call, and again when it fails. This is call-scoped flushing, not
    /// eviction: resident memory stays bounded between requests at the cost
    /// of any cross-request cache reuse.
    pub fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let mut backend = self.backend.lock();
        backend.clear_cache();

        match backend.generate(&request.prompt, request.max_tokens, request.temperature) {
            Ok(text) => {
                backend.clear_cache();
                Ok(text)
            }
            Err(err) => {
                backend.clear_cache();
                tracing::error!(%err, "generation failed");
                Err(ServiceError::Generation(err.to_string()))
            }
        }
    }
}
