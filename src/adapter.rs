use anyhow::Result;
use async_trait::async_trait;

use crate::completion::CompletionError;
use crate::types::ClassificationResult;

/// Local sentiment classifier seam between the HTTP handler and the model.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;
}

/// Remote completion backend seam.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, text: &str) -> Result<String, CompletionError>;
}
