// File hosting trait for publishing rendered images
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload a file and return its shareable URL.
    /// Failures are logged by the implementation and reported as `None`.
    async fn upload(&self, path: &Path) -> Option<String>;
}
