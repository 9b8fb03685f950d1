// Renderer traits for turning a live dashboard into static artifacts
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Log into the backend, load `url` and print the page to a PDF at `output`
    async fn render_pdf(&self, url: &str, output: &Path) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Write the first page of `pdf` as a PNG image at `output`
    async fn first_page_to_png(&self, pdf: &Path, output: &Path) -> anyhow::Result<()>;
}
