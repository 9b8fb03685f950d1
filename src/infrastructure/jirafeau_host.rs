// Jirafeau file hosting client
use crate::application::image_host::ImageHost;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JirafeauHost {
    client: Client,
    endpoint: String,
}

impl JirafeauHost {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, endpoint })
    }

    async fn try_upload(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.png".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")?;
        // time=none keeps the file forever
        let form = Form::new().part("file", part).text("time", "none");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Failed to send upload request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upload failed with status {}: {}", status, body);
        }

        let body = response.text().await.context("Failed to read upload response")?;
        let token = parse_file_token(&body)
            .with_context(|| format!("Unexpected upload response: {:?}", body.trim()))?;
        Ok(download_url(&self.endpoint, token))
    }
}

#[async_trait]
impl ImageHost for JirafeauHost {
    async fn upload(&self, path: &Path) -> Option<String> {
        tracing::info!("Uploading {}", path.display());
        match self.try_upload(path).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Upload of {} failed: {:#}", path.display(), e);
                None
            }
        }
    }
}

/// The response lists the file token then the deletion code, one per line.
fn parse_file_token(body: &str) -> Option<&str> {
    let lines: Vec<&str> = body.trim().lines().map(str::trim).collect();
    match lines.as_slice() {
        [token, _, ..] if !token.is_empty() => Some(*token),
        _ => None,
    }
}

fn download_url(endpoint: &str, token: &str) -> String {
    format!("{}/f.php?h={}&p=1", endpoint.replace("/script.php", ""), token)
}
