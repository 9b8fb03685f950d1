// Headless Chromium renderer printing dashboards to PDF
use crate::application::page_renderer::PageRenderer;
use crate::infrastructure::config::RenderSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const PAGE_WIDTH_PX: u32 = 1392;
pub const PAGE_HEIGHT_PX: u32 = 3800;
const CSS_PX_PER_INCH: f64 = 96.0;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub settle: Duration,
    pub ready_expression: String,
    pub chrome_executable: Option<PathBuf>,
}

impl From<&RenderSettings> for RenderOptions {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            ready_timeout: Duration::from_secs(settings.ready_timeout_secs),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            settle: Duration::from_millis(settings.settle_ms),
            ready_expression: settings.ready_expression.clone(),
            chrome_executable: settings.chrome_executable.clone(),
        }
    }
}

pub struct ChromeRenderer {
    backend_url: String,
    username: String,
    password: String,
    options: RenderOptions,
}

impl ChromeRenderer {
    pub fn new(backend_url: String, username: String, password: String, options: RenderOptions) -> Self {
        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            username,
            password,
            options,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(PAGE_WIDTH_PX, PAGE_HEIGHT_PX)
            .viewport(Viewport {
                width: PAGE_WIDTH_PX,
                height: PAGE_HEIGHT_PX,
                ..Default::default()
            });
        if let Some(executable) = &self.options.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        builder
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid browser configuration: {}", e))
    }

    async fn login(&self, page: &Page) -> Result<()> {
        let login_url = format!("{}/login", self.backend_url);
        tracing::debug!("Logging in at {}", login_url);
        page.goto(login_url.as_str())
            .await
            .with_context(|| format!("Failed to open {}", login_url))?;

        page.find_element(r#"input[name="user"]"#)
            .await
            .context("Login form has no user field")?
            .click()
            .await?
            .type_str(&self.username)
            .await?;
        page.find_element(r#"input[name="password"]"#)
            .await
            .context("Login form has no password field")?
            .click()
            .await?
            .type_str(&self.password)
            .await?
            .press_key("Enter")
            .await?;

        page.wait_for_navigation()
            .await
            .context("Login did not navigate away from the form")?;
        Ok(())
    }

    async fn capture(&self, browser: &Browser, url: &str, output: &Path) -> Result<()> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open a browser tab")?;

        self.login(&page).await?;

        page.goto(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;

        let expression = self.options.ready_expression.as_str();
        let tab = &page;
        let ready = wait_until(self.options.ready_timeout, self.options.poll_interval, move || async move {
            match tab.evaluate(expression).await {
                Ok(result) => result.into_value::<bool>().unwrap_or(false),
                Err(e) => {
                    tracing::debug!("Readiness check failed: {}", e);
                    false
                }
            }
        })
        .await;
        if !ready {
            anyhow::bail!(
                "Dashboard did not finish loading within {}s",
                self.options.ready_timeout.as_secs()
            );
        }
        tokio::time::sleep(self.options.settle).await;

        let pdf = page.pdf(pdf_params()).await.context("Failed to print the page")?;
        tokio::fs::write(output, pdf)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        Ok(())
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render_pdf(&self, url: &str, output: &Path) -> Result<()> {
        tracing::info!("Printing dashboard to PDF from {}", url);
        let (mut browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .context("Failed to launch Chromium")?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.capture(&browser, url, output).await;

        // One browser per site, closed whatever the outcome
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {}", e);
        }
        handler_task.abort();

        result
    }
}

/// Paper matching the viewport, backgrounds included, no margins
pub fn pdf_params() -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(PAGE_WIDTH_PX as f64 / CSS_PX_PER_INCH),
        paper_height: Some(PAGE_HEIGHT_PX as f64 / CSS_PX_PER_INCH),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

/// Poll `check` every `interval` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pdf_params() {
        let params = pdf_params();
        assert_eq!(params.print_background, Some(true));
        assert_eq!(params.paper_width, Some(14.5));
        let height = params.paper_height.unwrap();
        assert!((height - 39.583).abs() < 0.001);
    }

    #[test]
    fn test_render_options_from_settings() {
        let options = RenderOptions::from(&RenderSettings::default());
        assert_eq!(options.ready_timeout, Duration::from_secs(60));
        assert_eq!(options.poll_interval, Duration::from_millis(500));
        assert!(options.ready_expression.contains("document.readyState"));
    }

    #[test]
    fn test_backend_url_is_normalized() {
        let renderer = ChromeRenderer::new(
            "https://grafana.example.com/".to_string(),
            "bot".to_string(),
            "pw".to_string(),
            RenderOptions::from(&RenderSettings::default()),
        );
        assert_eq!(renderer.backend_url, "https://grafana.example.com");
    }

    #[tokio::test]
    async fn test_wait_until_becomes_ready() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let ready = wait_until(Duration::from_secs(5), Duration::from_millis(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst) >= 2
        })
        .await;

        assert!(ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let start = Instant::now();
        let ready = wait_until(Duration::from_millis(50), Duration::from_millis(10), || async { false }).await;

        assert!(!ready);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
