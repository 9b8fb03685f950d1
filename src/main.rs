// Main entry point - Configuration, dependency injection and the report run
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{sync::Arc, time::Duration};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::application::report_service::{ReportService, ReportSettings};
use crate::infrastructure::chrome_renderer::{ChromeRenderer, RenderOptions};
use crate::infrastructure::config::{load_app_config, load_sites};
use crate::infrastructure::grafana_repository::GrafanaRepository;
use crate::infrastructure::jirafeau_host::JirafeauHost;
use crate::infrastructure::pdftoppm_rasterizer::PdftoppmRasterizer;
use crate::infrastructure::smtp_mailer::SmtpMailer;
use crate::presentation::cli::{Cli, summary_lines};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = load_app_config(&cli.config)?;
    let sites = load_sites(&cli.sites)?;
    let timeout = Duration::from_secs(config.grafana.request_timeout_secs);

    // Create adapters (infrastructure layer)
    let repository = Arc::new(GrafanaRepository::new(
        config.grafana.url.clone(),
        config.grafana.api_key.clone(),
        timeout,
    )?);
    let renderer = Arc::new(ChromeRenderer::new(
        config.grafana.url.clone(),
        config.grafana.user.clone(),
        config.grafana.password.clone(),
        RenderOptions::from(&config.render),
    ));
    let rasterizer = Arc::new(PdftoppmRasterizer::new(
        config.render.pdftoppm.clone(),
        config.render.raster_dpi,
    ));
    let image_host = Arc::new(JirafeauHost::new(config.jirafeau.url.clone(), timeout)?);
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);

    // Create services (application layer)
    let dashboards = DashboardService::new(repository, config.template_source()?);
    let report_service = ReportService::new(
        dashboards,
        renderer,
        rasterizer,
        image_host,
        mailer,
        ReportSettings {
            backend_url: config.grafana.url.clone(),
            timezone: config.timezone()?,
            output_dir: config.paths.output_dir.clone(),
            subject_template: config.email.subject_template.clone(),
        },
    );

    let summary = report_service.run(&sites, &cli.month).await?;
    for line in summary_lines(&summary) {
        println!("{}", line);
    }

    if !summary.all_delivered() {
        anyhow::bail!(
            "{} of {} site reports were not delivered",
            summary.reports.len() - summary.delivered(),
            summary.reports.len()
        );
    }
    Ok(())
}
