// Report service - Runs the monthly report for every site, one after the other
use crate::application::dashboard_service::DashboardService;
use crate::application::image_host::ImageHost;
use crate::application::mailer::Mailer;
use crate::application::page_renderer::{PageRenderer, Rasterizer};
use crate::domain::period::{ReportPeriod, TimeRange};
use crate::domain::report_email::{ReportEmail, fill_placeholders};
use crate::domain::site::Site;
use anyhow::Context;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Settings shared by every site of a run
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub backend_url: String,
    pub timezone: Tz,
    pub output_dir: PathBuf,
    pub subject_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteOutcome {
    Delivered,
    /// The report was rendered but could not be published, so no email went out
    NotDelivered(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SiteReport {
    pub site: String,
    pub outcome: SiteOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<SiteReport>,
}

impl RunSummary {
    pub fn delivered(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == SiteOutcome::Delivered)
            .count()
    }

    pub fn all_delivered(&self) -> bool {
        self.delivered() == self.reports.len()
    }
}

/// Artifacts written for one site
#[derive(Debug, Clone)]
struct Artifacts {
    pdf: PathBuf,
    png: PathBuf,
}

#[derive(Clone)]
pub struct ReportService {
    dashboards: DashboardService,
    renderer: Arc<dyn PageRenderer>,
    rasterizer: Arc<dyn Rasterizer>,
    image_host: Arc<dyn ImageHost>,
    mailer: Arc<dyn Mailer>,
    settings: ReportSettings,
}

impl ReportService {
    pub fn new(
        dashboards: DashboardService,
        renderer: Arc<dyn PageRenderer>,
        rasterizer: Arc<dyn Rasterizer>,
        image_host: Arc<dyn ImageHost>,
        mailer: Arc<dyn Mailer>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            dashboards,
            renderer,
            rasterizer,
            image_host,
            mailer,
            settings,
        }
    }

    /// Generate and send the report of `period` for each site in order.
    /// A failing site is logged and skipped; later sites still run.
    pub async fn run(&self, sites: &[Site], period: &ReportPeriod) -> anyhow::Result<RunSummary> {
        let time_range = period
            .time_range(self.settings.timezone)
            .context("Failed to compute the report time range")?;
        let label = period.label();
        tracing::info!(
            "Reporting {} ({} → {}) for {} sites",
            label,
            time_range.from,
            time_range.to,
            sites.len()
        );

        let mut summary = RunSummary::default();
        for site in sites {
            let start = Instant::now();
            let outcome = match self.process_site(site, period, &label, &time_range).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Report for site {} failed: {:#}", site.id, e);
                    SiteOutcome::Failed(format!("{:#}", e))
                }
            };
            tracing::info!(
                "Site {} finished in {:.1}s: {:?}",
                site.id,
                start.elapsed().as_secs_f64(),
                outcome
            );
            summary.reports.push(SiteReport {
                site: site.id.clone(),
                outcome,
            });
        }

        tracing::info!(
            "{} of {} reports delivered",
            summary.delivered(),
            summary.reports.len()
        );
        Ok(summary)
    }

    async fn process_site(
        &self,
        site: &Site,
        period: &ReportPeriod,
        label: &str,
        time_range: &TimeRange,
    ) -> anyhow::Result<SiteOutcome> {
        let title = site.dashboard_title(&period.title_suffix());
        let substitutions = site_variables(site, period, label);

        let created = self
            .dashboards
            .clone_dashboard(&title, &site.id, &substitutions, time_range)
            .await?;
        let dashboard_url = created.kiosk_url(&self.settings.backend_url);

        let directory = ensure_site_dir(&self.settings.output_dir, site).await?;
        let artifacts = self.render(&dashboard_url, &directory, &title).await?;

        let Some(image_url) = self.image_host.upload(&artifacts.png).await else {
            tracing::warn!("Failed to upload image for site {}, email not sent", site.id);
            return Ok(SiteOutcome::NotDelivered(format!(
                "upload of {} failed",
                artifacts.png.display()
            )));
        };
        tracing::info!("PNG hosted: {}", image_url);

        let email = ReportEmail::new(
            site.email.clone(),
            fill_placeholders(
                &self.settings.subject_template,
                &[("site", site.id.as_str()), ("period", label)],
            ),
            &image_url,
            artifacts.pdf,
        );
        self.mailer
            .send(&email)
            .await
            .with_context(|| format!("Failed to email {}", site.email))?;
        tracing::info!("Email sent to {}", site.email);

        Ok(SiteOutcome::Delivered)
    }

    async fn render(&self, url: &str, directory: &Path, title: &str) -> anyhow::Result<Artifacts> {
        let artifacts = Artifacts {
            pdf: directory.join(format!("{}.pdf", title)),
            png: directory.join(format!("{}.png", title)),
        };

        self.renderer
            .render_pdf(url, &artifacts.pdf)
            .await
            .with_context(|| format!("Failed to render {}", url))?;
        tracing::info!("PDF saved: {}", artifacts.pdf.display());

        self.rasterizer
            .first_page_to_png(&artifacts.pdf, &artifacts.png)
            .await
            .with_context(|| format!("Failed to convert {}", artifacts.pdf.display()))?;
        tracing::info!("PNG saved: {}", artifacts.png.display());

        Ok(artifacts)
    }
}

/// Template variables substituted into each site's dashboard
pub fn site_variables(site: &Site, period: &ReportPeriod, label: &str) -> HashMap<String, String> {
    HashMap::from([
        ("SITE".to_string(), site.id.clone()),
        ("Periode".to_string(), label.to_string()),
        ("DATE_FROM".to_string(), period.date_from()),
        ("DATE_TO".to_string(), period.date_to()),
    ])
}

/// Create the site's artifact directory if needed and return it
pub async fn ensure_site_dir(root: &Path, site: &Site) -> anyhow::Result<PathBuf> {
    let directory = site.output_dir(root);
    tokio::fs::create_dir_all(&directory)
        .await
        .with_context(|| format!("Failed to create {}", directory.display()))?;
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dashboard_service::TemplateSource;
    use crate::application::dashboard_service::tests::FakeRepository;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeRenderer {
        failing_sites: HashSet<String>,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render_pdf(&self, url: &str, output: &Path) -> anyhow::Result<()> {
            assert!(url.ends_with("?kiosk"));
            let site = output.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str());
            if site.is_some_and(|s| self.failing_sites.contains(s)) {
                anyhow::bail!("navigation timed out");
            }
            tokio::fs::write(output, b"%PDF-1.4").await?;
            Ok(())
        }
    }

    struct FakeRasterizer;

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn first_page_to_png(&self, _pdf: &Path, output: &Path) -> anyhow::Result<()> {
            tokio::fs::write(output, b"\x89PNG").await?;
            Ok(())
        }
    }

    struct FakeHost {
        failing_sites: HashSet<String>,
    }

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn upload(&self, path: &Path) -> Option<String> {
            let site = path.parent()?.file_name()?.to_str()?;
            if self.failing_sites.contains(site) {
                return None;
            }
            Some(format!("https://files.example.com/f.php?h={}&p=1", site))
        }
    }

    #[derive(Default)]
    struct FakeMailer {
        sent: Mutex<Vec<ReportEmail>>,
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, email: &ReportEmail) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct Harness {
        service: ReportService,
        mailer: Arc<FakeMailer>,
        _output: tempfile::TempDir,
        _template: tempfile::NamedTempFile,
        output_dir: PathBuf,
    }

    fn harness(failing_render: &[&str], failing_upload: &[&str]) -> Harness {
        let output = tempfile::tempdir().unwrap();
        let template = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            template.path(),
            r#"{ "templating": { "list": [ { "name": "SITE", "current": {}, "query": "" } ] } }"#,
        )
        .unwrap();

        let repository = Arc::new(FakeRepository::default());
        let dashboards = DashboardService::new(repository, TemplateSource::File(template.path().into()));
        let mailer = Arc::new(FakeMailer::default());
        let settings = ReportSettings {
            backend_url: "https://grafana.example.com".to_string(),
            timezone: chrono_tz::Europe::Paris,
            output_dir: output.path().to_path_buf(),
            subject_template: "Rapport {site} - {period}".to_string(),
        };

        let service = ReportService::new(
            dashboards,
            Arc::new(FakeRenderer {
                failing_sites: failing_render.iter().map(|s| s.to_string()).collect(),
            }),
            Arc::new(FakeRasterizer),
            Arc::new(FakeHost {
                failing_sites: failing_upload.iter().map(|s| s.to_string()).collect(),
            }),
            mailer.clone(),
            settings,
        );

        Harness {
            service,
            mailer,
            output_dir: output.path().to_path_buf(),
            _output: output,
            _template: template,
        }
    }

    fn sites() -> Vec<Site> {
        vec![
            Site::new("Lyon", "lyon@example.com"),
            Site::new("Nantes", "nantes@example.com"),
        ]
    }

    #[tokio::test]
    async fn test_every_site_is_delivered() {
        let h = harness(&[], &[]);
        let period = ReportPeriod::parse("03-2024").unwrap();

        let summary = h.service.run(&sites(), &period).await.unwrap();
        assert!(summary.all_delivered());
        assert_eq!(summary.delivered(), 2);

        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "lyon@example.com");
        assert_eq!(sent[0].subject, "Rapport Lyon - 1er mars 2024 → 31 mars 2024");
        assert!(sent[0].html.contains("f.php?h=Lyon"));
        assert_eq!(
            sent[0].attachment,
            h.output_dir.join("Lyon").join("Lyon - 2024-03.pdf")
        );
        assert!(h.output_dir.join("Nantes").join("Nantes - 2024-03.png").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_skips_email_only_for_that_site() {
        let h = harness(&[], &["Lyon"]);
        let period = ReportPeriod::parse("03-2024").unwrap();

        let summary = h.service.run(&sites(), &period).await.unwrap();
        assert!(matches!(summary.reports[0].outcome, SiteOutcome::NotDelivered(_)));
        assert_eq!(summary.reports[1].outcome, SiteOutcome::Delivered);
        assert!(!summary.all_delivered());

        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "nantes@example.com");
    }

    #[tokio::test]
    async fn test_failing_site_does_not_stop_the_run() {
        let h = harness(&["Lyon"], &[]);
        let period = ReportPeriod::parse("03-2024").unwrap();

        let summary = h.service.run(&sites(), &period).await.unwrap();
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].site, "Lyon");
        assert!(matches!(summary.reports[0].outcome, SiteOutcome::Failed(_)));
        assert_eq!(summary.reports[1].outcome, SiteOutcome::Delivered);

        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "nantes@example.com");
    }

    #[tokio::test]
    async fn test_site_dir_is_reused() {
        let root = tempfile::tempdir().unwrap();
        let site = Site::new("Lyon", "lyon@example.com");

        let first = ensure_site_dir(root.path(), &site).await.unwrap();
        std::fs::write(first.join("previous.pdf"), b"old").unwrap();
        let second = ensure_site_dir(root.path(), &site).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.file_name().unwrap(), "Lyon");
        assert!(second.join("previous.pdf").exists());
    }

    #[test]
    fn test_site_variables() {
        let period = ReportPeriod::parse("03-2024").unwrap();
        let site = Site::new("Lyon", "lyon@example.com");
        let vars = site_variables(&site, &period, "1er mars 2024 → 31 mars 2024");

        assert_eq!(vars["SITE"], "Lyon");
        assert_eq!(vars["Periode"], "1er mars 2024 → 31 mars 2024");
        assert_eq!(vars["DATE_FROM"], "2024-02-01");
        assert_eq!(vars["DATE_TO"], "2024-03-31");
    }
}
