use crate::application::dashboard_service::TemplateSource;
use crate::domain::site::Site;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix of environment variables overriding `config.ini`,
/// e.g. `REPORTER__SMTP__PASSWORD`.
pub const ENV_PREFIX: &str = "REPORTER";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub grafana: GrafanaSettings,
    #[serde(default)]
    pub paths: PathSettings,
    pub settings: GeneralSettings,
    pub jirafeau: JirafeauSettings,
    pub smtp: SmtpSettings,
    pub email: EmailSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrafanaSettings {
    pub url: String,
    pub api_key: String,
    pub user: String,
    pub password: String,
    /// Read the template from this backend dashboard instead of a file
    pub template_uid: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathSettings {
    pub template_json: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralSettings {
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JirafeauSettings {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailSettings {
    pub subject_template: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderSettings {
    pub ready_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
    /// JavaScript expression evaluating to `true` once every panel has loaded
    pub ready_expression: String,
    pub chrome_executable: Option<PathBuf>,
    pub pdftoppm: PathBuf,
    pub raster_dpi: u32,
}

#[derive(Debug, Deserialize, Clone)]
struct SiteSection {
    site: String,
    email: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            template_json: None,
            output_dir: default_output_dir(),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 60,
            poll_interval_ms: 500,
            settle_ms: 1000,
            ready_expression: DEFAULT_READY_EXPRESSION.to_string(),
            chrome_executable: None,
            pdftoppm: PathBuf::from("pdftoppm"),
            raster_dpi: 200,
        }
    }
}

/// Grafana is done once the document has loaded, panels exist and no panel
/// shows a loading indicator.
pub const DEFAULT_READY_EXPRESSION: &str = r#"document.readyState === 'complete'
    && document.querySelectorAll('.react-grid-item').length > 0
    && document.querySelectorAll('[aria-label="Panel loading bar"], .panel-loading').length === 0"#;

impl AppConfig {
    pub fn timezone(&self) -> anyhow::Result<chrono_tz::Tz> {
        self.settings
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.settings.timezone, e))
    }

    pub fn template_source(&self) -> anyhow::Result<TemplateSource> {
        match (&self.grafana.template_uid, &self.paths.template_json) {
            (Some(uid), _) => Ok(TemplateSource::Backend { uid: uid.clone() }),
            (None, Some(path)) => Ok(TemplateSource::File(path.clone())),
            (None, None) => anyhow::bail!("Either paths.template_json or grafana.template_uid must be set"),
        }
    }
}

pub fn load_app_config(path: &Path) -> anyhow::Result<AppConfig> {
    build_app_config(path, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn build_app_config(path: &Path, environment: config::Environment) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::new(&path.to_string_lossy(), config::FileFormat::Ini))
        .add_source(environment)
        .build()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Load the sites, one per section, in the order they appear in the file
pub fn load_sites(path: &Path) -> anyhow::Result<Vec<Site>> {
    let settings = config::Config::builder()
        .add_source(config::File::new(&path.to_string_lossy(), config::FileFormat::Ini))
        .build()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let sections: config::Map<String, SiteSection> = settings
        .try_deserialize()
        .with_context(|| format!("Invalid site list in {}", path.display()))?;

    Ok(sections
        .into_values()
        .map(|section| Site::new(section.site, section.email))
        .collect())
}
