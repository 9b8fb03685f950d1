// Dashboard service - Use case for cloning the template into a per-site dashboard
use crate::application::dashboard_repository::DashboardRepository;
use crate::domain::dashboard::{CreatedDashboard, DashboardDefinition, DashboardTemplate, Folder};
use crate::domain::period::TimeRange;
use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the dashboard template is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Backend { uid: String },
}

#[derive(Clone)]
pub struct DashboardService {
    repository: Arc<dyn DashboardRepository>,
    template_source: TemplateSource,
}

impl DashboardService {
    pub fn new(repository: Arc<dyn DashboardRepository>, template_source: TemplateSource) -> Self {
        Self {
            repository,
            template_source,
        }
    }

    /// Clone the template into `folder_title` under `title`, replacing any
    /// dashboard already published there with the same title.
    pub async fn clone_dashboard(
        &self,
        title: &str,
        folder_title: &str,
        substitutions: &HashMap<String, String>,
        time_range: &TimeRange,
    ) -> anyhow::Result<CreatedDashboard> {
        // A fresh copy per site, never shared between instances
        let template = self.load_template().await?;
        let definition = template
            .instantiate(substitutions, time_range)
            .context("Failed to apply variables to the dashboard template")?;

        let folder = self.resolve_folder(folder_title).await?;
        self.publish(definition, title, &folder).await
    }

    pub async fn load_template(&self) -> anyhow::Result<DashboardTemplate> {
        match &self.template_source {
            TemplateSource::File(path) => {
                tracing::debug!("Loading dashboard template from {}", path.display());
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read template {}", path.display()))?;
                DashboardTemplate::from_json(&raw)
                    .with_context(|| format!("Invalid template {}", path.display()))
            }
            TemplateSource::Backend { uid } => {
                tracing::debug!("Loading dashboard template {} from the backend", uid);
                let mut response = self.repository.get_dashboard(uid).await?;
                let model = response
                    .get_mut("dashboard")
                    .map(serde_json::Value::take)
                    .with_context(|| format!("Backend response for {} has no dashboard model", uid))?;
                DashboardTemplate::from_value(model)
                    .with_context(|| format!("Invalid template dashboard {}", uid))
            }
        }
    }

    /// Find the folder titled `title`, creating it when missing.
    pub async fn resolve_folder(&self, title: &str) -> anyhow::Result<Folder> {
        let folders = self.repository.list_folders().await?;
        if let Some(folder) = folders.into_iter().find(|f| f.title == title) {
            tracing::debug!("Reusing folder '{}' (id {})", title, folder.id);
            return Ok(folder);
        }

        let uid = uuid::Uuid::new_v4().to_string();
        tracing::info!("Creating folder '{}'", title);
        self.repository.create_folder(title, &uid).await
    }

    /// Create the dashboard, deleting a same-titled one in the folder first.
    pub async fn publish(
        &self,
        definition: DashboardDefinition,
        title: &str,
        folder: &Folder,
    ) -> anyhow::Result<CreatedDashboard> {
        let existing = self
            .repository
            .search_dashboards(title, folder.id)
            .await?
            .into_iter()
            .find(|hit| hit.title == title);

        if let Some(hit) = existing {
            tracing::info!("Dashboard '{}' already exists ({}), deleting it", title, hit.uid);
            self.repository
                .delete_dashboard(&hit.uid)
                .await
                .with_context(|| format!("Failed to delete dashboard {}", hit.uid))?;
        }

        tracing::debug!("Creating dashboard '{}' with uid {:?}", title, definition.uid());
        let created = self
            .repository
            .create_dashboard(definition.into_create_body(title), folder)
            .await
            .with_context(|| format!("Failed to create dashboard '{}'", title))?;

        tracing::info!("Dashboard created: {} ({})", created.url, created.uid);
        Ok(created)
    }
}
