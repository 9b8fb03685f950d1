// Repository trait for the monitoring backend's dashboard API
use crate::domain::dashboard::{CreatedDashboard, Folder};
use async_trait::async_trait;
use serde_json::Value;

/// Summary of a dashboard returned by a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardHit {
    pub uid: String,
    pub title: String,
}

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// List every folder visible to the API key
    async fn list_folders(&self) -> anyhow::Result<Vec<Folder>>;

    /// Create a folder with the given title and unique id
    async fn create_folder(&self, title: &str, uid: &str) -> anyhow::Result<Folder>;

    /// Search dashboards matching `query` inside a folder
    async fn search_dashboards(&self, query: &str, folder_id: i64) -> anyhow::Result<Vec<DashboardHit>>;

    /// Fetch the JSON model of a dashboard
    async fn get_dashboard(&self, uid: &str) -> anyhow::Result<Value>;

    async fn delete_dashboard(&self, uid: &str) -> anyhow::Result<()>;

    /// Create a dashboard from a finalized JSON model inside a folder
    async fn create_dashboard(&self, dashboard: Value, folder: &Folder) -> anyhow::Result<CreatedDashboard>;
}
