// Grafana HTTP API repository implementation
use crate::application::dashboard_repository::{DashboardHit, DashboardRepository};
use crate::domain::dashboard::{CreatedDashboard, Folder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GrafanaRepository {
    client: Client,
    host: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct FolderResponse {
    id: i64,
    uid: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    uid: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct CreateDashboardResponse {
    uid: String,
    url: String,
}

impl From<FolderResponse> for Folder {
    fn from(folder: FolderResponse) -> Self {
        Folder {
            id: folder.id,
            uid: folder.uid,
            title: folder.title,
        }
    }
}

impl GrafanaRepository {
    pub fn new(host: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.host, path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    fn search_path(query: &str, folder_id: i64) -> String {
        format!(
            "/api/search?query={}&folderIds={}&type=dash-db",
            urlencoding::encode(query),
            folder_id
        )
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to Grafana ({})", action))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Grafana {} failed with status {}: {}", action, status, body);
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<T> {
        self.send(request, action)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse Grafana response ({})", action))
    }
}

#[async_trait]
impl DashboardRepository for GrafanaRepository {
    async fn list_folders(&self) -> Result<Vec<Folder>> {
        let folders: Vec<FolderResponse> = self
            .send_json(self.request(Method::GET, "/api/folders"), "folder list")
            .await?;
        Ok(folders.into_iter().map(Folder::from).collect())
    }

    async fn create_folder(&self, title: &str, uid: &str) -> Result<Folder> {
        let request = self
            .request(Method::POST, "/api/folders")
            .json(&json!({ "title": title, "uid": uid }));
        let folder: FolderResponse = self.send_json(request, "folder creation").await?;
        Ok(folder.into())
    }

    async fn search_dashboards(&self, query: &str, folder_id: i64) -> Result<Vec<DashboardHit>> {
        let path = Self::search_path(query, folder_id);
        tracing::debug!("Searching dashboards: {}", path);

        let hits: Vec<SearchHit> = self
            .send_json(self.request(Method::GET, &path), "dashboard search")
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| DashboardHit {
                uid: hit.uid,
                title: hit.title,
            })
            .collect())
    }

    async fn get_dashboard(&self, uid: &str) -> Result<Value> {
        let path = format!("/api/dashboards/uid/{}", urlencoding::encode(uid));
        self.send_json(self.request(Method::GET, &path), "dashboard fetch")
            .await
    }

    async fn delete_dashboard(&self, uid: &str) -> Result<()> {
        let path = format!("/api/dashboards/uid/{}", urlencoding::encode(uid));
        self.send(self.request(Method::DELETE, &path), "dashboard deletion")
            .await?;
        tracing::debug!("Dashboard {} deleted", uid);
        Ok(())
    }

    async fn create_dashboard(&self, dashboard: Value, folder: &Folder) -> Result<CreatedDashboard> {
        let request = self
            .request(Method::POST, "/api/dashboards/db")
            .json(&create_payload(dashboard, folder));
        let created: CreateDashboardResponse = self.send_json(request, "dashboard creation").await?;

        Ok(CreatedDashboard {
            uid: created.uid,
            url: created.url,
        })
    }
}

/// Body of `POST /api/dashboards/db`; never overwrites, stale copies are
/// deleted beforehand.
fn create_payload(dashboard: Value, folder: &Folder) -> Value {
    json!({
        "dashboard": dashboard,
        "overwrite": false,
        "message": "Dashboard created",
        "folderId": folder.id,
        "folderUid": folder.uid,
    })
}
