// Mail delivery trait
use crate::domain::report_email::ReportEmail;
use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &ReportEmail) -> anyhow::Result<()>;
}
