// Site domain model
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub id: String,
    pub email: String,
}

impl Site {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// Title of this site's dashboard for a period, e.g. `Lyon - 2024-03`.
    pub fn dashboard_title(&self, title_suffix: &str) -> String {
        format!("{} - {}", self.id, title_suffix)
    }

    /// Directory holding this site's artifacts, named after the site.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.id)
    }
}
