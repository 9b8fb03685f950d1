// Dashboard domain model - templates and the per-site instances cloned from them
use super::period::TimeRange;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("dashboard template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dashboard template must be a JSON object")]
    NotAnObject,
    #[error("templating.list must be an array")]
    VariablesNotAList,
}

/// Folder grouping a site's dashboards in the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: i64,
    pub uid: String,
    pub title: String,
}

/// Dashboard as acknowledged by the backend after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDashboard {
    pub uid: String,
    pub url: String,
}

impl CreatedDashboard {
    /// Absolute URL of the dashboard with the UI chrome hidden.
    pub fn kiosk_url(&self, backend_url: &str) -> String {
        format!("{}{}?kiosk", backend_url.trim_end_matches('/'), self.url)
    }
}

/// A dashboard definition used as the source of every site's instance.
#[derive(Debug, Clone)]
pub struct DashboardTemplate {
    body: Map<String, Value>,
}

impl DashboardTemplate {
    pub fn from_json(raw: &str) -> Result<Self, TemplateError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    pub fn from_value(value: Value) -> Result<Self, TemplateError> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            _ => Err(TemplateError::NotAnObject),
        }
    }

    /// Build a fresh instance: substitute the named variables, replace the
    /// time range and assign a new unique id. The template itself is untouched.
    pub fn instantiate(
        &self,
        substitutions: &HashMap<String, String>,
        time_range: &TimeRange,
    ) -> Result<DashboardDefinition, TemplateError> {
        let mut body = self.body.clone();

        if let Some(list) = body
            .get_mut("templating")
            .and_then(|t| t.get_mut("list"))
        {
            let variables = list.as_array_mut().ok_or(TemplateError::VariablesNotAList)?;
            for variable in variables.iter_mut().filter_map(Value::as_object_mut) {
                let Some(value) = variable
                    .get("name")
                    .and_then(Value::as_str)
                    .and_then(|name| substitutions.get(name))
                    .cloned()
                else {
                    continue;
                };

                let current = variable
                    .entry("current")
                    .or_insert_with(|| Value::Object(Map::new()));
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                if let Some(current) = current.as_object_mut() {
                    current.insert("text".to_string(), Value::String(value.clone()));
                    current.insert("value".to_string(), Value::String(value.clone()));
                }
                variable.insert("query".to_string(), Value::String(value));
            }
        }

        body.insert(
            "time".to_string(),
            json!({ "from": time_range.from, "to": time_range.to }),
        );
        body.insert(
            "uid".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );

        Ok(DashboardDefinition { body })
    }
}

/// A materialized, site-specific dashboard ready to be created in the backend.
#[derive(Debug, Clone)]
pub struct DashboardDefinition {
    body: Map<String, Value>,
}

impl DashboardDefinition {
    pub fn uid(&self) -> Option<&str> {
        self.body.get("uid").and_then(Value::as_str)
    }

    #[cfg(test)]
    pub fn as_json(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Current value of a templated variable, if present.
    #[cfg(test)]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.body
            .get("templating")?
            .get("list")?
            .as_array()?
            .iter()
            .find(|v| v.get("name").and_then(Value::as_str) == Some(name))?
            .get("current")?
            .get("value")?
            .as_str()
    }

    /// Finalize the definition for creation: the backend assigns a new
    /// internal id and the version restarts at 1.
    pub fn into_create_body(mut self, title: &str) -> Value {
        self.body
            .insert("title".to_string(), Value::String(title.to_string()));
        self.body.insert("id".to_string(), Value::Null);
        self.body.insert("version".to_string(), json!(1));
        Value::Object(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> DashboardTemplate {
        DashboardTemplate::from_json(
            r#"{
                "id": 42,
                "uid": "template-uid",
                "title": "Monthly template",
                "version": 17,
                "time": { "from": "now-6h", "to": "now" },
                "templating": { "list": [
                    { "name": "SITE", "current": { "text": "x", "value": "x" }, "query": "x" },
                    { "name": "Periode", "query": "" },
                    { "name": "datasource", "current": { "text": "influx", "value": "influx" }, "query": "influxdb" }
                ]}
            }"#,
        )
        .unwrap()
    }

    fn range() -> TimeRange {
        TimeRange {
            from: "2024-03-01T00:00:00+01:00".to_string(),
            to: "2024-03-31T23:59:59+02:00".to_string(),
        }
    }

    fn substitutions() -> HashMap<String, String> {
        HashMap::from([
            ("SITE".to_string(), "Lyon".to_string()),
            ("Periode".to_string(), "1er mars 2024 → 31 mars 2024".to_string()),
            ("UNUSED".to_string(), "ignored".to_string()),
        ])
    }

    #[test]
    fn test_instantiate_substitutes_named_variables_only() {
        let definition = template().instantiate(&substitutions(), &range()).unwrap();
        let json = Value::Object(definition.as_json().clone());
        let list = json["templating"]["list"].as_array().unwrap();

        assert_eq!(list[0]["current"]["text"], "Lyon");
        assert_eq!(list[0]["current"]["value"], "Lyon");
        assert_eq!(list[0]["query"], "Lyon");

        // variable without a `current` object gets one
        assert_eq!(list[1]["current"]["value"], "1er mars 2024 → 31 mars 2024");

        assert_eq!(list[2]["current"]["value"], "influx");
        assert_eq!(list[2]["query"], "influxdb");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_instantiate_replaces_time_and_uid() {
        let definition = template().instantiate(&substitutions(), &range()).unwrap();
        let json = definition.as_json();

        assert_eq!(json["time"]["from"], "2024-03-01T00:00:00+01:00");
        assert_eq!(json["time"]["to"], "2024-03-31T23:59:59+02:00");

        let uid = definition.uid().unwrap();
        assert_ne!(uid, "template-uid");
        assert!(uuid::Uuid::parse_str(uid).is_ok());
    }

    #[test]
    fn test_instantiate_is_idempotent_on_visible_values() {
        let template = template();
        let first = template.instantiate(&substitutions(), &range()).unwrap();
        let second = template.instantiate(&substitutions(), &range()).unwrap();

        assert_eq!(first.variable("SITE"), second.variable("SITE"));
        assert_eq!(first.variable("Periode"), second.variable("Periode"));
        assert_eq!(first.as_json()["time"], second.as_json()["time"]);
        assert_ne!(first.uid(), second.uid());

        // the template keeps its original values
        assert_eq!(template.body["uid"], "template-uid");
        assert_eq!(template.body["templating"]["list"][0]["query"], "x");
    }

    #[test]
    fn test_template_without_variables() {
        let template = DashboardTemplate::from_json(r#"{ "title": "bare" }"#).unwrap();
        let definition = template.instantiate(&substitutions(), &range()).unwrap();
        assert!(definition.uid().is_some());
        assert_eq!(definition.variable("SITE"), None);
    }

    #[test]
    fn test_invalid_templates() {
        assert!(matches!(
            DashboardTemplate::from_json("[1, 2]"),
            Err(TemplateError::NotAnObject)
        ));
        assert!(matches!(
            DashboardTemplate::from_json("{ nope"),
            Err(TemplateError::Json(_))
        ));

        let broken = DashboardTemplate::from_json(r#"{ "templating": { "list": {} } }"#).unwrap();
        assert!(matches!(
            broken.instantiate(&substitutions(), &range()),
            Err(TemplateError::VariablesNotAList)
        ));
    }

    #[test]
    fn test_create_body_resets_identity() {
        let definition = template().instantiate(&substitutions(), &range()).unwrap();
        let body = definition.into_create_body("Lyon - 2024-03");

        assert_eq!(body["title"], "Lyon - 2024-03");
        assert!(body["id"].is_null());
        assert_eq!(body["version"], 1);
    }

    #[test]
    fn test_kiosk_url() {
        let created = CreatedDashboard {
            uid: "abc".to_string(),
            url: "/d/abc/lyon-2024-03".to_string(),
        };
        assert_eq!(
            created.kiosk_url("https://grafana.example.com/"),
            "https://grafana.example.com/d/abc/lyon-2024-03?kiosk"
        );
    }
}
