// Report email domain model
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachment: PathBuf,
}

impl ReportEmail {
    pub fn new(to: String, subject: String, image_url: &str, attachment: PathBuf) -> Self {
        Self {
            to,
            subject,
            html: html_body(image_url),
            attachment,
        }
    }
}

/// Minimal HTML body showing the hosted report image
pub fn html_body(image_url: &str) -> String {
    format!(
        "<html>\n<body>\n    <img src=\"{}\" alt=\"Image\">\n</body>\n</html>\n",
        escape_attribute(image_url)
    )
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Replace `{name}` placeholders in a single pass; substituted values are
/// never expanded again and unknown placeholders are kept as written.
pub fn fill_placeholders(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let candidate = &rest[open..];
        let value = candidate.find('}').and_then(|close| {
            let key = &candidate[1..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                result.push_str(value);
                rest = &candidate[close + 1..];
            }
            None => {
                result.push('{');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}
