//! Request payload files
//!
//! Payloads are JSON files with `{{.Name}}` placeholders that are filled in
//! before parsing, so every run creates uniquely named resources.
//!
//! Supported variables:
//! - `Timestamp`: Unix seconds
//! - `TimestampMs`: Unix milliseconds
//! - `Random`: 8 lowercase hex characters
//! - `UUID`: a random v4 UUID

use std::path::{Path, PathBuf};

use chrono::Utc;
use minijinja::{context, Environment, UndefinedBehavior};
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("failed to read payload file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render payload template: {0}")]
    Render(#[from] minijinja::Error),

    #[error("failed to parse payload {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Values substituted into payload templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    pub timestamp: i64,
    pub timestamp_ms: i64,
    pub random: String,
    pub uuid: String,
}

impl TemplateVars {
    /// Fresh values for one payload render
    pub fn generate() -> Self {
        let now = Utc::now();
        let random = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            timestamp: now.timestamp(),
            timestamp_ms: now.timestamp_millis(),
            random,
            uuid: Uuid::new_v4().to_string(),
        }
    }
}

/// Render `content` with every `{{ .Name }}` filled in from `vars`
///
/// Unknown names are an error.
pub fn render_template(content: &str, vars: &TemplateVars) -> Result<String, PayloadError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let rendered = env.render_str(
        &strip_field_dots(content),
        context! {
            Timestamp => vars.timestamp,
            TimestampMs => vars.timestamp_ms,
            Random => &vars.random,
            UUID => &vars.uuid,
        },
    )?;
    Ok(rendered)
}

/// Rewrite `{{ .Name }}` to `{{ Name }}`
///
/// Payloads use field-access placeholders; the template engine resolves
/// plain top-level names.
fn strip_field_dots(template: &str) -> String {
    let mut parts = template.split("{{");
    let mut out = String::with_capacity(template.len());
    if let Some(head) = parts.next() {
        out.push_str(head);
    }
    for part in parts {
        out.push_str("{{ ");
        let expr = part.trim_start();
        out.push_str(expr.strip_prefix('.').unwrap_or(expr));
    }
    out
}

/// Read, render and parse a payload file
pub fn load_payload<T: DeserializeOwned>(path: &Path) -> Result<T, PayloadError> {
    let content = std::fs::read_to_string(path).map_err(|e| PayloadError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rendered = render_template(&content, &TemplateVars::generate())?;
    serde_json::from_str(&rendered).map_err(|e| PayloadError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClusterCreateRequest;
    use std::io::Write;

    fn vars() -> TemplateVars {
        TemplateVars {
            timestamp: 1700000000,
            timestamp_ms: 1700000000123,
            random: "a1b2c3d4".to_string(),
            uuid: "00000000-0000-4000-8000-000000000000".to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_all_variables() {
        let out = render_template(
            "{{.Timestamp}}-{{ .TimestampMs }}-{{.Random}}-{{.UUID}}",
            &vars(),
        )
        .unwrap();
        assert_eq!(
            out,
            "1700000000-1700000000123-a1b2c3d4-00000000-0000-4000-8000-000000000000"
        );
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let input = r#"{"name": "plain"}"#;
        assert_eq!(render_template(input, &vars()).unwrap(), input);
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let err = render_template("{{.Nope}}", &vars()).unwrap_err();
        match err {
            PayloadError::Render(e) => assert_eq!(e.kind(), minijinja::ErrorKind::UndefinedError),
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_expression_is_an_error() {
        let err = render_template("abc {{.Random", &vars()).unwrap_err();
        assert!(matches!(err, PayloadError::Render(_)), "got {err:?}");
    }

    #[test]
    fn test_field_dots_are_stripped() {
        assert_eq!(
            strip_field_dots(r#"{"name": "np-{{ .Random}}-{{.UUID }}"}"#),
            r#"{"name": "np-{{ Random}}-{{ UUID }}"}"#
        );
    }

    #[test]
    fn test_rendered_json_keeps_nested_braces() {
        let out = render_template(r#"{"spec": {"id": "{{.Random}}"}}"#, &vars()).unwrap();
        assert_eq!(out, r#"{"spec": {"id": "a1b2c3d4"}}"#);
    }

    #[test]
    fn test_generated_vars_shape() {
        let v = TemplateVars::generate();
        assert_eq!(v.random.len(), 8);
        assert!(v.random.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(Uuid::parse_str(&v.uuid).is_ok());
        assert!(v.timestamp_ms / 1000 >= v.timestamp - 1);
    }

    #[test]
    fn test_load_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"kind": "Cluster", "name": "e2e-{{{{.Random}}}}", "spec": {{}}}}"#
        )
        .unwrap();

        let request: ClusterCreateRequest = load_payload(file.path()).unwrap();
        assert!(request.name.starts_with("e2e-"));
        assert_eq!(request.name.len(), "e2e-".len() + 8);
    }

    #[test]
    fn test_load_payload_missing_file() {
        let err = load_payload::<ClusterCreateRequest>(Path::new("/nonexistent/payload.json"))
            .unwrap_err();
        assert!(matches!(err, PayloadError::Read { .. }));
    }
}
