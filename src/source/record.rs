use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

pub const SESSION_ID_FIELD: &str = "session_id";
pub const TENANT_ID_FIELD: &str = "tenant_id";

#[derive(Debug, Error)]
pub enum LineError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// One delivered log entry: the parsed JSON object of a line, tagged with the
/// session it came from and the deployment tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Build a record from one line of a session log.
    ///
    /// Fields present in the line win over the injected `session_id` and
    /// `tenant_id` tags.
    pub fn from_line(line: &str, session_id: &str, tenant_id: &str) -> Result<Self, LineError> {
        let parsed: Value = serde_json::from_str(line)?;
        let parsed = match parsed {
            Value::Object(map) => map,
            other => return Err(LineError::NotAnObject(json_kind(&other))),
        };

        let mut fields = Map::with_capacity(parsed.len() + 2);
        fields.insert(
            SESSION_ID_FIELD.to_string(),
            Value::String(session_id.to_string()),
        );
        fields.insert(
            TENANT_ID_FIELD.to_string(),
            Value::String(tenant_id.to_string()),
        );
        fields.extend(parsed);

        Ok(Self { fields })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.fields.get(SESSION_ID_FIELD).and_then(Value::as_str)
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.fields.get(TENANT_ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Session identifier of a log file: its base name without the extension.
pub fn session_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_carries_tags_and_fields() {
        let record =
            Record::from_line(r#"{"level":"info","msg":"started"}"#, "abc123", "tenant-a").unwrap();

        assert_eq!(record.session_id(), Some("abc123"));
        assert_eq!(record.tenant_id(), Some("tenant-a"));
        assert_eq!(record.get("level"), Some(&json!("info")));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "session_id": "abc123",
                "tenant_id": "tenant-a",
                "level": "info",
                "msg": "started",
            })
        );
    }

    #[test]
    fn test_line_fields_override_tags() {
        let record = Record::from_line(r#"{"session_id":"inner"}"#, "outer", "t").unwrap();
        assert_eq!(record.session_id(), Some("inner"));
        assert_eq!(record.tenant_id(), Some("t"));
    }

    #[test]
    fn test_invalid_lines() {
        assert!(matches!(
            Record::from_line("{\"level\":", "s", "t"),
            Err(LineError::Json(_))
        ));
        assert!(matches!(
            Record::from_line("[1,2,3]", "s", "t"),
            Err(LineError::NotAnObject("array"))
        ));
        assert!(matches!(
            Record::from_line("42", "s", "t"),
            Err(LineError::NotAnObject("number"))
        ));
    }

    #[test]
    fn test_session_id_from_path() {
        assert_eq!(
            session_id_from_path(Path::new("/data/agents/main/sessions/abc123.jsonl")),
            "abc123"
        );
        assert_eq!(
            session_id_from_path(Path::new("/data/agents/main/sessions/run.2024.jsonl")),
            "run.2024"
        );
    }
}
