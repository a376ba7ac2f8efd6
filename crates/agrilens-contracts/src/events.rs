use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventFields = Map<String, Value>;

/// Append-only `events.jsonl` log, one compact JSON object per line.
///
/// Every line carries `type`, `session`, and `ts`; caller fields merge last
/// and may override the defaults. Clones share the same file and lock, so a
/// scan worker thread and the serve loop can emit through the same handle.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    session: String,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, session: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                path: path.into(),
                session: session.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session(&self) -> &str {
        &self.inner.session
    }

    pub fn emit(&self, event_type: &str, fields: EventFields) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session".to_string(),
            Value::String(self.inner.session.clone()),
        );
        event.insert(
            "ts".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        for (key, value) in fields {
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{EventFields, EventLog};

    #[test]
    fn emitted_lines_carry_session_and_timestamp() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "scan-9f2c");

        let mut fields = EventFields::new();
        fields.insert("mime_type".to_string(), json!("image/png"));
        let emitted = log.emit("image_accepted", fields)?;

        let raw = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(raw.lines().next().unwrap_or(""))?;
        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], json!("image_accepted"));
        assert_eq!(parsed["session"], json!("scan-9f2c"));
        assert_eq!(parsed["mime_type"], json!("image/png"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn events_append_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "scan-9f2c");
        log.emit("scan_started", EventFields::new())?;
        log.emit("analysis_completed", EventFields::new())?;

        let raw = fs::read_to_string(&path)?;
        let types: Vec<String> = raw
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
            .collect();
        assert_eq!(types, vec!["scan_started", "analysis_completed"]);
        Ok(())
    }

    #[test]
    fn clones_share_one_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::new(&path, "serve");
        let worker = log.clone();
        log.emit("serve_started", EventFields::new())?;
        worker.emit("request_handled", EventFields::new())?;

        let raw = fs::read_to_string(&path)?;
        assert_eq!(raw.lines().count(), 2);
        Ok(())
    }
}
