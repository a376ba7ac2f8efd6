use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Single-file JSON key-value state blob.
///
/// Writes merge by key against whatever is on disk at flush time, so two
/// stores pointed at the same file only clobber each other when they touch
/// the same key.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
    removed_keys: Vec<String>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
            dirty_keys: Vec::new(),
            removed_keys: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        let payload = self.ensure_loaded();
        payload.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let payload = self.ensure_loaded();
        if payload.get(key) == Some(&value) {
            return Ok(());
        }
        payload.insert(key.to_string(), value);
        self.removed_keys.retain(|existing| existing != key);
        if !self.dirty_keys.contains(&key.to_string()) {
            self.dirty_keys.push(key.to_string());
        }
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let payload = self.ensure_loaded();
        payload.remove(key);
        self.dirty_keys.retain(|existing| existing != key);
        if !self.removed_keys.contains(&key.to_string()) {
            self.removed_keys.push(key.to_string());
        }
        self.flush()
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.payload = Some(Map::new());
        self.dirty_keys.clear();
        self.removed_keys.clear();
        write_json_object(&self.path, &Map::new())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if self.dirty_keys.is_empty() && self.removed_keys.is_empty() {
            return Ok(());
        }

        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        if let Some(payload) = &self.payload {
            for key in &self.dirty_keys {
                if let Some(value) = payload.get(key) {
                    on_disk.insert(key.clone(), value.clone());
                }
            }
        }
        for key in &self.removed_keys {
            on_disk.remove(key);
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        self.removed_keys.clear();
        Ok(())
    }

    fn ensure_loaded(&mut self) -> &mut Map<String, Value> {
        self.payload = Some(read_json_object(&self.path).unwrap_or_default());
        self.payload.as_mut().expect("state payload initialized")
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
