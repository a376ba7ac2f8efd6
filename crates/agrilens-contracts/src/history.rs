use serde_json::Value;

use crate::diagnosis::DiagnosisResult;
use crate::store::StateStore;

pub const HISTORY_KEY: &str = "history";
pub const HISTORY_LIMIT: usize = 50;

/// Bounded diagnosis history, newest first, stored under one state key.
///
/// Writes are read-modify-write with no concurrency guard; the store is
/// scoped to a single client.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    store: StateStore,
}

impl HistoryLog {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn entries(&mut self) -> Vec<DiagnosisResult> {
        self.raw_entries()
            .iter()
            .map(DiagnosisResult::from_value)
            .collect()
    }

    pub fn len(&mut self) -> usize {
        self.raw_entries().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.raw_entries().is_empty()
    }

    /// Prepend a record and drop the oldest entries past the retention cap.
    pub fn record(&mut self, result: &DiagnosisResult) -> anyhow::Result<()> {
        let mut rows = self.raw_entries();
        rows.insert(0, result.to_value());
        rows.truncate(HISTORY_LIMIT);
        self.store.set(HISTORY_KEY, Value::Array(rows))
    }

    /// Case-insensitive substring match on disease name or species. An empty
    /// query matches everything.
    pub fn search(&mut self, query: &str) -> Vec<DiagnosisResult> {
        let needle = query.trim().to_lowercase();
        self.entries()
            .into_iter()
            .filter(|entry| {
                entry.report.disease_name.to_lowercase().contains(&needle)
                    || entry.report.species.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn find(&mut self, id: &str) -> Option<DiagnosisResult> {
        self.entries().into_iter().find(|entry| entry.id == id)
    }

    /// All-or-nothing deletion; there is no per-record delete.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.store.remove(HISTORY_KEY)
    }

    fn raw_entries(&mut self) -> Vec<Value> {
        self.store
            .get(HISTORY_KEY)
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::diagnosis::DiagnosisResult;
    use crate::store::StateStore;

    use super::{HistoryLog, HISTORY_LIMIT};

    fn record_for(disease: &str, species: &str) -> DiagnosisResult {
        DiagnosisResult::assemble(
            &json!({
                "subjectType": "crop",
                "species": species,
                "diseaseName": disease,
                "confidenceLevel": "moderate",
                "confidencePercent": 60,
                "severity": "moderate",
            }),
            "images/test.png",
        )
    }

    fn log_in(dir: &std::path::Path) -> HistoryLog {
        HistoryLog::new(StateStore::new(dir.join("state.json")))
    }

    #[test]
    fn newest_record_goes_first() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut log = log_in(temp.path());
        log.record(&record_for("Leaf Blight", "Maize"))?;
        log.record(&record_for("Foot Rot", "Goat"))?;

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].report.disease_name, "Foot Rot");
        assert_eq!(entries[1].report.disease_name, "Leaf Blight");
        Ok(())
    }

    #[test]
    fn retention_cap_keeps_the_most_recent_fifty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut log = log_in(temp.path());
        for index in 0..HISTORY_LIMIT + 5 {
            log.record(&record_for(&format!("Disease {index}"), "Maize"))?;
        }

        let entries = log.entries();
        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0].report.disease_name, "Disease 54");
        assert_eq!(
            entries[HISTORY_LIMIT - 1].report.disease_name,
            "Disease 5"
        );
        Ok(())
    }

    #[test]
    fn search_matches_disease_or_species_case_insensitively() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut log = log_in(temp.path());
        log.record(&record_for("Northern Leaf Blight", "Maize"))?;
        log.record(&record_for("Foot Rot", "Goat"))?;

        assert_eq!(log.search("BLIGHT").len(), 1);
        assert_eq!(log.search("goat").len(), 1);
        assert_eq!(log.search("").len(), 2);
        assert!(log.search("tomato").is_empty());
        Ok(())
    }

    #[test]
    fn find_locates_a_record_by_id() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut log = log_in(temp.path());
        let record = record_for("Foot Rot", "Goat");
        log.record(&record)?;

        assert_eq!(log.find(&record.id).map(|found| found.id), Some(record.id));
        assert!(log.find("nope").is_none());
        Ok(())
    }

    #[test]
    fn clear_removes_every_entry() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut log = log_in(temp.path());
        log.record(&record_for("Leaf Blight", "Maize"))?;
        log.clear()?;
        assert!(log.is_empty());
        Ok(())
    }

    #[test]
    fn history_survives_reopening_the_store() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        {
            let mut log = log_in(temp.path());
            log.record(&record_for("Leaf Blight", "Maize"))?;
        }
        let mut reopened = log_in(temp.path());
        assert_eq!(reopened.len(), 1);
        Ok(())
    }
}
