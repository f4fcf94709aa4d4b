//! EvidenceLog writer: append-only JSONL of events with stable event ids.

use crate::error::{KcError, Result};
use crate::ids;
use crate::storage;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Appends events to a single per-scope EvidenceLog file.
///
/// `seq` starts at 0 and is incremented on every successful `append`.
/// `event_id`s minted by one `EvidenceLog` instance are unique, monotone by
/// `seq`, and strictly ordered by append; uniqueness across instances
/// sharing a path depends on distinct `run_id`s (see [`ids::new_run_id`]).
pub struct EvidenceLog {
    path: PathBuf,
    run_id: String,
    seq: u64,
}

impl EvidenceLog {
    /// Opens (without reading) an EvidenceLog writer for `path` under `run_id`.
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            run_id: run_id.into(),
            seq: 0,
        }
    }

    /// The run id this writer stamps onto every event.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The path this writer appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The next sequence number that will be assigned.
    pub fn next_seq(&self) -> u64 {
        self.seq + 1
    }

    /// Appends `record` (any JSON object), stamping `ts` (if absent),
    /// `run_id`, `seq`, and `event_id`, and returns the enriched record.
    pub fn append(&mut self, record: Value) -> Result<Value> {
        let mut obj = match record {
            Value::Object(obj) => obj,
            _ => Map::new(),
        };

        self.seq += 1;
        let event_id = ids::format_event_id(&self.run_id, self.seq);

        obj.entry("ts")
            .or_insert_with(|| Value::String(ids::now_rfc3339()));
        obj.insert("run_id".to_string(), Value::String(self.run_id.clone()));
        obj.insert("seq".to_string(), Value::Number(self.seq.into()));
        obj.insert("event_id".to_string(), Value::String(event_id));

        let enriched = Value::Object(obj);
        storage::append_jsonl_line(&self.path, &enriched)?;
        Ok(enriched)
    }
}

/// Reads every event in an EvidenceLog file, in append order.
///
/// Malformed lines are skipped rather than aborting the whole read, since
/// the log is meant to be tolerant to partial corruption at the tail.
pub fn read_all(path: &Path) -> Result<Vec<Value>> {
    let lines = storage::read_jsonl_lines(path)?;
    Ok(lines
        .into_iter()
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect())
}

/// Looks up a single event by `event_id`, scanning the whole file.
pub fn find_event(path: &Path, event_id: &str) -> Result<Option<Value>> {
    let events = read_all(path)?;
    Ok(events
        .into_iter()
        .find(|e| e.get("event_id").and_then(Value::as_str) == Some(event_id)))
}

/// Validates that `record` is a JSON object, for callers that want to fail
/// fast before calling [`EvidenceLog::append`].
pub fn require_object(record: &Value) -> Result<()> {
    if record.is_object() {
        Ok(())
    } else {
        Err(KcError::EmptyField { field: "record" })
    }
}

/// Best-effort check for a recent `state_corrupt` event in the last `batch_size`
/// records of `path`.
///
/// This only looks at the tail of the log, not the specific batch a caller may
/// have had in mind, so it can miss a `state_corrupt` event that was emitted
/// earlier in the same logical batch. Callers should treat a `false` result as
/// "no recent corruption observed", not as a guarantee.
pub fn state_corrupt_recent(path: &Path, batch_size: usize) -> Result<bool> {
    let events = read_all(path)?;
    let tail_start = events.len().saturating_sub(batch_size);
    Ok(events[tail_start..]
        .iter()
        .any(|e| e.get("kind").and_then(Value::as_str) == Some("state_corrupt")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn append_assigns_monotone_event_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evidence.jsonl");
        let mut log = EvidenceLog::new(&path, "run1");

        let e1 = log.append(json!({"kind": "hands_input"})).unwrap();
        let e2 = log.append(json!({"kind": "evidence"})).unwrap();

        assert_eq!(e1["event_id"], "ev_run1_000001");
        assert_eq!(e2["event_id"], "ev_run1_000002");
        assert_eq!(e1["seq"], 1);
        assert_eq!(e2["seq"], 2);
        assert_eq!(e1["run_id"], "run1");
    }

    #[test]
    fn append_preserves_explicit_ts() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evidence.jsonl");
        let mut log = EvidenceLog::new(&path, "run1");

        let e = log
            .append(json!({"kind": "note", "ts": "2020-01-01T00:00:00Z"}))
            .unwrap();
        assert_eq!(e["ts"], "2020-01-01T00:00:00Z");
    }

    #[test]
    fn different_run_ids_keep_event_ids_distinct_on_shared_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evidence.jsonl");
        let mut a = EvidenceLog::new(&path, "runA");
        let mut b = EvidenceLog::new(&path, "runB");

        let ea = a.append(json!({"kind": "x"})).unwrap();
        let eb = b.append(json!({"kind": "x"})).unwrap();
        assert_ne!(ea["event_id"], eb["event_id"]);
    }

    #[test]
    fn read_all_returns_appended_events_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evidence.jsonl");
        let mut log = EvidenceLog::new(&path, "run1");
        log.append(json!({"kind": "a"})).unwrap();
        log.append(json!({"kind": "b"})).unwrap();

        let all = read_all(&path).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["kind"], "a");
        assert_eq!(all[1]["kind"], "b");
    }

    #[test]
    fn find_event_by_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evidence.jsonl");
        let mut log = EvidenceLog::new(&path, "run1");
        let e = log.append(json!({"kind": "a"})).unwrap();
        let id = e["event_id"].as_str().unwrap();

        let found = find_event(&path, id).unwrap();
        assert!(found.is_some());
        assert_eq!(find_event(&path, "ev_nope_000001").unwrap(), None);
    }

    #[test]
    fn read_all_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.jsonl");
        assert_eq!(read_all(&path).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn state_corrupt_recent_finds_event_in_tail_batch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("evidence.jsonl");
        let mut log = EvidenceLog::new(&path, "run1");
        log.append(json!({"kind": "hands_input"})).unwrap();
        log.append(json!({"kind": "state_corrupt"})).unwrap();
        log.append(json!({"kind": "evidence"})).unwrap();

        assert!(state_corrupt_recent(&path, 2).unwrap());
        assert!(!state_corrupt_recent(&path, 1).unwrap());
    }

    #[test]
    fn state_corrupt_recent_on_empty_or_missing_log_is_false() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.jsonl");
        assert!(!state_corrupt_recent(&path, 6).unwrap());
    }
}
