//! Storage primitives: atomic file replace, JSONL append, and best-effort
//! JSON reads that quarantine corrupt files instead of failing callers.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Writes `value` as pretty JSON to `path` atomically (temp file + rename).
///
/// Creates parent directories as needed. On Unix, also fsyncs the parent
/// directory after rename so the new directory entry survives a crash.
///
/// Keys are written sorted: the value is round-tripped through
/// `serde_json::Value` first, whose object representation is a `BTreeMap`,
/// before the final pretty-print.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_vec_pretty(&sorted_keys(value)?)?;
    atomic_write_bytes(path, &content)
}

/// Writes raw bytes to `path` atomically (temp file + rename).
pub fn atomic_write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_sibling(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir_file) = File::open(parent) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", now_ns()));
    path.with_file_name(name)
}

/// Appends one JSON-line record to `path`, creating parent directories and
/// the file itself as needed. The line is written in a single `write_all`
/// call, plus a trailing newline, so partial lines never occur.
///
/// Keys are written sorted (see [`sorted_keys`]), matching the wire format of
/// every other writer in this crate.
pub fn append_jsonl_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(&sorted_keys(record)?)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Re-serializes `value` through `serde_json::Value`, whose object variant is
/// a `BTreeMap`, so that writing it back out emits keys in sorted order.
pub(crate) fn sorted_keys<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Reads every line of a JSONL file, skipping blank lines. Returns an
/// empty vec if the file doesn't exist.
pub fn read_jsonl_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// `(size, mtime_ns)` of a file, or `(0, 0)` if it doesn't exist.
pub fn file_meta(path: &Path) -> (u64, i64) {
    match fs::metadata(path) {
        Ok(meta) => {
            let size = meta.len();
            let mtime_ns = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as i64)
                .unwrap_or(0);
            (size, mtime_ns)
        }
        Err(_) => (0, 0),
    }
}

/// Reads and parses a JSON file, returning `T::default()` if the file is
/// missing. If the file exists but fails to parse, it is quarantined to
/// `<path>.corrupt.<ts>[.<n>]`, a warning is pushed to `warnings`, and the
/// default is returned. Never returns an error.
pub fn read_best_effort_json<T>(path: &Path, warnings: &mut Vec<String>) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return T::default();
    }
    match fs::read_to_string(path).ok().and_then(|s| serde_json::from_str(&s).ok()) {
        Some(value) => value,
        None => {
            if let Err(e) = quarantine(path) {
                warn!(path = %path.display(), error = %e, "failed to quarantine corrupt state file");
                warnings.push(format!(
                    "failed to quarantine corrupt state file {}: {e}",
                    path.display()
                ));
            } else {
                warn!(path = %path.display(), "quarantined corrupt state file");
                warnings.push(format!(
                    "quarantined corrupt state file: {}",
                    path.display()
                ));
            }
            T::default()
        }
    }
}

/// Renames a corrupt file to `<path>.corrupt.<ts>`, appending `.1`, `.2`,
/// etc. if that name is already taken.
fn quarantine(path: &Path) -> std::io::Result<()> {
    let ts = now_ns() / 1_000_000_000;
    let mut candidate = PathBuf::from(format!("{}.corrupt.{}", path.display(), ts));
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}.corrupt.{}.{}", path.display(), ts, n));
        n += 1;
    }
    fs::rename(path, candidate)
}

fn now_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos()
}

/// Resolves the `MI_STATE_WARNINGS_STDERR` tri-state: whether quarantine/
/// corruption warnings should be printed to stderr by the caller.
///
/// `env_value` is the raw environment variable (if set); `caller_supplied_sink`
/// is whether the caller already routes warnings somewhere else. Kept as a
/// pure function over its inputs so it's testable without touching process
/// environment.
pub fn should_print_warnings(env_value: Option<&str>, caller_supplied_sink: bool) -> bool {
    match env_value.map(str::trim) {
        None | Some("") => !caller_supplied_sink,
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => true,
        },
    }
}
