//! Transformation Logger (component F): an append-only, durable record of accepted
//! (file, layer, before, after) mutations, consulted by the Adaptive Layer for
//! cross-session learning. Single-writer append with a mutex; rotation runs only
//! when no append is in flight and never blocks a transformation.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::types::TransformationLogEntry;

const DEFAULT_MAX_LOG_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_MAX_AGE_DAYS: i64 = 30;

pub struct TransformationLogger {
    path: PathBuf,
    max_log_bytes: u64,
    max_age_days: i64,
    lock: Mutex<()>,
}

impl TransformationLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            lock: Mutex::new(()),
        }
    }

    pub fn with_rotation_policy(mut self, max_log_bytes: u64, max_age_days: i64) -> Self {
        self.max_log_bytes = max_log_bytes;
        self.max_age_days = max_age_days;
        self
    }

    /// Appends `entry` to the log, then opportunistically rotates.
    pub fn append(&self, entry: &TransformationLogEntry) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all_unlocked()?;
        entries.push(entry.clone());
        self.write_all_unlocked(&entries)?;
        self.rotate_unlocked(&mut entries)
    }

    /// Returns entries with `timestamp >= since`, or all entries if `since` is `None`.
    pub fn iterate(&self, since: Option<chrono::DateTime<chrono::Utc>>) -> Result<Vec<TransformationLogEntry>> {
        let _guard = self.lock.lock();
        let entries = self.read_all_unlocked()?;
        Ok(match since {
            Some(since) => entries.into_iter().filter(|e| e.timestamp >= since).collect(),
            None => entries,
        })
    }

    /// Forces an out-of-band rotation (size and age based truncation of the oldest
    /// entries), independent of `append`.
    pub fn rotate(&self) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all_unlocked()?;
        self.rotate_unlocked(&mut entries)
    }

    fn rotate_unlocked(&self, entries: &mut Vec<TransformationLogEntry>) -> Result<()> {
        let now = chrono::Utc::now();
        let before_len = entries.len();
        entries.retain(|e| now.signed_duration_since(e.timestamp).num_days() <= self.max_age_days);

        let mut bytes = serde_json::to_vec(&*entries)?;
        while bytes.len() as u64 > self.max_log_bytes && !entries.is_empty() {
            entries.remove(0);
            bytes = serde_json::to_vec(&*entries)?;
        }

        if entries.len() != before_len {
            self.write_all_unlocked(entries)?;
        }
        Ok(())
    }

    fn read_all_unlocked(&self) -> Result<Vec<TransformationLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path).map_err(|e| Error::io(&self.path, e))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_all_unlocked(&self, entries: &[TransformationLogEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))
    }
}
