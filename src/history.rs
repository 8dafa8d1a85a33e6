use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    storage::Storage,
    time::{elapsed_secs, format_time, format_time_short},
};

pub const STORAGE_KEY: &str = "flowtime_data";
pub const BACKUP_KEY: &str = "flowtime_data.corrupt";
const EMPTY_BREAK: &str = "-";

// ============================================================================
// Records
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub task: String,
    #[serde(with = "iso_millis")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub end_time: DateTime<Utc>,
    pub duration: String,
    pub break_time: Option<String>,
}

impl SessionRecord {
    pub fn new(task: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            task: task.trim().into(),
            start_time,
            end_time,
            duration: format_time(elapsed_secs(&start_time, &end_time)),
            break_time: None,
        }
    }
}

/// Timestamps are stored as `2026-10-19T09:00:00.000Z`.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

/// One line of the history table.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRow {
    pub task: String,
    pub range: String,
    pub duration: String,
    pub break_time: String,
}

// ============================================================================
// Store
// ============================================================================

pub struct History {
    records: Vec<SessionRecord>,
    storage: Box<dyn Storage>,
}

impl History {
    /// Restores the history from `storage`. Data that no longer decodes is
    /// moved to the first free backup key (see [`backup_key`]) and the
    /// history starts empty.
    pub fn load(mut storage: Box<dyn Storage>) -> Result<Self> {
        let records = match storage.get(STORAGE_KEY)? {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Option<Vec<SessionRecord>>>(&raw) {
                Ok(records) => records.unwrap_or_default(),
                Err(e) => {
                    let backup = backup_key(storage.as_ref())?;
                    warn!("stored history is malformed ({e}), keeping a copy under {backup}");
                    storage.set(&backup, &raw)?;
                    storage.set(STORAGE_KEY, "[]")?;
                    Vec::new()
                }
            },
        };
        debug!(records = records.len(), "history loaded");
        Ok(Self { records, storage })
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&SessionRecord> {
        self.records.last()
    }

    /// Adds a completed session. The record stays in memory even when the
    /// write fails; the error is handed back to the caller.
    pub fn append(&mut self, record: SessionRecord) -> Result<()> {
        info!(task = %record.task, duration = %record.duration, "session recorded");
        self.records.push(record);
        self.save()
    }

    /// Fills in the break that followed the most recent session, if it has
    /// not been filled in yet. Returns the gap in seconds when it did.
    pub fn backfill_break(&mut self, now: DateTime<Utc>) -> Result<Option<u64>> {
        let Some(last) = self.records.last_mut() else {
            return Ok(None);
        };
        if last.break_time.is_some() {
            return Ok(None);
        }
        let gap = elapsed_secs(&last.end_time, &now);
        last.break_time = Some(format_time(gap));
        debug!(gap, "break backfilled");
        self.save()?;
        Ok(Some(gap))
    }

    /// Empties the history. Storage is written first so a failed write
    /// leaves both copies untouched.
    pub fn clear(&mut self) -> Result<()> {
        self.storage.set(STORAGE_KEY, "[]")?;
        self.records.clear();
        info!("history cleared");
        Ok(())
    }

    /// Rows for display, newest first.
    pub fn rows(&self) -> Vec<HistoryRow> {
        self.records
            .iter()
            .rev()
            .map(|r| HistoryRow {
                task: r.task.clone(),
                range: format!("{} - {}", format_time_short(&r.start_time), format_time_short(&r.end_time)),
                duration: r.duration.clone(),
                break_time: r.break_time.clone().unwrap_or_else(|| EMPTY_BREAK.into()),
            })
            .collect()
    }

    pub fn to_csv(&self) -> String {
        let mut csv = String::from("Task,Start,End,Duration,Break\n");
        for r in self.records.iter().rev() {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                csv_field(&r.task),
                r.start_time.to_rfc3339(),
                r.end_time.to_rfc3339(),
                r.duration,
                r.break_time.as_deref().unwrap_or(""),
            ));
        }
        csv
    }

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_csv())?;
        info!(path = %path.display(), "history exported");
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.records)?;
        self.storage.set(STORAGE_KEY, &json)
    }
}

/// [`BACKUP_KEY`], or `<BACKUP_KEY>-<n>` with the lowest `n` not taken yet,
/// so earlier backups are never overwritten.
pub fn backup_key(storage: &dyn Storage) -> Result<String> {
    if storage.get(BACKUP_KEY)?.is_none() {
        return Ok(BACKUP_KEY.into());
    }
    let mut n = 1;
    loop {
        let key = format!("{BACKUP_KEY}-{n}");
        if storage.get(&key)?.is_none() {
            return Ok(key);
        }
        n += 1;
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.into()
    }
}
