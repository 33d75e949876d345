//! Bounded run history.
//!
//! Every automation cycle appends exactly one [`RunRecord`]. After the append
//! the oldest data rows are evicted until at most `capacity` remain; the
//! header row is never touched. The same history feeds the recency window of
//! the candidate selector through [`Ledger::recent_subjects`].

use crate::candidate::{normalize_name, SUBJECT_PREFIX};
use crate::retry::{retry_when, retry_with_backoff, RetryPolicy};
use crate::store::{Result, StoreError, Table, TableStore};
use crate::{loge, logi, logok, logw};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 20;
pub const UNKNOWN_SUBJECT: &str = "Unknown";
pub const FAILED_REF: &str = "Failed";

/// Column order shared by the spreadsheet and CSV backings.
pub const LEDGER_HEADER: &[&str] = &[
    "Object",
    "Video_URL",
    "Created_Date",
    "YouTube_Status",
    "Generation_Time",
];

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

const SUBJECT_COLUMNS: &[&str] = &["Object", "Subject"];
const ARTIFACT_COLUMNS: &[&str] = &["Video_URL", "ArtifactRef", "Artifact_Ref"];
const CREATED_COLUMNS: &[&str] = &["Created_Date", "CreatedAt", "Created_At"];
const STATUS_COLUMNS: &[&str] = &["YouTube_Status", "Status"];
const DURATION_COLUMNS: &[&str] = &["Generation_Time", "Duration"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Live,
    Failed,
    Pending,
    Placeholder,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Live => "Live",
            RunStatus::Failed => "Failed",
            RunStatus::Pending => "Pending",
            RunStatus::Placeholder => "Placeholder",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(RunStatus::Live),
            "failed" => Ok(RunStatus::Failed),
            "pending" => Ok(RunStatus::Pending),
            "placeholder" => Ok(RunStatus::Placeholder),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub subject: String,
    pub artifact_ref: String,
    pub created_at: NaiveDateTime,
    pub status: RunStatus,
    pub duration_minutes: f64,
}

impl RunRecord {
    pub fn new(
        subject: impl Into<String>,
        artifact_ref: impl Into<String>,
        status: RunStatus,
        duration_minutes: f64,
    ) -> Self {
        Self {
            subject: subject.into(),
            artifact_ref: artifact_ref.into(),
            created_at: Local::now().naive_local(),
            status,
            duration_minutes,
        }
    }

    pub fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = created_at;
        self
    }

    /// Subject as written to the ledger: `"Glass <name>"`, except for the
    /// unknown marker and names that already carry the prefix.
    pub fn decorated_subject(name: &str) -> String {
        let name = name.trim();
        if name == UNKNOWN_SUBJECT || normalize_name(name) != name.to_lowercase() {
            return name.to_string();
        }
        format!("{} {}", SUBJECT_PREFIX, name)
    }
}

/// Column positions of a concrete ledger table, resolved from its header.
/// Tables may carry extra columns (per-platform statuses); those are filled
/// with `Pending` on write and ignored on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSchema {
    subject: usize,
    artifact_ref: Option<usize>,
    created_at: Option<usize>,
    status: Option<usize>,
    duration: Option<usize>,
    width: usize,
}

impl LedgerSchema {
    pub fn resolve(table: &Table) -> Option<Self> {
        Some(Self {
            subject: table.column(SUBJECT_COLUMNS)?,
            artifact_ref: table.column(ARTIFACT_COLUMNS),
            created_at: table.column(CREATED_COLUMNS),
            status: table.column(STATUS_COLUMNS),
            duration: table.column(DURATION_COLUMNS),
            width: table.header.len(),
        })
    }

    pub fn to_row(&self, record: &RunRecord) -> Vec<String> {
        let mut row = vec![RunStatus::Pending.to_string(); self.width];
        row[self.subject] = record.subject.clone();
        let cells = [
            (self.artifact_ref, record.artifact_ref.clone()),
            (self.created_at, record.created_at.format(CREATED_AT_FORMAT).to_string()),
            (self.status, record.status.to_string()),
            (self.duration, format_duration(record.duration_minutes)),
        ];
        for (col, value) in cells {
            if let Some(col) = col {
                row[col] = value;
            }
        }
        row
    }

    pub fn subject<'a>(&self, row: &'a [String]) -> &'a str {
        Table::cell(row, Some(self.subject)).trim()
    }

    pub fn parse_row(&self, row: &[String]) -> std::result::Result<RunRecord, String> {
        let subject = self.subject(row);
        if subject.is_empty() {
            return Err("empty subject".to_string());
        }
        let status_raw = Table::cell(row, self.status);
        let status = status_raw.parse::<RunStatus>()?;
        let created_raw = Table::cell(row, self.created_at);
        let created_at = parse_created_at(created_raw)
            .ok_or_else(|| format!("bad timestamp '{}'", created_raw))?;
        let duration_raw = Table::cell(row, self.duration);
        let duration_minutes = parse_duration(duration_raw)
            .ok_or_else(|| format!("bad duration '{}'", duration_raw))?;
        Ok(RunRecord {
            subject: subject.to_string(),
            artifact_ref: Table::cell(row, self.artifact_ref).trim().to_string(),
            created_at,
            status,
            duration_minutes,
        })
    }
}

pub fn format_duration(minutes: f64) -> String {
    format!("{:.1} min", minutes)
}

pub fn parse_duration(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0.0);
    }
    let number = raw.strip_suffix("min").unwrap_or(raw).trim();
    number.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

pub fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Row equality that ignores trailing blank cells, which spreadsheets drop.
fn same_cells(a: &[String], b: &[String]) -> bool {
    fn trimmed(row: &[String]) -> &[String] {
        let end = row.iter().rposition(|c| !c.trim().is_empty()).map_or(0, |i| i + 1);
        &row[..end]
    }
    trimmed(a) == trimmed(b)
}

/// Append-only, capacity-bounded run history over a [`TableStore`].
pub struct Ledger {
    store: Arc<dyn TableStore>,
    capacity: usize,
    retry: RetryPolicy,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn TableStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            retry: RetryPolicy::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn read(&self) -> Result<Table> {
        let label = format!("Ledger read ({})", self.store.name());
        retry_when(
            &self.retry,
            &label,
            |err| !matches!(err, StoreError::MissingTable(_)),
            || self.store.read_table(),
        )
        .await
    }

    /// True when the newest data row already holds `row`.
    async fn ends_with_row(&self, row: &[String]) -> Result<bool> {
        let table = self.store.read_table().await?;
        Ok(table.rows.last().is_some_and(|last| same_cells(last, row)))
    }

    /// Normalized subjects of the last `max_recent` entries, oldest first.
    /// Read failures yield an empty list.
    pub async fn recent_subjects(&self, max_recent: usize) -> Vec<String> {
        if max_recent == 0 {
            return Vec::new();
        }
        let table = match self.read().await {
            Ok(table) => table,
            Err(err) => {
                logw(format!("Recent subjects unavailable ({}): {}", self.store.name(), err));
                return Vec::new();
            }
        };
        let Some(schema) = LedgerSchema::resolve(&table) else {
            logw(format!("Ledger {} has no subject column", self.store.name()));
            return Vec::new();
        };
        let skip = table.rows.len().saturating_sub(max_recent);
        table.rows[skip..]
            .iter()
            .map(|row| normalize_name(schema.subject(row)))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Appends `record` as the newest entry, then trims the oldest entries
    /// down to capacity. A missing table is created first.
    pub async fn append(&self, record: &RunRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let table = match self.read().await {
            Ok(table) => table,
            Err(StoreError::MissingTable(name)) => {
                logi(format!("Ledger table {} missing; creating it", name));
                self.store.ensure_table(LEDGER_HEADER, &[]).await?;
                self.read().await?
            }
            Err(err) => return Err(err),
        };
        let schema = LedgerSchema::resolve(&table).ok_or_else(|| {
            StoreError::Other(format!("ledger {} has no subject column", self.store.name()))
        })?;

        let row = schema.to_row(record);
        let label = format!("Ledger append ({})", self.store.name());
        let row = row.as_slice();
        let attempted = &AtomicBool::new(false);
        retry_with_backoff(&self.retry, &label, move || async move {
            // A failed append may still have landed; never write it twice.
            if attempted.swap(true, Ordering::SeqCst) && self.ends_with_row(row).await? {
                logw(format!("Ledger append ({}) had already been applied", self.store.name()));
                return Ok(());
            }
            self.store.append_row(row).await
        })
        .await?;

        self.enforce_retention().await
    }

    async fn enforce_retention(&self) -> Result<()> {
        let label = format!("Ledger trim ({})", self.store.name());
        // The excess is recomputed on every attempt so a delete that landed
        // before its error is not repeated.
        let trimmed = retry_with_backoff(&self.retry, &label, move || async move {
            let len = self.store.read_table().await?.rows.len();
            let excess = len.saturating_sub(self.capacity);
            if excess > 0 {
                self.store.delete_rows(0, excess).await?;
            }
            Ok::<usize, StoreError>(excess)
        })
        .await?;
        if trimmed > 0 {
            logi(format!("Trimmed {} oldest ledger entries (capacity {})", trimmed, self.capacity));
        }
        Ok(())
    }

    /// Like [`Ledger::append`], but failures are logged instead of returned.
    pub async fn append_logged(&self, record: &RunRecord) -> bool {
        match self.append(record).await {
            Ok(()) => {
                logok(format!("Logged run: {} ({})", record.subject, record.status));
                true
            }
            Err(err) => {
                loge(format!("Ledger write failed for {}: {}", record.subject, err));
                false
            }
        }
    }

    /// Parsed entries, oldest first. Rows that cannot be parsed are skipped.
    pub async fn entries(&self) -> Result<Vec<RunRecord>> {
        let table = self.read().await?;
        let Some(schema) = LedgerSchema::resolve(&table) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(table.rows.len());
        for (idx, row) in table.rows.iter().enumerate() {
            match schema.parse_row(row) {
                Ok(record) => out.push(record),
                Err(why) => logw(format!("Skipping ledger row {}: {}", idx + 1, why)),
            }
        }
        Ok(out)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.read().await?.rows.len())
    }
}
