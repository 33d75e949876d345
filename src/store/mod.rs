//! Tabular storage seam shared by the ledger, the catalog and the settings.
//!
//! A table is a permanent header row followed by mutable data rows. Data row
//! positions are 0-based and exclude the header, so position 0 is always the
//! oldest data row.

use async_trait::async_trait;

pub mod csv;
pub mod memory;
pub mod sheets;

pub use self::csv::CsvTable;
pub use self::memory::MemoryTable;
pub use self::sheets::SheetsTable;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("table '{0}' does not exist")]
    MissingTable(String),

    #[error("rows {start}..{end} out of range for table with {len} data rows")]
    RowsOutOfRange { start: usize, end: usize, len: usize },

    #[error("{0}")]
    Other(String),
}

/// Snapshot of a whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Builds a table from raw rows where the first row is the header.
    pub fn from_raw(mut raw: Vec<Vec<String>>) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        let header = raw.remove(0);
        Self { header, rows: raw }
    }

    /// Position of the first header matching any of `names`, case-insensitively.
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        self.header.iter().position(|h| {
            let h = h.trim();
            names.iter().any(|n| h.eq_ignore_ascii_case(n))
        })
    }

    /// Cell text at `(row, col)`, empty when the row is short.
    pub fn cell<'a>(row: &'a [String], col: Option<usize>) -> &'a str {
        col.and_then(|c| row.get(c)).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single tabular store: a CSV file, a spreadsheet worksheet, or memory.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Human readable name used in log lines.
    fn name(&self) -> &str;

    /// Reads the header and every data row.
    async fn read_table(&self) -> Result<Table>;

    /// Appends one data row after the last one.
    async fn append_row(&self, row: &[String]) -> Result<()>;

    /// Deletes `count` data rows starting at data position `start`.
    async fn delete_rows(&self, start: usize, count: usize) -> Result<()>;

    /// Creates the table with `header` and `seed` rows if it does not exist yet.
    /// Returns `true` when the table was created.
    async fn ensure_table(&self, header: &[&str], seed: &[Vec<String>]) -> Result<bool>;
}

pub(crate) fn check_range(start: usize, count: usize, len: usize) -> Result<()> {
    let end = start.saturating_add(count);
    if end > len {
        return Err(StoreError::RowsOutOfRange { start, end, len });
    }
    Ok(())
}

pub(crate) fn to_row<I, S>(cells: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    cells.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup_is_case_insensitive() {
        let table = Table::new(to_row(["Object", " Video_URL "]), vec![]);
        assert_eq!(table.column(&["video_url"]), Some(1));
        assert_eq!(table.column(&["Subject", "object"]), Some(0));
        assert_eq!(table.column(&["Status"]), None);
    }

    #[test]
    fn from_raw_splits_header() {
        let table = Table::from_raw(vec![to_row(["A", "B"]), to_row(["1", "2"])]);
        assert_eq!(table.header, to_row(["A", "B"]));
        assert_eq!(table.len(), 1);
        assert!(Table::from_raw(vec![]).header.is_empty());
    }

    #[test]
    fn range_check_rejects_overflow() {
        assert!(check_range(0, 2, 2).is_ok());
        assert!(check_range(1, 2, 2).is_err());
        assert!(check_range(0, 0, 0).is_ok());
    }
}
