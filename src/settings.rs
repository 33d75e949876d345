use crate::ledger::DEFAULT_CAPACITY;
use crate::store::{Table, TableStore};
use crate::{logi, logw};
use std::collections::HashMap;
use std::str::FromStr;

pub const SETTINGS_HEADER: &[&str] = &["Setting", "Value", "Description"];

pub const SCHEDULE_HOURS: &str = "Schedule_Hours";
pub const MAX_RECENT_OBJECTS: &str = "Max_Recent_Objects";
pub const MAX_LEDGER_ENTRIES: &str = "Max_Ledger_Entries";
pub const VIDEO_DURATION_SECONDS: &str = "Video_Duration_Seconds";
pub const MAX_RETRIES: &str = "Max_Retries";
pub const UPLOAD_TO_YOUTUBE: &str = "Upload_To_YouTube";

pub const DEFAULT_SCHEDULE_HOURS: u64 = 8;
pub const DEFAULT_MAX_RECENT: usize = 7;
pub const DEFAULT_VIDEO_SECONDS: u32 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Key/value runtime settings read from the Settings table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn from_table(table: &Table) -> Self {
        let key_col = table.column(&["Setting", "Key"]);
        let value_col = table.column(&["Value"]);
        let mut values = HashMap::new();
        for row in &table.rows {
            let key = Table::cell(row, key_col).trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), Table::cell(row, value_col).trim().to_string());
        }
        Self { values }
    }

    /// Loads settings; an unreadable table yields an empty set (all defaults).
    pub async fn load(store: &dyn TableStore) -> Self {
        match store.read_table().await {
            Ok(table) => {
                let settings = Self::from_table(&table);
                logi(format!("Loaded {} settings from {}", settings.values.len(), store.name()));
                settings
            }
            Err(err) => {
                logw(format!("Settings read failed ({}): {}; using defaults", store.name(), err));
                Self::default()
            }
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    /// Typed lookup; missing or unparseable values give `default`.
    pub fn get<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.raw(key) {
            None | Some("") => default,
            Some(raw) => match raw.parse::<T>() {
                Ok(v) => v,
                Err(_) => {
                    logw(format!("Setting {}='{}' is not valid; using default", key, raw));
                    default
                }
            },
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.raw(key).map(|v| v.to_ascii_lowercase()) {
            None => default,
            Some(v) => match v.as_str() {
                "true" | "yes" | "1" | "on" => true,
                "false" | "no" | "0" | "off" => false,
                "" => default,
                _ => {
                    logw(format!("Setting {}='{}' is not a boolean; using default", key, v));
                    default
                }
            },
        }
    }

    pub fn schedule_hours(&self) -> u64 {
        self.get(SCHEDULE_HOURS, DEFAULT_SCHEDULE_HOURS)
    }

    pub fn max_recent(&self) -> usize {
        self.get(MAX_RECENT_OBJECTS, DEFAULT_MAX_RECENT)
    }

    pub fn ledger_capacity(&self) -> usize {
        self.get(MAX_LEDGER_ENTRIES, DEFAULT_CAPACITY)
    }

    pub fn video_duration_seconds(&self) -> u32 {
        self.get(VIDEO_DURATION_SECONDS, DEFAULT_VIDEO_SECONDS).max(1)
    }

    pub fn max_retries(&self) -> u32 {
        self.get(MAX_RETRIES, DEFAULT_MAX_RETRIES).max(1)
    }

    pub fn upload_enabled(&self) -> bool {
        self.get_bool(UPLOAD_TO_YOUTUBE, true)
    }
}

/// Seed rows written when the Settings table is provisioned.
pub fn default_settings_rows() -> Vec<Vec<String>> {
    [
        (SCHEDULE_HOURS, "8", "Hours between automated runs"),
        (MAX_RECENT_OBJECTS, "7", "Number of recent objects to avoid"),
        (MAX_LEDGER_ENTRIES, "20", "Run history entries to keep"),
        (VIDEO_DURATION_SECONDS, "10", "Target video duration"),
        (MAX_RETRIES, "3", "Max attempts for storage operations"),
        (UPLOAD_TO_YOUTUBE, "true", "Enable YouTube uploads"),
    ]
    .iter()
    .map(|(k, v, d)| vec![k.to_string(), v.to_string(), d.to_string()])
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{to_row, MemoryTable};

    #[test]
    fn defaults_when_missing() {
        let s = Settings::default();
        assert_eq!(s.schedule_hours(), 8);
        assert_eq!(s.max_recent(), 7);
        assert_eq!(s.ledger_capacity(), 20);
        assert_eq!(s.video_duration_seconds(), 10);
        assert!(s.upload_enabled());
    }

    #[test]
    fn reads_table_values() {
        let table = Table::new(
            to_row(SETTINGS_HEADER.iter().copied()),
            vec![
                to_row(["Schedule_Hours", "6", "x"]),
                to_row(["Max_Recent_Objects", " 3 ", ""]),
                to_row(["Upload_To_YouTube", "FALSE", ""]),
                to_row(["", "ignored", ""]),
            ],
        );
        let s = Settings::from_table(&table);
        assert_eq!(s.schedule_hours(), 6);
        assert_eq!(s.max_recent(), 3);
        assert!(!s.upload_enabled());
    }

    #[test]
    fn bad_values_fall_back() {
        let s = Settings::from_pairs([("Max_Recent_Objects", "-2"), ("Upload_To_YouTube", "maybe")]);
        assert_eq!(s.max_recent(), 7);
        assert!(s.upload_enabled());
    }

    #[tokio::test]
    async fn unreadable_table_gives_defaults() {
        let store = MemoryTable::missing("Settings");
        assert_eq!(Settings::load(&store).await, Settings::default());
    }

    #[test]
    fn seed_rows_parse_back_to_defaults() {
        let table = Table::new(to_row(SETTINGS_HEADER.iter().copied()), default_settings_rows());
        let s = Settings::from_table(&table);
        assert_eq!(s.schedule_hours(), DEFAULT_SCHEDULE_HOURS);
        assert_eq!(s.ledger_capacity(), DEFAULT_CAPACITY);
        assert_eq!(s.max_retries(), DEFAULT_MAX_RETRIES);
    }
}
