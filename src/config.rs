use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is required for the sheets backend")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Csv,
    Sheets,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(BackendKind::Csv),
            "sheets" | "google_sheets" | "spreadsheet" => Ok(BackendKind::Sheets),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerKind {
    #[default]
    Ffmpeg,
    Placeholder,
}

impl FromStr for ProducerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(ProducerKind::Ffmpeg),
            "placeholder" | "mock" => Ok(ProducerKind::Placeholder),
            _ => Err(()),
        }
    }
}

/// Table (worksheet) names, or CSV file stems under `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub content_tracker: String,
    pub catalog: String,
    pub settings: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            content_tracker: "ASMR Content Tracker".to_string(),
            catalog: "Fruit_Database".to_string(),
            settings: "Settings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit backend; when absent, sheets is used if a sheet id is set.
    pub backend: Option<BackendKind>,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub audio_dir: Option<PathBuf>,
    pub sheet_id: Option<String>,
    pub google_access_token: Option<String>,
    pub youtube_access_token: Option<String>,
    pub producer: ProducerKind,
    pub keep_artifacts: bool,
    pub tables: TableNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: None,
            data_dir: PathBuf::from("."),
            output_dir: PathBuf::from("output"),
            audio_dir: Some(PathBuf::from("audio")),
            sheet_id: None,
            google_access_token: None,
            youtube_access_token: None,
            producer: ProducerKind::Ffmpeg,
            keep_artifacts: false,
            tables: TableNames::default(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` if given, else `config.json` when present, else defaults;
    /// then applies process environment overrides and validates.
    pub async fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path).await?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE).await?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = non_empty(lookup("LEDGER_BACKEND")) {
            self.backend = Some(v.parse().map_err(|_| ConfigError::Invalid {
                key: "LEDGER_BACKEND",
                value: v.clone(),
            })?);
        }
        if let Some(v) = non_empty(lookup("VIDEO_PRODUCER")) {
            self.producer = v.parse().map_err(|_| ConfigError::Invalid {
                key: "VIDEO_PRODUCER",
                value: v.clone(),
            })?;
        }
        if let Some(v) = non_empty(lookup("KEEP_ARTIFACTS")) {
            self.keep_artifacts = parse_bool("KEEP_ARTIFACTS", &v)?;
        }
        if let Some(v) = non_empty(lookup("DATA_DIR")) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(lookup("OUTPUT_DIR")) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(lookup("AUDIO_DIR")) {
            self.audio_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(lookup("GOOGLE_SHEET_ID")) {
            self.sheet_id = Some(v);
        }
        if let Some(v) = non_empty(lookup("GOOGLE_ACCESS_TOKEN")) {
            self.google_access_token = Some(v);
        }
        if let Some(v) = non_empty(lookup("YOUTUBE_ACCESS_TOKEN")) {
            self.youtube_access_token = Some(v);
        }
        Ok(())
    }

    pub fn backend(&self) -> BackendKind {
        match self.backend {
            Some(kind) => kind,
            None if self.sheet_id.is_some() => BackendKind::Sheets,
            None => BackendKind::Csv,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend() == BackendKind::Sheets {
            if non_empty(self.sheet_id.clone()).is_none() {
                return Err(ConfigError::Missing("GOOGLE_SHEET_ID"));
            }
            if non_empty(self.google_access_token.clone()).is_none() {
                return Err(ConfigError::Missing("GOOGLE_ACCESS_TOKEN"));
            }
        }
        Ok(())
    }

    pub fn csv_path(&self, table: &str) -> PathBuf {
        let stem: String = table
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        self.data_dir.join(format!("{}.csv", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_csv() {
        let config = Config::default();
        assert_eq!(config.backend(), BackendKind::Csv);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.csv_path(&config.tables.content_tracker),
            PathBuf::from("./asmr_content_tracker.csv")
        );
    }

    #[test]
    fn sheet_id_switches_backend_and_needs_token() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("GOOGLE_SHEET_ID", "abc")])).unwrap();
        assert_eq!(config.backend(), BackendKind::Sheets);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("GOOGLE_ACCESS_TOKEN"))));

        config.apply_overrides(env(&[("GOOGLE_ACCESS_TOKEN", "tok")])).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_csv_wins_over_sheet_id() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("GOOGLE_SHEET_ID", "abc"), ("LEDGER_BACKEND", "csv")]))
            .unwrap();
        assert_eq!(config.backend(), BackendKind::Csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sheets_without_id_is_fatal() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("LEDGER_BACKEND", "sheets")])).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("GOOGLE_SHEET_ID"))));
    }

    #[test]
    fn invalid_overrides_are_errors() {
        let mut config = Config::default();
        assert!(config.apply_overrides(env(&[("LEDGER_BACKEND", "excel")])).is_err());
        assert!(config.apply_overrides(env(&[("KEEP_ARTIFACTS", "perhaps")])).is_err());
        config
            .apply_overrides(env(&[("VIDEO_PRODUCER", "mock"), ("KEEP_ARTIFACTS", "yes"), ("GOOGLE_SHEET_ID", "  ")]))
            .unwrap();
        assert_eq!(config.producer, ProducerKind::Placeholder);
        assert!(config.keep_artifacts);
        assert!(config.sheet_id.is_none());
    }

    #[tokio::test]
    async fn loads_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"backend":"sheets","sheet_id":"s1","google_access_token":"t","tables":{"catalog":"Fruits"}}"#,
        )
        .unwrap();
        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.backend(), BackendKind::Sheets);
        assert_eq!(config.tables.catalog, "Fruits");
        assert_eq!(config.tables.settings, "Settings");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn broken_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(Config::load(&path).await, Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::load(dir.path().join("missing.json")).await,
            Err(ConfigError::Read { .. })
        ));
    }
}
