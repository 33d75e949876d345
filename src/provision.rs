//! Creates the three tables with headers and seed rows, and checks that an
//! existing workspace is readable.

use crate::backend::Workspace;
use crate::candidate::{default_catalog, CATALOG_HEADER};
use crate::ledger::LEDGER_HEADER;
use crate::settings::{default_settings_rows, SETTINGS_HEADER};
use crate::store::{to_row, Result, TableStore};
use crate::{logok, logw};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

fn sample_history() -> Vec<Vec<String>> {
    vec![
        to_row(["Glass Apple", "https://example.com/video1", "2025-01-15", "Live", "5.2 min"]),
        to_row(["Glass Orange", "https://example.com/video2", "2025-01-14", "Live", "4.8 min"]),
    ]
}

fn catalog_rows() -> Vec<Vec<String>> {
    default_catalog()
        .into_iter()
        .map(|c| vec![c.name, c.category, c.appeal_score.to_string()])
        .collect()
}

async fn ensure(
    store: &dyn TableStore,
    header: &[&str],
    seed: &[Vec<String>],
    report: &mut ProvisionReport,
) -> Result<()> {
    if store.ensure_table(header, seed).await? {
        logok(format!("Created '{}' with {} seed rows", store.name(), seed.len()));
        report.created.push(store.name().to_string());
    } else {
        logok(format!("Found existing '{}'", store.name()));
        report.existing.push(store.name().to_string());
    }
    Ok(())
}

/// Ensures every table exists. Seed rows are only written to new tables.
pub async fn provision(ws: &Workspace) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();
    ensure(ws.content_tracker.as_ref(), LEDGER_HEADER, &sample_history(), &mut report).await?;
    ensure(ws.catalog.as_ref(), CATALOG_HEADER, &catalog_rows(), &mut report).await?;
    ensure(ws.settings.as_ref(), SETTINGS_HEADER, &default_settings_rows(), &mut report).await?;
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHealth {
    pub name: String,
    pub rows: Option<usize>,
    pub error: Option<String>,
}

impl TableHealth {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Reads every table once and reports its data row count or the error.
pub async fn check(ws: &Workspace) -> Vec<TableHealth> {
    let mut out = Vec::new();
    for store in [&ws.content_tracker, &ws.catalog, &ws.settings] {
        let health = match store.read_table().await {
            Ok(table) => TableHealth {
                name: store.name().to_string(),
                rows: Some(table.len()),
                error: None,
            },
            Err(err) => {
                logw(format!("Table '{}' unreadable: {}", store.name(), err));
                TableHealth {
                    name: store.name().to_string(),
                    rows: None,
                    error: Some(err.to_string()),
                }
            }
        };
        out.push(health);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn provisions_once_then_reports_existing() {
        let ws = Workspace::in_memory(&Config::default());
        let first = provision(&ws).await.unwrap();
        assert_eq!(first.created.len(), 3);
        assert!(first.existing.is_empty());

        let second = provision(&ws).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing.len(), 3);

        let health = check(&ws).await;
        assert!(health.iter().all(TableHealth::ok));
        assert_eq!(health[0].rows, Some(2));
        assert_eq!(health[1].rows, Some(20));
        assert_eq!(health[2].rows, Some(default_settings_rows().len()));
    }

    #[tokio::test]
    async fn check_reports_missing_tables() {
        let ws = Workspace::in_memory(&Config::default());
        let health = check(&ws).await;
        assert!(health.iter().all(|h| !h.ok()));
    }
}
