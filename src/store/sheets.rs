use super::{check_range, Result, StoreError, Table, TableStore};
use crate::api::sheets::{column_letter, quote_sheet, SheetsClient};
use crate::logi;
use async_trait::async_trait;

/// Half-open grid row range for `count` data rows from data position `start`.
/// Grid row 0 is the header, so data position 0 is grid row 1.
fn grid_rows(start: usize, count: usize) -> (usize, usize) {
    (start + 1, start + 1 + count)
}

/// One worksheet of a remote spreadsheet. Grid row 1 holds the header.
#[derive(Clone)]
pub struct SheetsTable {
    client: SheetsClient,
    title: String,
}

impl SheetsTable {
    pub fn new(client: SheetsClient, title: impl Into<String>) -> Self {
        Self {
            client,
            title: title.into(),
        }
    }

    async fn require_sheet_id(&self) -> Result<i64> {
        self.client
            .sheet_id(&self.title)
            .await?
            .ok_or_else(|| StoreError::MissingTable(self.title.clone()))
    }
}

#[async_trait]
impl TableStore for SheetsTable {
    fn name(&self) -> &str {
        &self.title
    }

    async fn read_table(&self) -> Result<Table> {
        match self.client.get_values(&self.title).await {
            Ok(raw) => Ok(Table::from_raw(raw)),
            // The values endpoint answers 400 for a range naming an unknown sheet.
            Err(StoreError::Api { status: 400, .. }) => Err(StoreError::MissingTable(self.title.clone())),
            Err(err) => Err(err),
        }
    }

    async fn append_row(&self, row: &[String]) -> Result<()> {
        self.client.append_values(&self.title, &[row.to_vec()]).await
    }

    async fn delete_rows(&self, start: usize, count: usize) -> Result<()> {
        let table = self.read_table().await?;
        check_range(start, count, table.rows.len())?;
        if count == 0 {
            return Ok(());
        }
        let sheet_id = self.require_sheet_id().await?;
        let (grid_start, grid_end) = grid_rows(start, count);
        self.client
            .delete_grid_rows(sheet_id, grid_start, grid_end)
            .await
    }

    async fn ensure_table(&self, header: &[&str], seed: &[Vec<String>]) -> Result<bool> {
        if self.client.sheet_id(&self.title).await?.is_none() {
            self.client
                .add_sheet(&self.title, (seed.len() + 1).max(100), header.len().max(1))
                .await?;
            logi(format!("Created worksheet '{}'", self.title));
        } else if !self.client.get_values(&self.title).await?.is_empty() {
            return Ok(false);
        }

        let mut rows = Vec::with_capacity(seed.len() + 1);
        rows.push(header.iter().map(|h| h.to_string()).collect());
        rows.extend(seed.iter().cloned());
        let range = format!(
            "{}!A1:{}{}",
            quote_sheet(&self.title),
            column_letter(header.len().max(1)),
            rows.len()
        );
        self.client.update_values(&range, &rows).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_rows_skip_the_header() {
        assert_eq!(grid_rows(0, 1), (1, 2));
        assert_eq!(grid_rows(0, 3), (1, 4));
        assert_eq!(grid_rows(4, 2), (5, 7));
    }
}
