use super::{check_range, Result, StoreError, Table, TableStore};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A table stored as a local CSV file: header line first, one record per line.
#[derive(Debug, Clone)]
pub struct CsvTable {
    name: String,
    path: PathBuf,
}

impl CsvTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_bytes(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::MissingTable(self.name.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn rewrite(&self, table: &Table) -> Result<()> {
        let mut raw = Vec::with_capacity(table.rows.len() + 1);
        raw.push(table.header.clone());
        raw.extend(table.rows.iter().cloned());
        let bytes = encode_rows(&raw)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Other(format!("csv rewrite task failed: {}", e)))?
    }
}

fn decode_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(rows)
}

fn encode_rows(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = ::csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Other(format!("csv flush failed: {}", e)))
}

#[async_trait]
impl TableStore for CsvTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_table(&self) -> Result<Table> {
        let bytes = self.read_bytes().await?;
        Ok(Table::from_raw(decode_rows(&bytes)?))
    }

    async fn append_row(&self, row: &[String]) -> Result<()> {
        let existing = self.read_bytes().await?;
        let mut bytes = Vec::new();
        if existing.last().is_some_and(|b| *b != b'\n') {
            bytes.push(b'\n');
        }
        bytes.extend(encode_rows(&[row.to_vec()])?);

        let mut file = fs::OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_rows(&self, start: usize, count: usize) -> Result<()> {
        let mut table = self.read_table().await?;
        check_range(start, count, table.rows.len())?;
        if count == 0 {
            return Ok(());
        }
        table.rows.drain(start..start + count);
        self.rewrite(&table).await
    }

    async fn ensure_table(&self, header: &[&str], seed: &[Vec<String>]) -> Result<bool> {
        if fs::metadata(&self.path).await.is_ok() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let table = Table::new(header.iter().map(|h| h.to_string()).collect(), seed.to_vec());
        self.rewrite(&table).await?;
        Ok(true)
    }
}
