use super::{check_range, Result, StoreError, Table, TableStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory table. Clones share the same rows.
#[derive(Clone, Default)]
pub struct MemoryTable {
    name: String,
    inner: Arc<Mutex<Option<Table>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryTable {
    /// A table that does not exist until `ensure_table` is called.
    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_header(name: impl Into<String>, header: &[&str]) -> Self {
        let table = Self::missing(name);
        table.replace(Table::new(header.iter().map(|h| h.to_string()).collect(), vec![]));
        table
    }

    pub fn replace(&self, table: Table) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(table);
    }

    pub fn snapshot(&self) -> Option<Table> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Makes every subsequent read fail until switched off again.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent append/delete fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected(&self, flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Other(format!("injected {} failure on {}", op, self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_table(&self) -> Result<Table> {
        self.injected(&self.fail_reads, "read")?;
        self.snapshot()
            .ok_or_else(|| StoreError::MissingTable(self.name.clone()))
    }

    async fn append_row(&self, row: &[String]) -> Result<()> {
        self.injected(&self.fail_writes, "append")?;
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let table = guard
            .as_mut()
            .ok_or_else(|| StoreError::MissingTable(self.name.clone()))?;
        table.rows.push(row.to_vec());
        Ok(())
    }

    async fn delete_rows(&self, start: usize, count: usize) -> Result<()> {
        self.injected(&self.fail_writes, "delete")?;
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let table = guard
            .as_mut()
            .ok_or_else(|| StoreError::MissingTable(self.name.clone()))?;
        check_range(start, count, table.rows.len())?;
        table.rows.drain(start..start + count);
        Ok(())
    }

    async fn ensure_table(&self, header: &[&str], seed: &[Vec<String>]) -> Result<bool> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return Ok(false);
        }
        *guard = Some(Table::new(
            header.iter().map(|h| h.to_string()).collect(),
            seed.to_vec(),
        ));
        Ok(true)
    }
}
