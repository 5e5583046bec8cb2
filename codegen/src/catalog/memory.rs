use tokio::sync::RwLock;

use super::{CatalogSource, TableDescriptor, TableSummary};
use crate::error::Result;

/// Catalog held in memory. Tables can be replaced or dropped at runtime to
/// simulate schema drift.
pub struct MemoryCatalog {
    tables: RwLock<Vec<TableDescriptor>>,
    creation_times: bool,
}

impl MemoryCatalog {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self {
            tables: RwLock::new(tables),
            creation_times: true,
        }
    }

    /// Behaves like a catalog that keeps no table creation time.
    pub fn without_creation_times(mut self) -> Self {
        self.creation_times = false;
        self
    }

    /// Inserts the table, replacing any table with the same name.
    pub async fn put(&self, table: TableDescriptor) {
        let mut tables = self.tables.write().await;
        tables.retain(|t| t.name != table.name);
        tables.push(table);
    }

    pub async fn drop_table(&self, name: &str) {
        self.tables.write().await.retain(|t| t.name != name);
    }
}

#[async_trait::async_trait]
impl CatalogSource for MemoryCatalog {
    async fn tables(&self) -> Result<Vec<TableSummary>> {
        Ok(self.tables.read().await.iter().map(|t| t.summary()).collect())
    }

    async fn table(&self, name: &str) -> Result<Option<TableDescriptor>> {
        Ok(self
            .tables
            .read()
            .await
            .iter()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn all_tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.tables.read().await.clone())
    }

    fn tracks_creation_time(&self) -> bool {
        self.creation_times
    }
}
