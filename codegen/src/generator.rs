//! Record lifecycle operations that span the catalog, the record store, the
//! renderer and the artifact store.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::artifact::ArtifactStore;
use crate::catalog::{Introspector, TableDescriptor};
use crate::error::Result;
use crate::record::{GenerationConfig, RecordStore};
use crate::render::{Artifact, Renderer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub count: usize,
    pub tables: Vec<String>,
    pub ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub id: i32,
    /// Overrides dropped because their column left the table.
    pub dropped_overrides: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummary {
    pub id: i32,
    pub files: Vec<PathBuf>,
}

pub struct Generator {
    introspector: Arc<Introspector>,
    store: Arc<RecordStore>,
    renderer: Arc<Renderer>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl Generator {
    pub fn new(
        introspector: Arc<Introspector>,
        store: Arc<RecordStore>,
        renderer: Arc<Renderer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            introspector,
            store,
            renderer,
            artifacts,
        }
    }

    /// Creates one record per named table with default settings. Every table
    /// is described before anything is written, so a missing table leaves the
    /// store untouched.
    pub async fn import_tables(&self, names: &[String], operator: &str) -> Result<ImportSummary> {
        let mut tables: Vec<(GenerationConfig, TableDescriptor)> = Vec::with_capacity(names.len());
        for name in names {
            if tables.iter().any(|(_, t)| &t.name == name) {
                continue;
            }
            let table = self.introspector.describe_table(name).await?;
            tables.push((GenerationConfig::defaults_for(&table, operator), table));
        }

        let imported: Vec<String> = tables.iter().map(|(_, t)| t.name.clone()).collect();
        let ids = self.store.create_many(tables).await?;
        tracing::info!(count = ids.len(), operator, "Imported tables");
        Ok(ImportSummary {
            count: ids.len(),
            tables: imported,
            ids,
        })
    }

    pub async fn create_record(&self, config: GenerationConfig) -> Result<i32> {
        let table = self.introspector.describe_table(&config.table_name).await?;
        self.store.create(config, &table).await
    }

    /// Saves a new config against a fresh snapshot of the live table.
    pub async fn update_record(&self, id: i32, config: GenerationConfig) -> Result<UpdateSummary> {
        // NotFound for the record wins over NotFound for the table.
        self.store.get(id).await?;
        let table = self.introspector.describe_table(&config.table_name).await?;
        let dropped_overrides = self.store.update(id, config, &table).await?;
        Ok(UpdateSummary {
            id,
            dropped_overrides,
        })
    }

    /// Renders from the stored snapshot without touching anything.
    pub async fn preview(&self, id: i32) -> Result<Vec<Artifact>> {
        let record = self.store.get(id).await?;
        self.renderer.render(&record.table(), &record.config)
    }

    /// Reads, renders, writes and marks the record under its lock, so no
    /// update or delete can land between the files and the status.
    pub async fn generate(&self, id: i32) -> Result<GenerateSummary> {
        let held = self.store.lock(id).await;
        let record = self.store.get(id).await?;
        let artifacts = self.renderer.render(&record.table(), &record.config)?;
        let files = self
            .artifacts
            .write(&record.config.gen_path, &artifacts)
            .await?;
        self.store.mark_generated(&held, record.version).await?;
        tracing::info!(id, table = %record.table_name, files = files.len(), "Generated artifacts");
        Ok(GenerateSummary { id, files })
    }

    pub async fn delete_record(&self, id: i32) -> Result<()> {
        self.store.delete(id).await
    }
}
