use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, Result};
use crate::pagination::{Page, PageRequest};
use crate::typemap::{self, Classification, ParsedType};

#[cfg(test)]
pub mod memory;
pub mod postgres;

// ---------- descriptors ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    #[default]
    None,
    Primary,
    Unique,
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type name as the catalog reports it (e.g. "varchar", "int4")
    pub data_type: String,
    /// Full type including modifiers (e.g. "character varying(64)")
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub comment: String,
    pub key: KeyRole,
    pub ordinal: i32,
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnDescriptor {
    pub fn is_primary_key(&self) -> bool {
        self.key == KeyRole::Primary
    }

    pub fn parsed_type(&self) -> Option<ParsedType> {
        typemap::parse_type(&self.column_type)
    }

    /// Type-mapper defaults; never stored.
    pub fn classification(&self) -> Option<Classification> {
        typemap::classify(&self.column_type, self.is_primary_key(), self.nullable)
    }

    pub fn is_temporal(&self) -> bool {
        self.parsed_type().is_some_and(|t| t.family.is_temporal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub comment: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            name: self.name.clone(),
            comment: self.comment.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Table metadata without columns, as returned by list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub name: String,
    pub comment: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    pub name: Option<String>,
    pub comment: Option<String>,
    pub created_between: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl TableFilter {
    fn matches(&self, t: &TableSummary) -> bool {
        if let Some(ref name) = self.name
            && !contains_ignore_case(&t.name, name)
        {
            return false;
        }
        if let Some(ref comment) = self.comment
            && !contains_ignore_case(&t.comment, comment)
        {
            return false;
        }
        if let Some((from, to)) = self.created_between {
            return t.created_at.is_some_and(|c| c >= from && c <= to);
        }
        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ---------- source trait ----------

/// A live relational catalog. Implementations never cache: every call reflects
/// the catalog at the moment it is made.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn tables(&self) -> Result<Vec<TableSummary>>;

    /// `Ok(None)` when the table does not exist.
    async fn table(&self, name: &str) -> Result<Option<TableDescriptor>>;

    async fn all_tables(&self) -> Result<Vec<TableDescriptor>>;

    /// Whether `created_at` is known, and so whether a creation range can match.
    fn tracks_creation_time(&self) -> bool {
        true
    }
}

// ---------- introspector ----------

#[derive(Clone)]
pub struct Introspector {
    source: Arc<dyn CatalogSource>,
    hidden_tables: Vec<String>,
}

impl Introspector {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            hidden_tables: Vec::new(),
        }
    }

    /// Keeps a table (e.g. the record store's own) out of list views.
    pub fn hiding(mut self, table: impl Into<String>) -> Self {
        self.hidden_tables.push(table.into());
        self
    }

    fn is_hidden(&self, name: &str) -> bool {
        self.hidden_tables.iter().any(|t| t == name)
    }

    pub async fn list_tables(
        &self,
        filter: &TableFilter,
        page: PageRequest,
    ) -> Result<Page<TableSummary>> {
        if filter.created_between.is_some() && !self.source.tracks_creation_time() {
            return Err(CodegenError::InvalidArgument(
                "this catalog does not record table creation time".into(),
            ));
        }
        let mut tables: Vec<TableSummary> = self
            .source
            .tables()
            .await?
            .into_iter()
            .filter(|t| !self.is_hidden(&t.name) && filter.matches(t))
            .collect();

        // newest first, unknown creation time last, then by name
        tables.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(page.apply(tables))
    }

    pub async fn describe_table(&self, name: &str) -> Result<TableDescriptor> {
        let mut table = self
            .source
            .table(name)
            .await?
            .ok_or_else(|| CodegenError::not_found(format!("table `{name}`")))?;
        table.columns.sort_by_key(|c| c.ordinal);
        Ok(table)
    }

    /// Every table with its generation inputs. Temporal columns are audit
    /// fields and are left out; tables with nothing left are skipped.
    pub async fn list_all_tables_with_columns(&self) -> Result<Vec<TableDescriptor>> {
        let tables = self.source.all_tables().await?;
        Ok(tables
            .into_iter()
            .filter(|t| !self.is_hidden(&t.name))
            .filter_map(|mut t| {
                t.columns.retain(|c| !c.is_temporal());
                t.columns.sort_by_key(|c| c.ordinal);
                (!t.columns.is_empty()).then_some(t)
            })
            .collect())
    }
}
