use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::catalog::{ColumnDescriptor, TableDescriptor, TableFilter};
use crate::pagination::{DEFAULT_PAGE_SIZE, PageRequest};
use crate::record::{RecordFilter, RecordStatus};
use crate::sql::StatementKind;
use crate::typemap::Classification;

fn page_of(current_page: Option<u64>, page_size: Option<i64>) -> PageRequest {
    PageRequest::new(
        current_page.unwrap_or(1),
        page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
}

/// Both ends or neither; a half-open range is ignored.
fn range_of(
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    start.zip(end)
}

// ---------- table requests ----------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTablesQuery {
    pub current_page: Option<u64>,
    pub page_size: Option<i64>,
    pub table_name: Option<String>,
    pub table_comment: Option<String>,
    pub created_start: Option<NaiveDateTime>,
    pub created_end: Option<NaiveDateTime>,
}

impl ListTablesQuery {
    pub fn page(&self) -> PageRequest {
        page_of(self.current_page, self.page_size)
    }

    pub fn filter(&self) -> TableFilter {
        TableFilter {
            name: self.table_name.clone(),
            comment: self.table_comment.clone(),
            created_between: range_of(self.created_start, self.created_end),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportTablesRequest {
    pub tables: Vec<String>,
}

// ---------- table responses ----------

/// A column plus the modes it gets when no override applies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: ColumnDescriptor,
    /// `None` when the type has no default classification.
    pub defaults: Option<Classification>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDetail {
    pub name: String,
    pub comment: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub columns: Vec<ColumnView>,
}

impl From<TableDescriptor> for TableDetail {
    fn from(t: TableDescriptor) -> Self {
        Self {
            name: t.name,
            comment: t.comment,
            created_at: t.created_at,
            updated_at: t.updated_at,
            columns: t
                .columns
                .into_iter()
                .map(|c| ColumnView {
                    defaults: c.classification(),
                    column: c,
                })
                .collect(),
        }
    }
}

// ---------- record requests ----------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordsQuery {
    pub current_page: Option<u64>,
    pub page_size: Option<i64>,
    pub table_name: Option<String>,
    pub table_comment: Option<String>,
    pub created_start: Option<NaiveDateTime>,
    pub created_end: Option<NaiveDateTime>,
    pub status: Option<RecordStatus>,
}

impl ListRecordsQuery {
    pub fn page(&self) -> PageRequest {
        page_of(self.current_page, self.page_size)
    }

    pub fn filter(&self) -> RecordFilter {
        RecordFilter {
            table_name: self.table_name.clone(),
            table_comment: self.table_comment.clone(),
            created_range: range_of(self.created_start, self.created_end),
            status: self.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedRecord {
    pub id: i32,
}

// ---------- sql requests ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest {
    pub prompt: String,
    pub table_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub kind: StatementKind,
}
