use axum::{
    extract::State,
    response::Json,
};

use crate::catalog::{TableDescriptor, TableSummary};
use crate::generator::ImportSummary;
use crate::pagination::Page;

use super::{
    AdminState, ApiErr, Envelope,
    dto::{ImportTablesRequest, ListTablesQuery, TableDetail},
    extract::{ApiJson, ApiPath, ApiQuery},
    jwt::Operator,
    ok,
};

pub async fn list_tables(
    _op: Operator,
    State(state): State<AdminState>,
    ApiQuery(params): ApiQuery<ListTablesQuery>,
) -> Result<Json<Envelope<Page<TableSummary>>>, ApiErr> {
    let page = state
        .introspector
        .list_tables(&params.filter(), params.page())
        .await?;
    Ok(ok(page))
}

/// Every table with its non-temporal columns, for the import picker.
pub async fn list_tables_with_columns(
    _op: Operator,
    State(state): State<AdminState>,
) -> Result<Json<Envelope<Vec<TableDescriptor>>>, ApiErr> {
    Ok(ok(state.introspector.list_all_tables_with_columns().await?))
}

pub async fn describe_table(
    _op: Operator,
    State(state): State<AdminState>,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<Envelope<TableDetail>>, ApiErr> {
    let table = state.introspector.describe_table(&name).await?;
    Ok(ok(TableDetail::from(table)))
}

pub async fn import_tables(
    op: Operator,
    State(state): State<AdminState>,
    ApiJson(body): ApiJson<ImportTablesRequest>,
) -> Result<Json<Envelope<ImportSummary>>, ApiErr> {
    if body.tables.iter().all(|t| t.trim().is_empty()) {
        return Err(ApiErr::bad_request("No tables selected"));
    }
    let names: Vec<String> = body
        .tables
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let summary = state.generator.import_tables(&names, op.name()).await?;
    Ok(ok(summary))
}
