use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};

use crate::generator::{GenerateSummary, UpdateSummary};
use crate::pagination::Page;
use crate::record::{GenerationConfig, GenerationRecord, RecordSummary};
use crate::render::Artifact;
use crate::typemap::{ColumnOptions, column_options as all_column_options};

use super::{
    AdminState, ApiErr, Envelope,
    dto::{CreatedRecord, ListRecordsQuery},
    extract::{ApiJson, ApiPath, ApiQuery},
    jwt::Operator,
    ok,
};

/// The full option enumerations for the per-column configuration UI.
pub async fn column_options(_op: Operator) -> Json<Envelope<ColumnOptions>> {
    ok(all_column_options())
}

pub async fn list_records(
    _op: Operator,
    State(state): State<AdminState>,
    ApiQuery(params): ApiQuery<ListRecordsQuery>,
) -> Result<Json<Envelope<Page<RecordSummary>>>, ApiErr> {
    let page = state.store.list(&params.filter(), params.page()).await?;
    Ok(ok(page))
}

pub async fn create_record(
    op: Operator,
    State(state): State<AdminState>,
    ApiJson(mut config): ApiJson<GenerationConfig>,
) -> Result<(StatusCode, Json<Envelope<CreatedRecord>>), ApiErr> {
    if config.table_name.trim().is_empty() {
        return Err(ApiErr::bad_request("tableName is required"));
    }
    if config.author.is_empty() {
        config.author = op.name().to_string();
    }
    let id = state.generator.create_record(config).await?;
    Ok((StatusCode::CREATED, ok(CreatedRecord { id })))
}

pub async fn get_record(
    _op: Operator,
    State(state): State<AdminState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Envelope<GenerationRecord>>, ApiErr> {
    Ok(ok(state.store.get(id).await?))
}

pub async fn update_record(
    _op: Operator,
    State(state): State<AdminState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(config): ApiJson<GenerationConfig>,
) -> Result<Json<Envelope<UpdateSummary>>, ApiErr> {
    if config.table_name.trim().is_empty() {
        return Err(ApiErr::bad_request("tableName is required"));
    }
    Ok(ok(state.generator.update_record(id, config).await?))
}

pub async fn delete_record(
    _op: Operator,
    State(state): State<AdminState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Envelope<()>>, ApiErr> {
    state.generator.delete_record(id).await?;
    Ok(ok(()))
}

pub async fn preview_record(
    _op: Operator,
    State(state): State<AdminState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Envelope<Vec<Artifact>>>, ApiErr> {
    Ok(ok(state.generator.preview(id).await?))
}

pub async fn generate_record(
    _op: Operator,
    State(state): State<AdminState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Envelope<GenerateSummary>>, ApiErr> {
    Ok(ok(state.generator.generate(id).await?))
}
