use axum::{extract::State, response::Json};

use crate::error::CodegenError;
use crate::sql::{SqlExecutionResult, SynthesizedSql};

use super::{
    AdminState, ApiErr, Envelope,
    dto::{CheckResponse, SqlRequest, SynthesizeRequest},
    extract::ApiJson,
    jwt::Operator,
    ok,
};

/// Candidate SQL for a prompt. The result is returned for review only.
pub async fn synthesize(
    _op: Operator,
    State(state): State<AdminState>,
    ApiJson(body): ApiJson<SynthesizeRequest>,
) -> Result<Json<Envelope<SynthesizedSql>>, ApiErr> {
    if body.prompt.trim().is_empty() {
        return Err(ApiErr::bad_request("prompt is required"));
    }
    let synthesizer = state.synthesizer.as_ref().ok_or_else(|| {
        ApiErr::from(CodegenError::SynthesisUnavailable(
            "no completion service configured".into(),
        ))
    })?;
    let table = body
        .table_name
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    Ok(ok(synthesizer.synthesize(&body.prompt, table).await?))
}

/// Dry run: parses and classifies without touching the database.
pub async fn check(
    _op: Operator,
    State(state): State<AdminState>,
    ApiJson(body): ApiJson<SqlRequest>,
) -> Result<Json<Envelope<CheckResponse>>, ApiErr> {
    let kind = state.executor.check(&body.sql)?;
    Ok(ok(CheckResponse { kind }))
}

pub async fn execute(
    op: Operator,
    State(state): State<AdminState>,
    ApiJson(body): ApiJson<SqlRequest>,
) -> Result<Json<Envelope<SqlExecutionResult>>, ApiErr> {
    tracing::info!(operator = op.name(), "Executing ad hoc SQL");
    match state.executor.execute(&body.sql).await {
        Ok(outcome) => Ok(ok(outcome.into())),
        Err(e) => {
            let result = SqlExecutionResult::failure(e.to_string());
            Err(ApiErr::from(e).with_data(result))
        }
    }
}
