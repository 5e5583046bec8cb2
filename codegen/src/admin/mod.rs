use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::catalog::Introspector;
use crate::error::CodegenError;
use crate::generator::Generator;
use crate::record::RecordStore;
use crate::sql::{SqlExecutor, Synthesizer};

pub mod dto;
pub mod extract;
pub mod jwt;
pub mod record_handlers;
pub mod sql_handlers;
pub mod table_handlers;

#[cfg(test)]
mod test_support;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AdminState {
    pub introspector: Arc<Introspector>,
    pub store: Arc<RecordStore>,
    pub generator: Arc<Generator>,
    pub executor: Arc<SqlExecutor>,
    /// `None` when no completion service is configured.
    pub synthesizer: Option<Arc<Synthesizer>>,
    pub jwt_secret: String,
}

// ---------- envelope ----------

/// Every response body: `{"code": 0, "message": "ok", "data": ...}` on success.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: 0,
        message: "ok".to_string(),
        data,
    })
}

// ---------- error type ----------

/// A failure envelope. `code` repeats the HTTP status; `data.kind` names the
/// failure so callers need not parse `message`.
pub struct ApiErr {
    status: StatusCode,
    message: String,
    data: serde_json::Value,
}

impl ApiErr {
    pub fn new(status: StatusCode, kind: &str, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            data: serde_json::json!({ "kind": kind }),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", msg)
    }

    /// A request that could not be parsed: bad path segment, query or body.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_argument", msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", msg)
    }

    /// Replaces the `data` payload, keeping the status and message.
    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
        self
    }
}

pub fn status_for(e: &CodegenError) -> StatusCode {
    match e {
        CodegenError::NotFound(_) => StatusCode::NOT_FOUND,
        CodegenError::InvalidStatement(_) | CodegenError::UnsupportedType { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CodegenError::Conflict(_) => StatusCode::CONFLICT,
        CodegenError::CatalogUnavailable(_) | CodegenError::SynthesisUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CodegenError::ExecutionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CodegenError::ExecutionError(_) | CodegenError::InvalidArgument(_) => {
            StatusCode::BAD_REQUEST
        }
        CodegenError::Storage(_) | CodegenError::Template(_) | CodegenError::Artifact(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<CodegenError> for ApiErr {
    fn from(e: CodegenError) -> Self {
        let status = status_for(&e);
        if status.is_server_error() {
            tracing::error!(kind = e.kind(), error = %e, "Request failed");
        } else {
            tracing::debug!(kind = e.kind(), error = %e, "Request rejected");
        }
        Self::new(status, e.kind(), e.to_string())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = Envelope {
            code: self.status.as_u16(),
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------- router ----------

pub fn admin_router(state: AdminState, cors_origins: &[String], ui_dir: &Path) -> Router {
    let allowed_origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api_v1())
        .fallback_service(ServeDir::new(ui_dir))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_v1() -> Router<AdminState> {
    Router::new()
        // catalog
        .route("/table", get(table_handlers::list_tables))
        .route("/table/columns", get(table_handlers::list_tables_with_columns))
        .route("/table/{name}/columns", get(table_handlers::describe_table))
        .route("/table/import", post(table_handlers::import_tables))
        // generation records
        .route(
            "/generate/column/options",
            get(record_handlers::column_options),
        )
        .route(
            "/generate/record",
            get(record_handlers::list_records).post(record_handlers::create_record),
        )
        .route(
            "/generate/record/{id}",
            get(record_handlers::get_record)
                .put(record_handlers::update_record)
                .delete(record_handlers::delete_record),
        )
        .route(
            "/generate/record/{id}/generate",
            post(record_handlers::generate_record),
        )
        .route(
            "/generate/record/{id}/preview",
            get(record_handlers::preview_record),
        )
        // ad hoc SQL
        .route("/sql/generate", post(sql_handlers::synthesize))
        .route("/sql/check", post(sql_handlers::check))
        .route("/sql/execute", post(sql_handlers::execute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_envelope_carries_status_and_kind() {
        let resp = ApiErr::from(CodegenError::not_found("table `ghost`")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_of(resp).await,
            serde_json::json!({
                "code": 404,
                "message": "table `ghost` not found",
                "data": { "kind": "not_found" }
            })
        );
    }

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (CodegenError::InvalidStatement("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (CodegenError::ExecutionTimeout(30), StatusCode::GATEWAY_TIMEOUT),
            (CodegenError::ExecutionError("x".into()), StatusCode::BAD_REQUEST),
            (CodegenError::SynthesisUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CodegenError::CatalogUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CodegenError::Conflict("x".into()), StatusCode::CONFLICT),
            (CodegenError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (CodegenError::Artifact("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status, "{err}");
        }
    }

    #[tokio::test]
    async fn success_envelope_has_code_zero() {
        let resp = ok(serde_json::json!([1, 2])).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_of(resp).await,
            serde_json::json!({ "code": 0, "message": "ok", "data": [1, 2] })
        );
    }
}
