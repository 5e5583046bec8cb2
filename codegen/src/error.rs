use thiserror::Error;

/// Failure kinds surfaced by the generation core.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("column `{column}` has unsupported type `{raw_type}` and no override")]
    UnsupportedType { column: String, raw_type: String },

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("statement timed out after {0}s")]
    ExecutionTimeout(u64),

    #[error("sql synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("artifact store error: {0}")]
    Artifact(String),
}

impl CodegenError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable snake_case name, used in API envelopes and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::CatalogUnavailable(_) => "catalog_unavailable",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::InvalidStatement(_) => "invalid_statement",
            Self::ExecutionError(_) => "execution_error",
            Self::ExecutionTimeout(_) => "execution_timeout",
            Self::SynthesisUnavailable(_) => "synthesis_unavailable",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage",
            Self::Template(_) => "template",
            Self::Artifact(_) => "artifact",
        }
    }
}

pub type Result<T, E = CodegenError> = std::result::Result<T, E>;
