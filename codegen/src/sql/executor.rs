use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_postgres::{NoTls, SimpleQueryMessage};

use super::{SqlOutcome, StatementKind, classify, parse_single, unique_column_names};
use crate::error::{CodegenError, Result};

/// Opens sessions against the database statements run on.
#[async_trait]
pub trait StatementRunner: Send + Sync {
    async fn open(&self) -> Result<Box<dyn SqlSession>>;
}

/// One live connection. `cancel` must abort whatever `run` is doing on the
/// server, not just locally.
#[async_trait]
pub trait SqlSession: Send + Sync {
    async fn run(&self, sql: &str, kind: StatementKind) -> Result<SqlOutcome>;
    async fn cancel(&self) -> Result<()>;
}

/// Validates caller-supplied SQL and runs it under a hard timeout.
pub struct SqlExecutor {
    runner: Arc<dyn StatementRunner>,
    timeout: Duration,
    allow_destructive: bool,
}

impl SqlExecutor {
    pub fn new(runner: Arc<dyn StatementRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            allow_destructive: false,
        }
    }

    pub fn allow_destructive(mut self, allow: bool) -> Self {
        self.allow_destructive = allow;
        self
    }

    /// Parses and classifies without running anything.
    pub fn check(&self, sql: &str) -> Result<StatementKind> {
        classify(&parse_single(sql)?, self.allow_destructive)
    }

    pub async fn execute(&self, sql: &str) -> Result<SqlOutcome> {
        let statement = parse_single(sql)?;
        let kind = classify(&statement, self.allow_destructive)?;
        // Only the parsed statement is sent, never the raw text.
        let canonical = statement.to_string();

        // Connecting counts against the same budget as running.
        let deadline = tokio::time::Instant::now() + self.timeout;
        let session = match tokio::time::timeout_at(deadline, self.runner.open()).await {
            Ok(session) => session?,
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "SQL connection timed out");
                return Err(CodegenError::ExecutionTimeout(self.timeout.as_secs()));
            }
        };
        match tokio::time::timeout_at(deadline, session.run(&canonical, kind)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::info!(error = %e, "SQL execution failed");
                }
                result
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "SQL execution timed out, cancelling");
                if let Err(e) = session.cancel().await {
                    tracing::warn!(error = %e, "Failed to cancel timed out statement");
                }
                Err(CodegenError::ExecutionTimeout(self.timeout.as_secs()))
            }
        }
    }
}

/// Runs statements over the simple query protocol on a fresh connection.
pub struct PostgresRunner {
    conn_str: String,
}

impl PostgresRunner {
    pub fn new(conn_str: impl Into<String>) -> Self {
        Self {
            conn_str: conn_str.into(),
        }
    }
}

#[async_trait]
impl StatementRunner for PostgresRunner {
    async fn open(&self) -> Result<Box<dyn SqlSession>> {
        let (client, connection) = tokio_postgres::connect(&self.conn_str, NoTls)
            .await
            .map_err(|e| CodegenError::CatalogUnavailable(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("SQL session connection error: {e}");
            }
        });

        Ok(Box::new(PostgresSession { client }))
    }
}

struct PostgresSession {
    client: tokio_postgres::Client,
}

fn execution_error(e: tokio_postgres::Error) -> CodegenError {
    let message = match e.as_db_error() {
        Some(db) => db.message().to_string(),
        None => e.to_string(),
    };
    CodegenError::ExecutionError(message)
}

#[async_trait]
impl SqlSession for PostgresSession {
    async fn run(&self, sql: &str, kind: StatementKind) -> Result<SqlOutcome> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(execution_error)?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        let mut affected_rows = 0;
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(desc) => {
                    columns = unique_column_names(desc.iter().map(|c| c.name()));
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_empty() {
                        columns = unique_column_names(row.columns().iter().map(|c| c.name()));
                    }
                    let mut mapped = Map::new();
                    for (i, name) in columns.iter().enumerate() {
                        let value = row
                            .get(i)
                            .map_or(Value::Null, |v| Value::String(v.to_string()));
                        mapped.insert(name.clone(), value);
                    }
                    rows.push(mapped);
                }
                SimpleQueryMessage::CommandComplete(n) => affected_rows = n,
                _ => {}
            }
        }

        Ok(match kind {
            StatementKind::Query => SqlOutcome::Rows { columns, rows },
            StatementKind::Mutation => SqlOutcome::Affected { affected_rows },
        })
    }

    async fn cancel(&self) -> Result<()> {
        self.client
            .cancel_token()
            .cancel_query(NoTls)
            .await
            .map_err(|e| CodegenError::ExecutionError(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// Records what ran; statements mentioning `pg_sleep` hang until dropped.
    #[derive(Clone, Default)]
    pub struct FakeRunner {
        ran: Arc<Mutex<Vec<String>>>,
        cancelled: Arc<AtomicBool>,
        affected: u64,
        unreachable: bool,
    }

    impl FakeRunner {
        pub fn affecting(affected: u64) -> Self {
            Self {
                affected,
                ..Self::default()
            }
        }

        /// A database whose connect never completes.
        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        pub fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }

        pub fn cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatementRunner for FakeRunner {
        async fn open(&self) -> Result<Box<dyn SqlSession>> {
            if self.unreachable {
                std::future::pending::<()>().await;
            }
            Ok(Box::new(self.clone()))
        }
    }

    #[async_trait]
    impl SqlSession for FakeRunner {
        async fn run(&self, sql: &str, kind: StatementKind) -> Result<SqlOutcome> {
            self.ran.lock().unwrap().push(sql.to_string());
            if sql.contains("pg_sleep") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if sql.contains("missing_table") {
                return Err(CodegenError::ExecutionError(
                    "relation \"missing_table\" does not exist".into(),
                ));
            }
            Ok(match kind {
                StatementKind::Query => {
                    let mut row = Map::new();
                    row.insert("b".into(), Value::String("2".into()));
                    row.insert("a".into(), Value::String("1".into()));
                    SqlOutcome::Rows {
                        columns: vec!["b".into(), "a".into()],
                        rows: vec![row],
                    }
                }
                StatementKind::Mutation => SqlOutcome::Affected {
                    affected_rows: self.affected,
                },
            })
        }

        async fn cancel(&self) -> Result<()> {
            self.cancelled.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
}
