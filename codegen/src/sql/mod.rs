//! Ad hoc SQL: synthesis from natural language and guarded execution.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{CodegenError, Result};

pub mod executor;
pub mod synth;

pub use executor::{PostgresRunner, SqlExecutor, SqlSession, StatementRunner};
pub use synth::{CompletionClient, HttpCompletionClient, SynthesizedSql, Synthesizer};

/// Which success shape a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Query,
    Mutation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
    },
    Affected {
        #[serde(rename = "affectedRows")]
        affected_rows: u64,
    },
}

/// Wire shape of an execution result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SqlExecutionResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: None,
            rows: None,
            affected_rows: None,
            error: Some(message.into()),
        }
    }
}

impl From<SqlOutcome> for SqlExecutionResult {
    fn from(outcome: SqlOutcome) -> Self {
        match outcome {
            SqlOutcome::Rows { columns, rows } => Self {
                success: true,
                columns: Some(columns),
                rows: Some(rows),
                affected_rows: None,
                error: None,
            },
            SqlOutcome::Affected { affected_rows } => Self {
                success: true,
                columns: None,
                rows: None,
                affected_rows: Some(affected_rows),
                error: None,
            },
        }
    }
}

/// Result column names with repeats suffixed (`a`, `a_2`, ...), so every
/// column keeps its own key in a row map.
pub fn unique_column_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.into_iter().collect();
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in &names {
        let mut candidate = name.to_string();
        let mut n = 2;
        while out.contains(&candidate) || (candidate != *name && names.contains(&candidate.as_str())) {
            candidate = format!("{name}_{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Parses `sql` and returns its only statement.
pub fn parse_single(sql: &str) -> Result<Statement> {
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| CodegenError::InvalidStatement(e.to_string()))?;
    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => Err(CodegenError::InvalidStatement("empty statement".into())),
        n => Err(CodegenError::InvalidStatement(format!(
            "expected a single statement, found {n}"
        ))),
    }
}

/// Sorts a statement into a result shape, or rejects it.
pub fn classify(statement: &Statement, allow_destructive: bool) -> Result<StatementKind> {
    // SECURITY: This is an allowlist — any new Statement variant must be reviewed before adding here.
    if matches!(
        statement,
        Statement::Query(_)
            | Statement::Explain { .. }
            | Statement::ExplainTable { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowTables { .. }
            | Statement::ShowColumns { .. }
    ) {
        return Ok(StatementKind::Query);
    }

    if matches!(
        statement,
        Statement::Insert { .. }
            | Statement::Update { .. }
            | Statement::Delete { .. }
            | Statement::Merge { .. }
            | Statement::CreateTable { .. }
            | Statement::CreateView { .. }
            | Statement::CreateIndex { .. }
            | Statement::CreateSchema { .. }
            | Statement::CreateSequence { .. }
            | Statement::AlterTable { .. }
            | Statement::AlterIndex { .. }
            | Statement::AlterView { .. }
            | Statement::Comment { .. }
    ) {
        return Ok(StatementKind::Mutation);
    }

    let destructive = matches!(statement, Statement::Drop { .. } | Statement::Truncate { .. });
    if destructive && allow_destructive {
        return Ok(StatementKind::Mutation);
    }

    let stmt_type = std::mem::discriminant(statement);
    tracing::warn!(statement_type = ?stmt_type, destructive, "Rejected SQL statement");
    Err(CodegenError::InvalidStatement(if destructive {
        "DROP and TRUNCATE are disabled".into()
    } else {
        "statement type is not allowed".into()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(sql: &str) -> Result<StatementKind> {
        classify(&parse_single(sql)?, false)
    }

    #[test]
    fn reads_are_queries() {
        for sql in [
            "SELECT 1",
            "WITH t AS (SELECT 1) SELECT * FROM t",
            "VALUES (1), (2)",
            "EXPLAIN SELECT * FROM orders",
            "SHOW server_version",
        ] {
            assert_eq!(kind(sql).unwrap(), StatementKind::Query, "{sql}");
        }
    }

    #[test]
    fn writes_are_mutations() {
        for sql in [
            "INSERT INTO orders (id) VALUES (1)",
            "UPDATE orders SET total_amount = 0 WHERE id = 999999",
            "DELETE FROM orders WHERE id = 1",
            "CREATE TABLE t (id int)",
            "ALTER TABLE orders ADD COLUMN note text",
            "COMMENT ON TABLE orders IS 'Customer orders'",
        ] {
            assert_eq!(kind(sql).unwrap(), StatementKind::Mutation, "{sql}");
        }
    }

    #[test]
    fn chained_statements_are_rejected() {
        let err = parse_single("SELECT 1; DROP TABLE orders;").unwrap_err();
        assert!(matches!(err, CodegenError::InvalidStatement(_)));
    }

    #[test]
    fn trailing_semicolon_is_one_statement() {
        assert!(parse_single("SELECT 1;").is_ok());
    }

    #[test]
    fn empty_and_garbage_are_rejected() {
        assert!(matches!(parse_single("   "), Err(CodegenError::InvalidStatement(_))));
        assert!(matches!(
            parse_single("SELEC 1"),
            Err(CodegenError::InvalidStatement(_))
        ));
    }

    #[test]
    fn session_and_transaction_control_is_rejected() {
        for sql in ["SET search_path = public", "BEGIN", "COMMIT", "GRANT SELECT ON orders TO bob"] {
            assert!(
                matches!(kind(sql), Err(CodegenError::InvalidStatement(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn destructive_statements_need_opt_in() {
        let drop = parse_single("DROP TABLE orders").unwrap();
        assert!(classify(&drop, false).is_err());
        assert_eq!(classify(&drop, true).unwrap(), StatementKind::Mutation);

        let truncate = parse_single("TRUNCATE orders").unwrap();
        assert!(classify(&truncate, false).is_err());
        assert_eq!(classify(&truncate, true).unwrap(), StatementKind::Mutation);
    }

    #[test]
    fn repeated_column_names_get_suffixes() {
        assert_eq!(unique_column_names(["a", "b"]), vec!["a", "b"]);
        assert_eq!(unique_column_names(["a", "a", "a"]), vec!["a", "a_2", "a_3"]);
        // a real `a_2` further on keeps its name
        assert_eq!(unique_column_names(["a", "a", "a_2"]), vec!["a", "a_3", "a_2"]);
    }

    #[test]
    fn result_wire_shape() {
        let rows: SqlExecutionResult = SqlOutcome::Affected { affected_rows: 0 }.into();
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            serde_json::json!({ "success": true, "affectedRows": 0 })
        );
        assert_eq!(
            serde_json::to_value(SqlExecutionResult::failure("boom")).unwrap(),
            serde_json::json!({ "success": false, "error": "boom" })
        );
    }
}
