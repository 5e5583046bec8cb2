use std::collections::BTreeMap;
use std::time::Duration;

use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

use super::{CatalogSource, ColumnDescriptor, KeyRole, TableDescriptor, TableSummary};
use crate::error::{CodegenError, Result};

const TABLES_SQL: &str = "SELECT c.relname, COALESCE(obj_description(c.oid, 'pg_class'), '') \
     FROM pg_class c \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1 AND c.relkind IN ('r', 'p') \
     ORDER BY c.relname";

const TABLE_SQL: &str = "SELECT c.relname, COALESCE(obj_description(c.oid, 'pg_class'), '') \
     FROM pg_class c \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1 AND c.relkind IN ('r', 'p') AND c.relname = $2";

// Key role picks the strongest constraint a column takes part in: p > u > f.
const COLUMNS_SQL: &str = "SELECT c.relname, a.attname, t.typname, \
        format_type(a.atttypid, a.atttypmod), \
        NOT a.attnotnull, \
        pg_get_expr(d.adbin, d.adrelid), \
        COALESCE(col_description(c.oid, a.attnum), ''), \
        a.attnum::int4, \
        a.attidentity <> '', \
        COALESCE(( \
            SELECT k.contype::text FROM pg_constraint k \
            WHERE k.conrelid = c.oid AND a.attnum = ANY(k.conkey) AND k.contype IN ('p', 'u', 'f') \
            ORDER BY CASE k.contype WHEN 'p' THEN 0 WHEN 'u' THEN 1 ELSE 2 END \
            LIMIT 1 \
        ), '') \
     FROM pg_attribute a \
     JOIN pg_class c ON c.oid = a.attrelid \
     JOIN pg_namespace n ON n.oid = c.relnamespace \
     JOIN pg_type t ON t.oid = a.atttypid \
     LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
     WHERE n.nspname = $1 AND c.relname = ANY($2) \
       AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY c.relname, a.attnum";

/// Reads table and column metadata from one PostgreSQL schema.
///
/// PostgreSQL does not record table creation time, so `created_at` and
/// `updated_at` are always `None` and creation-range filters are refused.
pub struct PostgresCatalog {
    conn_str: String,
    schema: String,
    statement_timeout: Duration,
}

impl PostgresCatalog {
    pub fn new(conn_str: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            conn_str: conn_str.into(),
            schema: schema.into(),
            statement_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    async fn connect(&self) -> Result<tokio_postgres::Client> {
        let (client, connection) = tokio_postgres::connect(&self.conn_str, NoTls)
            .await
            .map_err(unavailable)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("Catalog connection error: {e}");
            }
        });

        // Set statement timeout to avoid hanging on slow catalog reads
        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout.as_millis()
            ))
            .await
            .map_err(unavailable)?;

        Ok(client)
    }

    async fn columns(
        &self,
        client: &tokio_postgres::Client,
        tables: &[&str],
    ) -> Result<BTreeMap<String, Vec<ColumnDescriptor>>> {
        let tables_param = tables.to_vec();
        let params: &[&(dyn ToSql + Sync)] = &[&self.schema, &tables_param];
        let rows = client
            .query(COLUMNS_SQL, params)
            .await
            .map_err(unavailable)?;

        let mut by_table: BTreeMap<String, Vec<ColumnDescriptor>> = BTreeMap::new();
        for row in rows {
            let table: String = row.get(0);
            let default: Option<String> = row.get(5);
            let identity: bool = row.get(8);
            let contype: String = row.get(9);

            let auto_increment =
                identity || default.as_deref().is_some_and(|d| d.starts_with("nextval("));
            let key = match contype.as_str() {
                "p" => KeyRole::Primary,
                "u" => KeyRole::Unique,
                "f" => KeyRole::Foreign,
                _ => KeyRole::None,
            };

            by_table.entry(table).or_default().push(ColumnDescriptor {
                name: row.get(1),
                data_type: row.get(2),
                column_type: row.get(3),
                nullable: row.get(4),
                default,
                comment: row.get(6),
                key,
                ordinal: row.get(7),
                auto_increment,
            });
        }
        Ok(by_table)
    }
}

fn unavailable(e: tokio_postgres::Error) -> CodegenError {
    CodegenError::CatalogUnavailable(e.to_string())
}

fn summary(row: &tokio_postgres::Row) -> TableSummary {
    TableSummary {
        name: row.get(0),
        comment: row.get(1),
        created_at: None,
        updated_at: None,
    }
}

#[async_trait::async_trait]
impl CatalogSource for PostgresCatalog {
    async fn tables(&self) -> Result<Vec<TableSummary>> {
        let client = self.connect().await?;
        let rows = client
            .query(TABLES_SQL, &[&self.schema])
            .await
            .map_err(unavailable)?;
        Ok(rows.iter().map(summary).collect())
    }

    async fn table(&self, name: &str) -> Result<Option<TableDescriptor>> {
        let client = self.connect().await?;
        let Some(row) = client
            .query_opt(TABLE_SQL, &[&self.schema, &name])
            .await
            .map_err(unavailable)?
        else {
            return Ok(None);
        };

        let summary = summary(&row);
        let columns = self
            .columns(&client, &[name])
            .await?
            .remove(name)
            .unwrap_or_default();

        Ok(Some(TableDescriptor {
            name: summary.name,
            comment: summary.comment,
            created_at: None,
            updated_at: None,
            columns,
        }))
    }

    async fn all_tables(&self) -> Result<Vec<TableDescriptor>> {
        let client = self.connect().await?;
        let rows = client
            .query(TABLES_SQL, &[&self.schema])
            .await
            .map_err(unavailable)?;
        let summaries: Vec<TableSummary> = rows.iter().map(summary).collect();

        let names: Vec<&str> = summaries.iter().map(|t| t.name.as_str()).collect();
        let mut columns = self.columns(&client, &names).await?;

        Ok(summaries
            .into_iter()
            .map(|t| TableDescriptor {
                columns: columns.remove(&t.name).unwrap_or_default(),
                name: t.name,
                comment: t.comment,
                created_at: None,
                updated_at: None,
            })
            .collect())
    }

    fn tracks_creation_time(&self) -> bool {
        false
    }
}
