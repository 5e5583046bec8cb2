//! Generation records: the saved configuration for one table plus the column
//! snapshot it was saved against.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::catalog::{ColumnDescriptor, TableDescriptor};
use crate::typemap::{FormMode, ValidationMode, WhereMode};

pub mod store;

pub use store::RecordStore;

const TABLE_PREFIXES: &[&str] = &["tbl_", "tb_", "t_"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOptions {
    pub tree: bool,
    pub tree_parent_code: bool,
    /// Render the web client together with the server code.
    pub sync: bool,
    /// Child table: every foreign-key column gets a lookup by parent.
    pub sub_table: bool,
    pub crud: bool,
    pub rest: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            tree: false,
            tree_parent_code: false,
            sync: true,
            sub_table: false,
            crud: true,
            rest: true,
        }
    }
}

/// Which handler operations get generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operations {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub batch_delete: bool,
    pub list: bool,
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
            batch_delete: true,
            list: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOverride {
    pub column: String,
    pub form_mode: FormMode,
    pub validation_mode: ValidationMode,
    pub where_mode: WhereMode,
    #[serde(default = "visible")]
    pub visible_in_list: bool,
    /// Dictionary feeding a select, radio or checkbox input.
    #[serde(default)]
    pub dict_type: String,
    #[serde(default)]
    pub is_unique: bool,
}

impl ColumnOverride {
    pub fn new(
        column: impl Into<String>,
        form_mode: FormMode,
        validation_mode: ValidationMode,
        where_mode: WhereMode,
    ) -> Self {
        Self {
            column: column.into(),
            form_mode,
            validation_mode,
            where_mode,
            visible_in_list: true,
            dict_type: String::new(),
            is_unique: false,
        }
    }
}

fn visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub table_name: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub gen_path: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub options: TableOptions,
    #[serde(default)]
    pub operations: Operations,
    #[serde(default)]
    pub overrides: Vec<ColumnOverride>,
}

impl GenerationConfig {
    /// The configuration an import starts from.
    pub fn defaults_for(table: &TableDescriptor, author: &str) -> Self {
        let module = module_name_for(&table.name);
        let function_name = if table.comment.is_empty() {
            module.clone()
        } else {
            table.comment.clone()
        };
        Self {
            table_name: table.name.clone(),
            package_name: module.clone(),
            module_name: module.clone(),
            business_name: module,
            function_name,
            author: author.to_string(),
            email: String::new(),
            gen_path: String::new(),
            remark: String::new(),
            options: TableOptions::default(),
            operations: Operations::default(),
            overrides: Vec::new(),
        }
    }

    pub fn override_for(&self, column: &str) -> Option<&ColumnOverride> {
        self.overrides.iter().find(|o| o.column == column)
    }

    /// Drops overrides naming columns absent from `columns`; returns their names.
    pub fn prune_overrides(&mut self, columns: &[ColumnDescriptor]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.overrides.retain(|o| {
            let known = columns.iter().any(|c| c.name == o.column);
            if !known {
                dropped.push(o.column.clone());
            }
            known
        });
        if !dropped.is_empty() {
            tracing::warn!(
                table = %self.table_name,
                columns = ?dropped,
                "Dropped overrides for columns no longer in the table"
            );
        }
        dropped
    }
}

/// `t_order_item` → `order_item`
pub fn module_name_for(table_name: &str) -> String {
    let lowered = table_name.to_lowercase();
    TABLE_PREFIXES
        .iter()
        .find_map(|p| lowered.strip_prefix(p).filter(|rest| !rest.is_empty()))
        .unwrap_or(&lowered)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Generated,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Generated => "generated",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "generated" => Ok(RecordStatus::Generated),
            other => Err(format!("unknown record status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: i32,
    pub table_name: String,
    pub table_comment: String,
    pub config: GenerationConfig,
    pub snapshot: Vec<ColumnDescriptor>,
    pub status: RecordStatus,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl GenerationRecord {
    /// The frozen table this record renders against.
    pub fn table(&self) -> TableDescriptor {
        TableDescriptor {
            name: self.table_name.clone(),
            comment: self.table_comment.clone(),
            created_at: None,
            updated_at: None,
            columns: self.snapshot.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: i32,
    pub table_name: String,
    pub table_comment: String,
    pub package_name: String,
    pub module_name: String,
    pub status: RecordStatus,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub table_name: Option<String>,
    pub table_comment: Option<String>,
    pub created_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub status: Option<RecordStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{column, orders};

    #[test]
    fn module_name_strips_known_prefixes() {
        assert_eq!(module_name_for("t_order_item"), "order_item");
        assert_eq!(module_name_for("tb_user"), "user");
        assert_eq!(module_name_for("TBL_Dept"), "dept");
        assert_eq!(module_name_for("orders"), "orders");
        assert_eq!(module_name_for("t_"), "t_");
    }

    #[test]
    fn defaults_use_comment_as_function_name() {
        let cfg = GenerationConfig::defaults_for(&orders(), "alice");
        assert_eq!(cfg.module_name, "orders");
        assert_eq!(cfg.function_name, "Customer orders");
        assert_eq!(cfg.author, "alice");
        assert!(cfg.options.crud && cfg.options.rest);
        assert!(cfg.overrides.is_empty());
    }

    #[test]
    fn prune_drops_only_unknown_columns() {
        let mut cfg = GenerationConfig::defaults_for(&orders(), "alice");
        for name in ["customer_name", "legacy_code"] {
            cfg.overrides.push(ColumnOverride::new(
                name,
                FormMode::Textarea,
                ValidationMode::None,
                WhereMode::Eq,
            ));
        }
        let dropped = cfg.prune_overrides(&[column("customer_name", "varchar(64)", 2)]);
        assert_eq!(dropped, vec!["legacy_code".to_string()]);
        assert_eq!(cfg.overrides.len(), 1);
        assert!(cfg.override_for("customer_name").is_some());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: GenerationConfig = serde_json::from_value(serde_json::json!({
            "tableName": "orders",
            "overrides": [{
                "column": "customer_name",
                "formMode": "textarea",
                "validationMode": "required",
                "whereMode": "eq"
            }]
        }))
        .unwrap();
        assert_eq!(cfg.options, TableOptions::default());
        assert_eq!(cfg.operations, Operations::default());
        assert!(cfg.overrides[0].visible_in_list);
        assert!(cfg.overrides[0].dict_type.is_empty());
        assert!(!cfg.overrides[0].is_unique);
        assert!(cfg.options.sync);
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [RecordStatus::Pending, RecordStatus::Generated] {
            assert_eq!(s.as_str().parse::<RecordStatus>().unwrap(), s);
        }
        assert!("done".parse::<RecordStatus>().is_err());
    }
}
