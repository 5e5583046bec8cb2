//! Turns a table snapshot plus a generation config into source files.

use convert_case::{Case, Casing};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::catalog::{ColumnDescriptor, KeyRole, TableDescriptor};
use crate::error::{CodegenError, Result};
use crate::record::{GenerationConfig, TableOptions};
use crate::typemap::{self, FormMode, OptionSet, WhereMode};

/// Columns maintained by the database or the ORM, never edited by hand.
pub const AUDIT_COLUMNS: &[&str] = &["created_at", "updated_at", "deleted_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Entity,
    Dao,
    Service,
    Handler,
    UiApi,
    UiTypes,
    UiRule,
    UiHook,
    UiForm,
    UiIndex,
}

/// Every render produces these artifacts, in this order. The `Ui*` kinds are
/// skipped when the table's `sync` option is off.
pub const ARTIFACT_KINDS: [ArtifactKind; 10] = [
    ArtifactKind::Entity,
    ArtifactKind::Dao,
    ArtifactKind::Service,
    ArtifactKind::Handler,
    ArtifactKind::UiApi,
    ArtifactKind::UiTypes,
    ArtifactKind::UiRule,
    ArtifactKind::UiHook,
    ArtifactKind::UiForm,
    ArtifactKind::UiIndex,
];

impl ArtifactKind {
    pub fn is_web(self) -> bool {
        !matches!(
            self,
            ArtifactKind::Entity | ArtifactKind::Dao | ArtifactKind::Service | ArtifactKind::Handler
        )
    }

    fn template_name(self) -> &'static str {
        match self {
            ArtifactKind::Entity => "entity.rs",
            ArtifactKind::Dao => "dao.rs",
            ArtifactKind::Service => "service.rs",
            ArtifactKind::Handler => "handler.rs",
            ArtifactKind::UiApi => "api.ts",
            ArtifactKind::UiTypes => "types.ts",
            ArtifactKind::UiRule => "rule.ts",
            ArtifactKind::UiHook => "hook.tsx",
            ArtifactKind::UiForm => "form.vue",
            ArtifactKind::UiIndex => "index.vue",
        }
    }

    fn source(self) -> &'static str {
        match self {
            ArtifactKind::Entity => include_str!("../../templates/entity.rs.jinja"),
            ArtifactKind::Dao => include_str!("../../templates/dao.rs.jinja"),
            ArtifactKind::Service => include_str!("../../templates/service.rs.jinja"),
            ArtifactKind::Handler => include_str!("../../templates/handler.rs.jinja"),
            ArtifactKind::UiApi => include_str!("../../templates/api.ts.jinja"),
            ArtifactKind::UiTypes => include_str!("../../templates/types.ts.jinja"),
            ArtifactKind::UiRule => include_str!("../../templates/rule.ts.jinja"),
            ArtifactKind::UiHook => include_str!("../../templates/hook.tsx.jinja"),
            ArtifactKind::UiForm => include_str!("../../templates/form.vue.jinja"),
            ArtifactKind::UiIndex => include_str!("../../templates/index.vue.jinja"),
        }
    }

    fn relative_path(self, names: &Names) -> String {
        let views = format!("web/src/views/{}", names.package);
        match self {
            ArtifactKind::Entity => format!("src/entity/{}.rs", names.table),
            ArtifactKind::Dao => format!("src/dao/{}.rs", names.module),
            ArtifactKind::Service => format!("src/service/{}.rs", names.module),
            ArtifactKind::Handler => format!("src/api/{}.rs", names.module),
            ArtifactKind::UiApi => format!("web/src/api/{}.ts", names.module),
            ArtifactKind::UiTypes => format!("{views}/utils/types.ts"),
            ArtifactKind::UiRule => format!("{views}/utils/rule.ts"),
            ArtifactKind::UiHook => format!("{views}/utils/hook.tsx"),
            ArtifactKind::UiForm => format!("{views}/form/index.vue"),
            ArtifactKind::UiIndex => format!("{views}/index.vue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub relative_path: String,
    pub content: String,
}

// ---------- rendering context ----------

#[derive(Debug, Clone, Serialize)]
struct Names {
    table: String,
    module: String,
    /// Directory under `web/src/views`
    package: String,
    entity: String,
    camel: String,
    kebab: String,
    /// REST path segment the handler mounts under
    business: String,
    function_name: String,
    /// Rust string literal for the service's not-found message
    not_found_lit: String,
}

impl Names {
    fn new(table: &TableDescriptor, config: &GenerationConfig) -> Self {
        let module = if config.module_name.is_empty() {
            crate::record::module_name_for(&table.name)
        } else {
            config.module_name.to_case(Case::Snake)
        };
        let package = if config.package_name.is_empty() {
            module.clone()
        } else {
            config.package_name.to_case(Case::Snake)
        };
        let business = if config.business_name.is_empty() {
            module.to_case(Case::Kebab)
        } else {
            config.business_name.to_case(Case::Kebab)
        };
        let function_name = if config.function_name.is_empty() {
            module.to_case(Case::Title)
        } else {
            one_line(&config.function_name)
        };
        Self {
            not_found_lit: format!("{:?}", format!("{function_name} not found")),
            table: table.name.clone(),
            entity: module.to_case(Case::Pascal),
            camel: module.to_case(Case::Camel),
            kebab: module.to_case(Case::Kebab),
            module,
            package,
            business,
            function_name,
        }
    }
}

/// Effective operations after the table-level CRUD switch.
#[derive(Debug, Clone, Serialize)]
struct Ops {
    create: bool,
    update: bool,
    delete: bool,
    batch_delete: bool,
    list: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ResolvedColumn {
    name: String,
    /// Rust identifier, raw when the name is a keyword
    field: String,
    plain: String,
    pascal: String,
    camel: String,
    kebab: String,
    label: String,
    /// Rust string literal form of `label`
    label_lit: String,
    comment: String,
    column_type: String,
    ordinal: i32,
    rust_type: &'static str,
    field_type: String,
    ts_type: &'static str,
    nullable: bool,
    primary_key: bool,
    foreign_key: bool,
    is_unique: bool,
    auto_increment: bool,
    is_string: bool,
    max_length: Option<u32>,
    form_mode: &'static str,
    validation_mode: &'static str,
    validation_label: &'static str,
    where_mode: &'static str,
    where_op: Option<&'static str>,
    editable: bool,
    visible_in_list: bool,
    /// Dictionary the form loads options from; empty for none
    dict_type: String,
}

#[derive(Debug, Serialize)]
struct TableView {
    name: String,
    comment: String,
}

#[derive(Debug, Serialize)]
struct RenderContext<'a> {
    table: TableView,
    table_name: &'a str,
    names: Names,
    author: String,
    email: String,
    remark: String,
    options: &'a TableOptions,
    ops: Ops,
    columns: Vec<ResolvedColumn>,
    list_columns: Vec<ResolvedColumn>,
    form_columns: Vec<ResolvedColumn>,
    query_columns: Vec<ResolvedColumn>,
    /// Form columns checked for duplicates on write; empty without a key
    unique_columns: Vec<ResolvedColumn>,
    /// Foreign keys of a sub-table, each with a lookup by parent
    parent_keys: Vec<ResolvedColumn>,
    /// Distinct dictionaries the form loads, sorted
    dict_types: Vec<String>,
    pk: Option<ResolvedColumn>,
    tree_parent: Option<ResolvedColumn>,
    /// `sea_orm::prelude` types the columns need beyond std
    type_imports: Vec<&'static str>,
}

const PRELUDE_TYPES: &[&str] = &[
    "Date",
    "DateTime",
    "DateTimeWithTimeZone",
    "Decimal",
    "Json",
    "Time",
    "Uuid",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while",
];

/// Collapses text that lands in line comments or string literals onto one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_column(c: &ColumnDescriptor, config: &GenerationConfig) -> Result<ResolvedColumn> {
    let parsed = c.parsed_type();
    let unique_key = c.key == KeyRole::Unique;
    let (form_mode, validation_mode, where_mode, visible_in_list, dict_type, is_unique) =
        match (config.override_for(&c.name), c.classification()) {
            (Some(o), _) => (
                o.form_mode,
                o.validation_mode,
                o.where_mode,
                o.visible_in_list,
                dict_name(&o.dict_type),
                o.is_unique || unique_key,
            ),
            (None, Some(d)) => (
                d.form_mode,
                d.validation_mode,
                d.where_mode,
                true,
                String::new(),
                unique_key,
            ),
            (None, None) => {
                return Err(CodegenError::UnsupportedType {
                    column: c.name.clone(),
                    raw_type: c.column_type.clone(),
                });
            }
        };

    // An override can vouch for a type the rule table does not know; it is
    // carried as text.
    let family = parsed.as_ref().map(|p| p.family);
    let rust_type = family.map_or("String", typemap::rust_type);
    let ts_type = family.map_or("string", typemap::ts_type);
    let is_string = rust_type == "String";

    let plain = c.name.to_case(Case::Snake);
    let field = if RUST_KEYWORDS.contains(&plain.as_str()) {
        format!("r#{plain}")
    } else {
        plain.clone()
    };
    let field_type = if c.nullable && !c.is_primary_key() {
        format!("Option<{rust_type}>")
    } else {
        rust_type.to_string()
    };

    let where_op = match where_mode {
        WhereMode::Eq => Some("eq"),
        WhereMode::Ne => Some("ne"),
        WhereMode::Gt => Some("gt"),
        WhereMode::Gte => Some("gte"),
        WhereMode::Lt => Some("lt"),
        WhereMode::Lte => Some("lte"),
        _ => None,
    };

    let comment = one_line(&c.comment);
    let label = if comment.is_empty() {
        c.name.to_case(Case::Title)
    } else {
        comment.clone()
    };

    Ok(ResolvedColumn {
        label_lit: format!("{label:?}"),
        label,
        pascal: c.name.to_case(Case::Pascal),
        camel: c.name.to_case(Case::Camel),
        kebab: c.name.to_case(Case::Kebab),
        name: c.name.clone(),
        field,
        plain,
        comment,
        column_type: c.column_type.clone(),
        ordinal: c.ordinal,
        rust_type,
        field_type,
        ts_type,
        nullable: c.nullable,
        primary_key: c.is_primary_key(),
        foreign_key: c.key == KeyRole::Foreign,
        is_unique,
        auto_increment: c.auto_increment,
        is_string,
        max_length: parsed.and_then(|p| p.length),
        form_mode: form_mode.value(),
        validation_mode: validation_mode.value(),
        validation_label: validation_mode.label(),
        where_mode: where_mode.value(),
        where_op,
        editable: form_mode != FormMode::Readonly && !AUDIT_COLUMNS.contains(&c.name.as_str()),
        visible_in_list,
        dict_type,
    })
}

/// Dictionary names end up in URLs and quoted attributes; keep the safe subset.
fn dict_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

/// Resolves every column in ordinal order, failing on the first one that has
/// neither a type classification nor an override.
fn resolve_columns(table: &TableDescriptor, config: &GenerationConfig) -> Result<Vec<ResolvedColumn>> {
    let mut ordered: Vec<&ColumnDescriptor> = table.columns.iter().collect();
    ordered.sort_by_key(|c| c.ordinal);
    ordered
        .into_iter()
        .map(|c| resolve_column(c, config))
        .collect()
}

fn tree_parent(columns: &[ResolvedColumn], options: &TableOptions) -> Option<ResolvedColumn> {
    if !options.tree {
        return None;
    }
    let wanted = if options.tree_parent_code {
        "parent_code"
    } else {
        "parent_id"
    };
    columns.iter().find(|c| c.name == wanted).cloned()
}

// ---------- renderer ----------

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        for kind in ARTIFACT_KINDS {
            env.add_template(kind.template_name(), kind.source())?;
        }
        Ok(Self { env })
    }

    /// Renders every artifact kind the options ask for. Output depends only on
    /// the inputs.
    pub fn render(&self, table: &TableDescriptor, config: &GenerationConfig) -> Result<Vec<Artifact>> {
        let columns = resolve_columns(table, config)?;
        let names = Names::new(table, config);
        let crud = config.options.crud;
        let ops = Ops {
            create: crud && config.operations.create,
            update: crud && config.operations.update,
            delete: crud && config.operations.delete,
            batch_delete: crud && config.operations.batch_delete,
            list: config.operations.list,
        };

        let mut type_imports: Vec<&'static str> = columns
            .iter()
            .map(|c| c.rust_type)
            .filter(|t| PRELUDE_TYPES.contains(t))
            .collect();
        type_imports.sort_unstable();
        type_imports.dedup();

        let pk = columns.iter().find(|c| c.primary_key).cloned();
        let form_columns: Vec<ResolvedColumn> = columns.iter().filter(|c| c.editable).cloned().collect();
        let unique_columns: Vec<ResolvedColumn> = if pk.is_some() {
            form_columns.iter().filter(|c| c.is_unique).cloned().collect()
        } else {
            Vec::new()
        };
        let parent_keys: Vec<ResolvedColumn> = if config.options.sub_table {
            columns.iter().filter(|c| c.foreign_key && !c.primary_key).cloned().collect()
        } else {
            Vec::new()
        };
        let mut dict_types: Vec<String> = form_columns
            .iter()
            .filter(|c| !c.dict_type.is_empty())
            .map(|c| c.dict_type.clone())
            .collect();
        dict_types.sort_unstable();
        dict_types.dedup();

        let ctx = RenderContext {
            table: TableView {
                name: table.name.clone(),
                comment: one_line(&table.comment),
            },
            table_name: &table.name,
            author: one_line(&config.author),
            email: one_line(&config.email),
            remark: one_line(&config.remark),
            options: &config.options,
            ops,
            list_columns: columns.iter().filter(|c| c.visible_in_list).cloned().collect(),
            form_columns,
            unique_columns,
            parent_keys,
            dict_types,
            query_columns: columns
                .iter()
                .filter(|c| c.where_mode != WhereMode::None.value())
                .cloned()
                .collect(),
            pk,
            tree_parent: tree_parent(&columns, &config.options),
            type_imports,
            columns,
            names,
        };

        let mut artifacts = Vec::with_capacity(ARTIFACT_KINDS.len());
        for kind in ARTIFACT_KINDS {
            if kind.is_web() && !config.options.sync {
                continue;
            }
            let content = self.env.get_template(kind.template_name())?.render(&ctx)?;
            artifacts.push(Artifact {
                kind,
                relative_path: kind.relative_path(&ctx.names),
                content,
            });
        }

        tracing::debug!(table = %table.name, files = artifacts.len(), "Rendered artifacts");
        Ok(artifacts)
    }
}
