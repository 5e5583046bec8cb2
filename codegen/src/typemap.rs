//! Column classification: raw catalog type → form / validation / filter kinds.
//!
//! The rule table is the only place type names are interpreted. Everything the
//! configuration UI can choose from is enumerated by [`column_options`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Character columns up to this length get a single-line input.
pub const CHAR_LENGTH_THRESHOLD: u32 = 255;

// ---------- option enumerations ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormMode {
    Text,
    Textarea,
    Number,
    Switch,
    Select,
    Radio,
    Checkbox,
    Date,
    Time,
    Datetime,
    Upload,
    Editor,
    Readonly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    None,
    Required,
    MaxLength,
    Integer,
    Decimal,
    Email,
    Phone,
    Url,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhereMode {
    None,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Between,
    In,
}

/// `{label, value}` pair as consumed by option pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionItem {
    pub label: &'static str,
    pub value: &'static str,
}

/// A closed set of choices exposed verbatim to the configuration UI.
pub trait OptionSet: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn value(self) -> &'static str;
    fn label(self) -> &'static str;

    fn items() -> Vec<OptionItem> {
        Self::ALL
            .iter()
            .map(|m| OptionItem {
                label: m.label(),
                value: m.value(),
            })
            .collect()
    }
}

impl OptionSet for FormMode {
    const ALL: &'static [Self] = &[
        Self::Text,
        Self::Textarea,
        Self::Number,
        Self::Switch,
        Self::Select,
        Self::Radio,
        Self::Checkbox,
        Self::Date,
        Self::Time,
        Self::Datetime,
        Self::Upload,
        Self::Editor,
        Self::Readonly,
    ];

    fn value(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Switch => "switch",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Time => "time",
            Self::Datetime => "datetime",
            Self::Upload => "upload",
            Self::Editor => "editor",
            Self::Readonly => "readonly",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Text => "Text input",
            Self::Textarea => "Text area",
            Self::Number => "Number input",
            Self::Switch => "Switch",
            Self::Select => "Select",
            Self::Radio => "Radio group",
            Self::Checkbox => "Checkbox group",
            Self::Date => "Date picker",
            Self::Time => "Time picker",
            Self::Datetime => "Date-time picker",
            Self::Upload => "File upload",
            Self::Editor => "Rich text editor",
            Self::Readonly => "Read only",
        }
    }
}

impl OptionSet for ValidationMode {
    const ALL: &'static [Self] = &[
        Self::None,
        Self::Required,
        Self::MaxLength,
        Self::Integer,
        Self::Decimal,
        Self::Email,
        Self::Phone,
        Self::Url,
        Self::Date,
    ];

    fn value(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Required => "required",
            Self::MaxLength => "maxLength",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Date => "date",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::None => "No validation",
            Self::Required => "Required",
            Self::MaxLength => "Maximum length",
            Self::Integer => "Integer",
            Self::Decimal => "Decimal number",
            Self::Email => "Email address",
            Self::Phone => "Phone number",
            Self::Url => "URL",
            Self::Date => "Date",
        }
    }
}

impl OptionSet for WhereMode {
    const ALL: &'static [Self] = &[
        Self::None,
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Like,
        Self::Between,
        Self::In,
    ];

    fn value(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Between => "between",
            Self::In => "in",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::None => "Not filterable",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::Between => "BETWEEN",
            Self::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOptions {
    pub form_modes: Vec<OptionItem>,
    pub form_validations: Vec<OptionItem>,
    pub where_modes: Vec<OptionItem>,
}

pub fn column_options() -> ColumnOptions {
    ColumnOptions {
        form_modes: FormMode::items(),
        form_validations: ValidationMode::items(),
        where_modes: WhereMode::items(),
    }
}

// ---------- type rules ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFamily {
    Integer,
    BigInteger,
    Decimal,
    Float,
    Boolean,
    Char,
    Text,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Json,
    Uuid,
    Binary,
}

impl TypeFamily {
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::DateTime | Self::DateTimeTz
        )
    }
}

struct TypeRule {
    family: TypeFamily,
    names: &'static [&'static str],
}

static TYPE_RULES: OnceLock<Vec<TypeRule>> = OnceLock::new();

fn type_rules() -> &'static [TypeRule] {
    TYPE_RULES.get_or_init(|| {
        use TypeFamily::*;
        vec![
            TypeRule {
                family: Integer,
                names: &[
                    "smallint", "int2", "integer", "int", "int4", "tinyint", "mediumint",
                    "serial", "serial2", "serial4", "smallserial", "year",
                ],
            },
            TypeRule {
                family: BigInteger,
                names: &["bigint", "int8", "bigserial", "serial8"],
            },
            TypeRule {
                family: Decimal,
                names: &["numeric", "decimal", "money"],
            },
            TypeRule {
                family: Float,
                names: &["real", "float4", "float8", "double precision", "double", "float"],
            },
            TypeRule {
                family: Boolean,
                names: &["boolean", "bool"],
            },
            TypeRule {
                family: Char,
                names: &[
                    "character varying", "varchar", "character", "char", "bpchar", "nvarchar",
                    "nchar",
                ],
            },
            TypeRule {
                family: Text,
                names: &["text", "tinytext", "mediumtext", "longtext", "citext", "xml"],
            },
            TypeRule {
                family: Date,
                names: &["date"],
            },
            TypeRule {
                family: Time,
                names: &[
                    "time", "time without time zone", "time with time zone", "timetz",
                ],
            },
            TypeRule {
                family: DateTime,
                names: &["timestamp", "timestamp without time zone", "datetime"],
            },
            TypeRule {
                family: DateTimeTz,
                names: &["timestamp with time zone", "timestamptz"],
            },
            TypeRule {
                family: Json,
                names: &["json", "jsonb"],
            },
            TypeRule {
                family: Uuid,
                names: &["uuid"],
            },
            TypeRule {
                family: Binary,
                names: &[
                    "bytea", "blob", "tinyblob", "mediumblob", "longblob", "binary", "varbinary",
                ],
            },
        ]
    })
}

/// A raw type string resolved against the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub name: String,
    pub family: TypeFamily,
    pub length: Option<u32>,
    pub scale: Option<u32>,
}

static RAW_TYPE: OnceLock<Regex> = OnceLock::new();

fn raw_type_pattern() -> &'static Regex {
    RAW_TYPE.get_or_init(|| {
        Regex::new(
            r"^(?P<base>[a-z][a-z0-9_ ]*?)\s*(?:\(\s*(?P<len>\d+)\s*(?:,\s*(?P<scale>\d+)\s*)?\)(?P<suffix>[a-z ]*))?$",
        )
        .expect("raw type pattern compiles")
    })
}

/// Parses `character varying(64)`, `int(11) unsigned`, `timestamp(6) without time zone`, ...
/// Arrays, enums and unknown names yield `None`.
pub fn parse_type(raw_type: &str) -> Option<ParsedType> {
    let lowered = raw_type.trim().to_ascii_lowercase();
    let cleaned = lowered.replace(" unsigned", "").replace(" zerofill", "");
    let caps = raw_type_pattern().captures(cleaned.trim())?;

    let base = caps.name("base").map_or("", |m| m.as_str());
    let suffix = caps.name("suffix").map_or("", |m| m.as_str());
    let name = format!("{base} {suffix}")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let family = type_rules()
        .iter()
        .find(|r| r.names.contains(&name.as_str()))?
        .family;

    let mut length = caps.name("len").and_then(|m| m.as_str().parse().ok());
    let scale = caps.name("scale").and_then(|m| m.as_str().parse().ok());

    // Fixed-width char without an explicit length is char(1).
    if family == TypeFamily::Char
        && length.is_none()
        && matches!(name.as_str(), "character" | "char" | "bpchar" | "nchar")
    {
        length = Some(1);
    }

    Some(ParsedType {
        name,
        family,
        length,
        scale,
    })
}

// ---------- classification ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub form_mode: FormMode,
    pub validation_mode: ValidationMode,
    pub where_mode: WhereMode,
}

/// Default modes for a column, or `None` when the type is not in the rule table.
pub fn classify(raw_type: &str, is_primary_key: bool, is_nullable: bool) -> Option<Classification> {
    let parsed = parse_type(raw_type)?;
    let required_or = |fallback| {
        if is_nullable {
            fallback
        } else {
            ValidationMode::Required
        }
    };

    let (form_mode, validation_mode, where_mode) = match parsed.family {
        TypeFamily::Integer | TypeFamily::BigInteger => (
            FormMode::Number,
            required_or(ValidationMode::Integer),
            WhereMode::Eq,
        ),
        TypeFamily::Decimal | TypeFamily::Float => (
            FormMode::Number,
            required_or(ValidationMode::Decimal),
            WhereMode::Eq,
        ),
        TypeFamily::Boolean => (FormMode::Switch, ValidationMode::None, WhereMode::Eq),
        TypeFamily::Char => match parsed.length {
            Some(len) if len <= CHAR_LENGTH_THRESHOLD => {
                (FormMode::Text, ValidationMode::MaxLength, WhereMode::Like)
            }
            _ => (
                FormMode::Textarea,
                required_or(ValidationMode::None),
                WhereMode::None,
            ),
        },
        TypeFamily::Text => (
            FormMode::Textarea,
            required_or(ValidationMode::None),
            WhereMode::None,
        ),
        TypeFamily::Date => (
            FormMode::Date,
            required_or(ValidationMode::Date),
            WhereMode::Between,
        ),
        TypeFamily::Time => (
            FormMode::Time,
            required_or(ValidationMode::None),
            WhereMode::Between,
        ),
        TypeFamily::DateTime | TypeFamily::DateTimeTz => (
            FormMode::Datetime,
            required_or(ValidationMode::Date),
            WhereMode::Between,
        ),
        TypeFamily::Json => (FormMode::Textarea, ValidationMode::None, WhereMode::None),
        TypeFamily::Uuid => (FormMode::Text, required_or(ValidationMode::None), WhereMode::Eq),
        TypeFamily::Binary => (FormMode::Upload, ValidationMode::None, WhereMode::None),
    };

    if is_primary_key {
        return Some(Classification {
            form_mode: FormMode::Readonly,
            validation_mode: ValidationMode::None,
            where_mode,
        });
    }

    Some(Classification {
        form_mode,
        validation_mode,
        where_mode,
    })
}

/// Field type used in generated sea-orm entities.
pub fn rust_type(family: TypeFamily) -> &'static str {
    match family {
        TypeFamily::Integer => "i32",
        TypeFamily::BigInteger => "i64",
        TypeFamily::Decimal => "Decimal",
        TypeFamily::Float => "f64",
        TypeFamily::Boolean => "bool",
        TypeFamily::Char | TypeFamily::Text => "String",
        TypeFamily::Date => "Date",
        TypeFamily::Time => "Time",
        TypeFamily::DateTime => "DateTime",
        TypeFamily::DateTimeTz => "DateTimeWithTimeZone",
        TypeFamily::Json => "Json",
        TypeFamily::Uuid => "Uuid",
        TypeFamily::Binary => "Vec<u8>",
    }
}

/// Field type used in generated TypeScript API bindings.
pub fn ts_type(family: TypeFamily) -> &'static str {
    match family {
        TypeFamily::Integer | TypeFamily::BigInteger | TypeFamily::Float => "number",
        // numeric travels as a string to keep precision
        TypeFamily::Decimal => "string",
        TypeFamily::Boolean => "boolean",
        TypeFamily::Json => "unknown",
        _ => "string",
    }
}
