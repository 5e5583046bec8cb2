//! Process settings, read from `CG_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub admin_database_url: String,
    pub bind_addr: String,
    /// Database whose catalog is introspected and where ad hoc SQL runs.
    pub catalog_url: Option<String>,
    pub catalog_schema: String,
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: u64,
    pub cors_allowed_origins: Vec<String>,
    pub artifact_root: PathBuf,
    pub sql_timeout: Duration,
    pub sql_allow_destructive: bool,
    pub synth_url: Option<String>,
    pub synth_timeout: Duration,
    pub admin_ui_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| non_empty(key).unwrap_or_else(|| default.to_string());
        // A zero timeout would fail every call, so it counts as invalid.
        let secs = |key: &str, default: u64| {
            let parsed = non_empty(key).map(|v| v.trim().parse::<u64>().ok().filter(|n| *n > 0));
            if let Some(None) = parsed {
                tracing::warn!(key, default_secs = default, "Ignoring invalid timeout");
            }
            Duration::from_secs(parsed.flatten().unwrap_or(default))
        };

        Self {
            admin_database_url: or("CG_ADMIN_DATABASE_URL", "sqlite://codegen_admin.db?mode=rwc"),
            bind_addr: or("CG_BIND_ADDR", "127.0.0.1:5435"),
            catalog_url: non_empty("CG_CATALOG_URL"),
            catalog_schema: or("CG_CATALOG_SCHEMA", "public"),
            jwt_secret: non_empty("CG_JWT_SECRET"),
            jwt_expiry_hours: non_empty("CG_JWT_EXPIRY_HOURS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(24),
            cors_allowed_origins: get("CG_CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            artifact_root: PathBuf::from(or("CG_ARTIFACT_ROOT", "./generated")),
            sql_timeout: secs("CG_SQL_TIMEOUT_SECS", 30),
            sql_allow_destructive: non_empty("CG_SQL_ALLOW_DESTRUCTIVE")
                .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
            synth_url: non_empty("CG_SYNTH_URL"),
            synth_timeout: secs("CG_SYNTH_TIMEOUT_SECS", 60),
            admin_ui_dir: PathBuf::from(or("CG_ADMIN_UI_DIR", "/usr/local/share/admin-ui")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.admin_database_url, "sqlite://codegen_admin.db?mode=rwc");
        assert_eq!(s.bind_addr, "127.0.0.1:5435");
        assert_eq!(s.catalog_schema, "public");
        assert_eq!(s.catalog_url, None);
        assert_eq!(s.sql_timeout, Duration::from_secs(30));
        assert_eq!(s.synth_timeout, Duration::from_secs(60));
        assert!(!s.sql_allow_destructive);
        assert!(s.cors_allowed_origins.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("CG_CATALOG_URL", "postgres://u:p@db/app"),
            ("CG_SQL_TIMEOUT_SECS", "5"),
            ("CG_SQL_ALLOW_DESTRUCTIVE", "true"),
            ("CG_CORS_ALLOWED_ORIGINS", "http://a.test, ,http://b.test"),
            ("CG_ARTIFACT_ROOT", "/srv/out"),
        ]);
        assert_eq!(s.catalog_url.as_deref(), Some("postgres://u:p@db/app"));
        assert_eq!(s.sql_timeout, Duration::from_secs(5));
        assert!(s.sql_allow_destructive);
        assert_eq!(s.cors_allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(s.artifact_root, PathBuf::from("/srv/out"));
    }

    #[test]
    fn blank_and_invalid_values_fall_back() {
        let s = settings(&[("CG_JWT_SECRET", "  "), ("CG_SQL_TIMEOUT_SECS", "soon")]);
        assert_eq!(s.jwt_secret, None);
        assert_eq!(s.sql_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let s = settings(&[("CG_SQL_TIMEOUT_SECS", "0"), ("CG_SYNTH_TIMEOUT_SECS", " 0 ")]);
        assert_eq!(s.sql_timeout, Duration::from_secs(30));
        assert_eq!(s.synth_timeout, Duration::from_secs(60));
    }
}
