//! Schema-driven code generation console
//!
//! Introspects a database catalog, keeps per-table generation settings, renders
//! source artifacts from them, and offers guarded ad hoc SQL.

pub mod admin;
pub mod artifact;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod generator;
pub mod pagination;
pub mod record;
pub mod render;
pub mod sql;
pub mod typemap;
