//! Multi-tenant JSON REST gateway over SQLite/LibSQL.
//!
//! A primary local database owns a registry of remote "daughter" databases
//! and a library of schema templates. Every table in the primary or a
//! daughter is reachable through a PostgREST-shaped JSON query surface:
//! nested relation selects compiled to a single SQL statement, a
//! where-composer with a closed operator set, a batch engine with
//! transactional rollback, and an FTS5 controller kept in sync via triggers.
//!
//! # Modules
//!
//! - [`schema`] — table/column/FK model, discovery queries, the shared
//!   read/write-locked cache, and the versioned on-disk snapshot format.
//! - [`query`] — the planner: relation trees, where/order/pagination/
//!   returning/DDL composers.
//! - [`executor`] — binds compiled SQL to a connection.
//! - [`batch`] — transactional multi-operation execution.
//! - [`fts`] — full-text search index lifecycle.
//! - [`tenant`] — the daughter registry, template engine, and remote
//!   provider client.
//! - [`db`] — low-level primary/daughter connection handles.
//! - [`broker`] — routes a request to the right connection.
//! - [`http`] — Axum wiring.

pub mod batch;
pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod fts;
pub mod http;
pub mod query;
pub mod schema;
pub mod tenant;
pub mod validator;

/// Suffix appended to a base table name to derive its FTS5 shadow table
/// (`articles` -> `articles_fts`).
pub const FTS_TABLE_SUFFIX: &str = "_fts";

/// Prefix reserved for the gateway's own bookkeeping tables
/// (`databases`, `templates`). User tables may never start with it.
pub const INTERNAL_TABLE_PREFIX: &str = "__gateway_";

pub use broker::{AcquiredConnection, ConnectionBroker};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use executor::QueryExecutor;
pub use schema::{SchemaCache, SchemaSnapshot};
