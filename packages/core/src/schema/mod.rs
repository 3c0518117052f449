pub mod blob;
pub mod cache;
pub mod discoverer;
pub mod model;

pub use cache::SchemaCache;
pub use discoverer::discover_schema;
pub use model::{Column, ColumnType, DefaultValue, ForeignKey, SchemaSnapshot, Table};
