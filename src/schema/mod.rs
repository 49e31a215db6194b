//! Live-schema discovery: catalog lookups, cached column sets, per-entity layouts.

pub mod catalog;
pub mod layout;
pub mod resolver;

pub use catalog::{Column, ColumnCatalog, PgCatalog};
pub use layout::*;
pub use resolver::{SchemaCache, SchemaResolver, TableColumns};
