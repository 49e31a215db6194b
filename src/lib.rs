//! Incubator admin: schema-adaptive data access and REST API over PostgreSQL.

pub mod config;
pub mod deadline;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;

pub use config::AdminConfig;
pub use deadline::Deadline;
pub use error::{AppError, ConfigError};
pub use routes::{admin_routes, app, common_routes};
pub use state::AppState;
