//! Infrastructure layer: process-wide ambient concerns (database connection
//! bootstrapping, configuration loading, structured logging) that sit below
//! the domain/services/adapters split because every entrypoint needs them
//! before a `Coordinator` can be built.

pub mod config;
pub mod database;
pub mod logging;

pub use config::ConfigLoader;
pub use database::DatabaseConnection;
