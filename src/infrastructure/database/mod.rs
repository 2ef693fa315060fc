//! `SQLite` connection pool bootstrapping and startup migrations. The
//! concrete repository adapters live under `adapters::sqlite`; this module
//! only owns the pool and the migration runner invocation.

pub mod connection;

pub use connection::DatabaseConnection;
