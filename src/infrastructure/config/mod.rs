//! Hierarchical configuration: programmatic defaults, an optional project
//! YAML file, then the literal recognized environment variables, in that
//! order of increasing priority.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
