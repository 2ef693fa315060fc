//! Adapters implementing the domain's repository and code-tools ports.

pub mod codetools;
pub mod sqlite;
