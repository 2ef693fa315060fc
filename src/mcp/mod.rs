//! JSON-RPC 2.0 tool surface: the MCP stdio/HTTP transport dispatches
//! newline-delimited requests to [`dispatcher::Dispatcher`], which routes
//! them to the coordinator's services by tool name.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
