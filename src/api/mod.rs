//! HTTP API exposing the enrichment engine

pub mod handlers;
pub mod issue_handlers;
pub mod routes;

pub use routes::create_router;
