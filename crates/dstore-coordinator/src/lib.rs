//! HTTP coordinator (spec §6, §6.1): the axum surface in front of the
//! availability engine. Thin by design — every handler validates the
//! request shape and delegates to `dstore_engine`/`dstore_metadata`.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
