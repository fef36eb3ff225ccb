//! Shared axum state: a thin wrapper over the engine the handlers drive.

use std::sync::Arc;

use dstore_engine::Engine;

pub type AppState = Arc<Engine>;
