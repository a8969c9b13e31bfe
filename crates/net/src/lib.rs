pub mod error;
pub mod governance;
pub mod graph;
pub mod router;
pub mod server;

use std::sync::Arc;

use docgraph_service::Dao;

/// Shared handler state: the engine behind every route.
pub type AppState<D> = Arc<Dao<D>>;
