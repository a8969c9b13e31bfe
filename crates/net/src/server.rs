use std::net::SocketAddr;

use axum::{http, Router};
use docgraph_database::basic_db::SafeDatabase;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::governance::*;
use crate::graph::*;
use crate::router::*;
use crate::AppState;

/// Serves the API for `dao` on `addr` until the listener fails.
pub async fn build_server<D: SafeDatabase>(dao: AppState<D>, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_app(dao);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await
}

pub fn build_app<D: SafeDatabase>(dao: AppState<D>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    main_router(collect_components::<D>(), dao).layer(cors)
}

fn collect_components<D: SafeDatabase>() -> Vec<(String, Router<AppState<D>>)> {
    vec![
        get_router_builder("/api/health".to_string(), health::<D>),
        // graph
        get_router_builder("/api/document".to_string(), get_document::<D>),
        get_router_builder("/api/edges".to_string(), get_edges::<D>),
        get_router_builder("/api/edge/exists".to_string(), edge_exists::<D>),
        get_router_builder("/api/edge/last".to_string(), get_last_document::<D>),
        // governance
        get_router_builder("/api/proposal".to_string(), get_proposal::<D>),
        post_router_builder("/api/transaction".to_string(), submit_transaction::<D>),
    ]
}
