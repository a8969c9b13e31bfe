//! Read-only views of the document graph.

use axum::extract::{Query, State};
use axum::Json;
use docgraph_database::basic_db::SafeDatabase;
use docgraph_service::graph::Edge;
use docgraph_service::parser::{Checksum256, Document};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct HashQuery {
    pub hash: Checksum256,
}

#[derive(Deserialize)]
pub struct EdgesQuery {
    pub from: Option<Checksum256>,
    pub to: Option<Checksum256>,
    pub name: String,
}

#[derive(Deserialize)]
pub struct EdgeQuery {
    pub from: Checksum256,
    pub to: Checksum256,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LastQuery {
    pub name: String,
    pub from: Option<Checksum256>,
}

#[derive(Serialize)]
pub struct EdgesResponse {
    pub edges: Vec<Edge>,
}

#[derive(Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

pub async fn get_document<D: SafeDatabase>(
    State(dao): State<AppState<D>>,
    Query(query): Query<HashQuery>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(dao.store().load_document(&query.hash)?))
}

/// Edges called `name` leaving `from` or arriving at `to`, oldest first.
pub async fn get_edges<D: SafeDatabase>(
    State(dao): State<AppState<D>>,
    Query(query): Query<EdgesQuery>,
) -> Result<Json<EdgesResponse>, ApiError> {
    let edges = match (query.from, query.to) {
        (Some(from), None) => dao.store().edges_from(&from, &query.name)?,
        (None, Some(to)) => dao.store().edges_to(&to, &query.name)?,
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of `from` and `to` is required".to_string(),
            ))
        }
    };
    Ok(Json(EdgesResponse { edges }))
}

pub async fn edge_exists<D: SafeDatabase>(
    State(dao): State<AppState<D>>,
    Query(query): Query<EdgeQuery>,
) -> Result<Json<ExistsResponse>, ApiError> {
    let exists = dao.store().edge_exists(&query.from, &query.to, &query.name)?;
    Ok(Json(ExistsResponse { exists }))
}

pub async fn get_last_document<D: SafeDatabase>(
    State(dao): State<AppState<D>>,
    Query(query): Query<LastQuery>,
) -> Result<Json<Document>, ApiError> {
    let document = match query.from {
        Some(from) => dao.store().get_last_document_of_edge_from(&from, &query.name)?,
        None => dao.store().get_last_document_of_edge(&query.name)?,
    };
    Ok(Json(document))
}
