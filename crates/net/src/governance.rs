//! Proposal views and transaction submission.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use docgraph_database::basic_db::SafeDatabase;
use docgraph_service::governance::Tally;
use docgraph_service::parser::{Asset, Checksum256, Document, Name};
use docgraph_service::{Action, TransactionReceipt, TransactionSubmitter};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::graph::HashQuery;
use crate::AppState;

#[derive(Serialize)]
pub struct TallyResponse {
    pub hash: Checksum256,
    pub pass: Asset,
    pub fail: Asset,
}

#[derive(Serialize)]
pub struct ProposalResponse {
    pub proposal: Document,
    pub kind: String,
    pub state: String,
    pub expires_at: DateTime<Utc>,
    pub voting_closed: bool,
    pub tally: TallyResponse,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dao: Name,
    pub root: Checksum256,
}

pub async fn get_proposal<D: SafeDatabase>(
    State(dao): State<AppState<D>>,
    Query(query): Query<HashQuery>,
) -> Result<Json<ProposalResponse>, ApiError> {
    let proposal = dao.store().load_document(&query.hash)?;
    let kind = dao.proposal_kind(&proposal)?;
    let state = dao.proposal_state(&query.hash)?;
    let expires_at = dao.ballot_expiration(&proposal)?;
    let tally_document = dao.current_tally(&query.hash)?;
    let tally = Tally::from_document(&tally_document)?;

    Ok(Json(ProposalResponse {
        proposal,
        kind: kind.to_string(),
        state: state.to_string(),
        expires_at,
        voting_closed: dao.now() >= expires_at,
        tally: TallyResponse { hash: tally_document.hash, pass: tally.pass, fail: tally.fail },
    }))
}

pub async fn submit_transaction<D: SafeDatabase>(
    State(dao): State<AppState<D>>,
    Json(actions): Json<Vec<Action>>,
) -> Result<Json<TransactionReceipt>, ApiError> {
    if actions.is_empty() {
        return Err(ApiError::BadRequest("transaction has no actions".to_string()));
    }
    debug!(actions = actions.len(), "Submitting transaction");
    Ok(Json(dao.submit(actions)?))
}

pub async fn health<D: SafeDatabase>(State(dao): State<AppState<D>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        dao: dao.config().dao_account.clone(),
        root: dao.root().hash,
    })
}
