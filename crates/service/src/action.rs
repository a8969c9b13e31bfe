use chrono::{DateTime, Utc};
use docgraph_database::basic_db::SafeDatabase;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DaoError, Result};
use crate::governance::{Dao, ProposalKind, VoteChoice};
use crate::parser::{Checksum256, ContentGroup, Name};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Enroll {
        account: Name,
    },
    AddPeriod {
        start: DateTime<Utc>,
        label: String,
    },
    Propose {
        proposer: Name,
        kind: ProposalKind,
        content: Vec<ContentGroup>,
    },
    Vote {
        voter: Name,
        proposal: Checksum256,
        vote: VoteChoice,
    },
    CloseProposal {
        closer: Name,
        proposal: Checksum256,
    },
    ClaimNextPeriod {
        claimer: Name,
        assignment: Checksum256,
    },
    AdjustCommitment {
        issuer: Name,
        adjust_info: Vec<ContentGroup>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Enroll { .. } => "enroll",
            Action::AddPeriod { .. } => "addperiod",
            Action::Propose { .. } => "propose",
            Action::Vote { .. } => "vote",
            Action::CloseProposal { .. } => "closedocprop",
            Action::ClaimNextPeriod { .. } => "claimnextper",
            Action::AdjustCommitment { .. } => "adjustcmtmnt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub id: Checksum256,
    pub documents: Vec<Checksum256>,
}

#[derive(Debug, thiserror::Error)]
#[error("action {index} ({action}) failed: {source}")]
pub struct TransactionError {
    pub index: usize,
    pub action: &'static str,
    #[source]
    pub source: DaoError,
}

pub trait TransactionSubmitter: Send + Sync {
    fn submit(&self, actions: Vec<Action>) -> std::result::Result<TransactionReceipt, TransactionError>;
}

impl<D: SafeDatabase> Dao<D> {
    pub fn apply(&self, action: &Action) -> Result<Checksum256> {
        let document = match action {
            Action::Enroll { account } => self.enroll(account)?,
            Action::AddPeriod { start, label } => self.add_period(*start, label)?,
            Action::Propose { proposer, kind, content } => self.propose(proposer, *kind, content.clone())?,
            Action::Vote { voter, proposal, vote } => self.vote(voter, proposal, *vote)?.vote,
            Action::CloseProposal { closer, proposal } => self.close_proposal(closer, proposal)?.document,
            Action::ClaimNextPeriod { claimer, assignment } => self.claim_next_period(claimer, assignment)?.payment,
            Action::AdjustCommitment { issuer, adjust_info } => self.adjust_commitment(issuer, adjust_info.clone())?,
        };
        Ok(document.hash)
    }
}

impl<D: SafeDatabase> TransactionSubmitter for Dao<D> {
    fn submit(&self, actions: Vec<Action>) -> std::result::Result<TransactionReceipt, TransactionError> {
        let id = transaction_id(&actions, self.now()).map_err(|source| TransactionError {
            index: 0,
            action: actions.first().map_or("empty", Action::name),
            source,
        })?;

        let mut documents = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            match self.apply(action) {
                Ok(document) => documents.push(document),
                Err(source) => {
                    warn!(transaction = %id, index, action = action.name(), error = %source, "Transaction aborted");
                    return Err(TransactionError { index, action: action.name(), source });
                }
            }
        }

        info!(transaction = %id, actions = actions.len(), "Transaction applied");
        Ok(TransactionReceipt { id, documents })
    }
}

fn transaction_id(actions: &[Action], at: DateTime<Utc>) -> Result<Checksum256> {
    let mut payload = serde_json::to_vec(actions)?;
    payload.extend_from_slice(at.to_rfc3339().as_bytes());
    Ok(Checksum256::digest(&payload))
}
