use chrono::{DateTime, Utc};
use docgraph_database::basic_db::DbError;
use thiserror::Error;

use crate::governance::ProposalState;
use crate::parser::{Checksum256, FlexError, Name};

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("edge endpoint missing: {from} --{name}--> {to}")]
    DanglingReference { from: Checksum256, to: Checksum256, name: String },

    #[error("document already exists: {0}")]
    DuplicateContent(Checksum256),

    #[error("proposal {proposal} is not active (state: {state})")]
    ProposalNotActive { proposal: Checksum256, state: ProposalState },

    #[error("{document} was replaced by {replacement}")]
    Superseded { document: Checksum256, replacement: Checksum256 },

    #[error("Only allowed to vote active proposals: {proposal} is closed")]
    ProposalClosed { proposal: Checksum256 },

    #[error("voting on proposal {proposal} is open until {expires_at}")]
    VotingWindowOpen { proposal: Checksum256, expires_at: DateTime<Utc> },

    #[error("voting on proposal {proposal} expired at {expires_at}")]
    VotingExpired { proposal: Checksum256, expires_at: DateTime<Utc> },

    #[error("period {period} of assignment {assignment} has not elapsed yet")]
    PeriodNotElapsed { assignment: Checksum256, period: Checksum256 },

    #[error("period {period} already claimed for assignment {assignment}")]
    AlreadyClaimed { assignment: Checksum256, period: Checksum256 },

    #[error("{account} is not allowed to {action}")]
    Unauthorized { account: Name, action: String },

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("value error: {0}")]
    Value(#[from] FlexError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("lock poisoned")]
    Poisoned,
}

impl DaoError {
    /// Errors that may succeed later without the caller changing anything.
    pub fn is_transient(&self) -> bool {
        matches!(self, DaoError::PeriodNotElapsed { .. } | DaoError::VotingWindowOpen { .. })
    }
}

pub type Result<T, E = DaoError> = std::result::Result<T, E>;
