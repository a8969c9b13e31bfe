pub mod action;
pub mod config;
pub mod error;
pub mod external;
pub mod governance;
pub mod graph;
pub mod parser;

pub use action::{Action, TransactionError, TransactionReceipt, TransactionSubmitter};
pub use config::DaoConfig;
pub use error::DaoError;
pub use governance::{Collaborators, Dao, ProposalKind, ProposalState, VoteChoice};
