use serde::{Deserialize, Serialize};

use crate::parser::Name;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaoConfig {
    #[serde(default = "default_dao_account")]
    pub dao_account: Name,

    #[serde(default = "default_voting_symbol")]
    pub voting_symbol: String,

    #[serde(default = "default_voting_precision")]
    pub voting_precision: u8,

    /// Seconds a ballot stays open after a proposal is created
    #[serde(default = "default_voting_duration_secs")]
    pub voting_duration_secs: u64,

    /// Votes cast, as a percent of the voting supply, needed for a valid ballot
    #[serde(default = "default_quorum_percent")]
    pub quorum_percent: u32,

    /// Pass votes, as a percent of votes cast, needed to pass
    #[serde(default = "default_pass_percent")]
    pub pass_percent: u32,
}

fn default_dao_account() -> Name {
    Name::from_static("dao.hypha")
}

fn default_voting_symbol() -> String {
    "HVOICE".to_string()
}

fn default_voting_precision() -> u8 {
    2
}

fn default_voting_duration_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_quorum_percent() -> u32 {
    20
}

fn default_pass_percent() -> u32 {
    80
}

impl Default for DaoConfig {
    fn default() -> Self {
        Self {
            dao_account: default_dao_account(),
            voting_symbol: default_voting_symbol(),
            voting_precision: default_voting_precision(),
            voting_duration_secs: default_voting_duration_secs(),
            quorum_percent: default_quorum_percent(),
            pass_percent: default_pass_percent(),
        }
    }
}
