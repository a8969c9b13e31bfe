pub mod assignment;
pub mod commitment;
pub mod edit;
pub mod member;
pub mod period;
pub mod proposal;
pub mod tally;
pub mod vote;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use docgraph_database::basic_db::SafeDatabase;
use serde::{Deserialize, Serialize};

use crate::config::DaoConfig;
use crate::error::{DaoError, Result};
use crate::external::{Clock, Treasury, VotingPower};
use crate::graph::GraphStore;
use crate::parser::{Asset, Checksum256, ContentGroup, Document, FlexValue, Name};

pub use assignment::ClaimReceipt;
pub use proposal::Closure;
pub use tally::{ClosurePolicy, Tally, ThresholdPolicy, VoteChoice};
pub use vote::VoteReceipt;

pub mod labels {
    pub const PROPOSAL: &str = "proposal";
    pub const OWNS: &str = "owns";
    pub const OWNED_BY: &str = "ownedby";
    pub const VOTE_TALLY: &str = "votetally";
    pub const VOTE: &str = "vote";
    pub const VOTE_ON: &str = "voteon";
    pub const PASSED_PROPS: &str = "passedprops";
    pub const CLOSED_PROPS: &str = "closedprops";
    pub const ROLE: &str = "role";
    pub const ASSIGNED: &str = "assigned";
    pub const ASSIGNEE: &str = "assignee";
    pub const ASSIGNMENT: &str = "assignment";
    pub const MEMBER: &str = "member";
    pub const MEMBER_OF: &str = "memberof";
    pub const PERIOD: &str = "period";
    pub const NEXT: &str = "next";
    pub const START: &str = "start";
    pub const CLAIMED: &str = "claimed";
    pub const PAYMENT: &str = "payment";
    pub const INIT_TIME_SHARE: &str = "initimeshare";
    pub const LAST_TIME_SHARE: &str = "lastimeshare";
    pub const NEXT_TIME_SHARE: &str = "nextimeshare";
    pub const ORIGINAL: &str = "original";
    pub const REPLACES: &str = "replaces";
}

pub mod fields {
    pub const DETAILS: &str = "details";
    pub const SYSTEM: &str = "system";
    pub const TYPE: &str = "type";
    pub const NODE_LABEL: &str = "node_label";
    pub const ROOT_NODE: &str = "root_node";
    pub const BALLOT_EXPIRATION: &str = "ballot_expiration";
    pub const TITLE: &str = "title";
    pub const MEMBER: &str = "member";
    pub const VOTER: &str = "voter";
    pub const VOTE_POWER: &str = "vote_power";
    pub const VOTE: &str = "vote";
    pub const ASSIGNEE: &str = "assignee";
    pub const ROLE: &str = "role";
    pub const START_PERIOD: &str = "start_period";
    pub const TIME_SHARE: &str = "time_share_x100";
    pub const MIN_TIME_SHARE: &str = "min_time_share_x100";
    pub const NEW_TIME_SHARE: &str = "new_time_share_x100";
    pub const START_DATE: &str = "start_date";
    pub const FIXED_START_DATE: &str = "fixed_start_date";
    pub const ASSIGNMENT: &str = "assignment";
    pub const START_TIME: &str = "start_time";
    pub const LABEL: &str = "label";
    pub const ORIGINAL_DOCUMENT: &str = "original_document";
    pub const PAYMENT_GROUP: &str = "payment";
    pub const RECIPIENT: &str = "recipient";
    pub const PERIOD: &str = "period";
    pub const SALARY_SUFFIX: &str = "_salary_per_phase";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    Role,
    Assignment,
    Edit,
}

impl ProposalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalKind::Role => "role",
            ProposalKind::Assignment => "assignment",
            ProposalKind::Edit => "edit",
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalKind {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "role" => Ok(ProposalKind::Role),
            "assignment" => Ok(ProposalKind::Assignment),
            "edit" => Ok(ProposalKind::Edit),
            other => Err(DaoError::InvalidContent(format!("unknown proposal type {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    Draft,
    Active,
    Closed(Outcome),
    Superseded,
}

impl ProposalState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ProposalState::Closed(_))
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalState::Draft => f.write_str("draft"),
            ProposalState::Active => f.write_str("active"),
            ProposalState::Closed(Outcome::Passed) => f.write_str("passed"),
            ProposalState::Closed(Outcome::Rejected) => f.write_str("rejected"),
            ProposalState::Superseded => f.write_str("superseded"),
        }
    }
}

#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub voting_power: Arc<dyn VotingPower>,
    pub treasury: Arc<dyn Treasury>,
}

pub struct Dao<D: SafeDatabase> {
    store: GraphStore<D>,
    voting_power: Arc<dyn VotingPower>,
    treasury: Arc<dyn Treasury>,
    policy: Box<dyn ClosurePolicy>,
    config: DaoConfig,
    root: Document,
    locks: DashMap<Checksum256, Arc<Mutex<()>>>,
}

impl<D: SafeDatabase> Dao<D> {
    pub fn open(db: D, config: DaoConfig, collaborators: Collaborators) -> Result<Self> {
        let store = GraphStore::open(db, collaborators.clock)?;
        let root = store.create_document(&config.dao_account, root_content(&config.dao_account))?;
        tracing::info!(root = %root.hash, dao = %config.dao_account, "DAO ready");

        Ok(Self {
            store,
            voting_power: collaborators.voting_power,
            treasury: collaborators.treasury,
            policy: Box::new(ThresholdPolicy::from_config(&config)),
            config,
            root,
            locks: DashMap::new(),
        })
    }

    pub fn with_policy(mut self, policy: impl ClosurePolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn store(&self) -> &GraphStore<D> {
        &self.store
    }

    pub fn root(&self) -> &Document {
        &self.root
    }

    pub fn config(&self) -> &DaoConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    /// Runs `f` holding the mutex of `hash`. The entry is dropped again once
    /// nobody else holds or waits on it.
    pub(crate) fn with_lock<T>(&self, hash: &Checksum256, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.locks.entry(*hash).or_default().clone();
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(DaoError::Poisoned),
        };
        drop(lock);
        self.locks.remove_if(hash, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    pub fn superseded_by(&self, hash: &Checksum256) -> Result<Option<Checksum256>> {
        Ok(self.store.edges_to(hash, labels::REPLACES)?.last().map(|edge| edge.from))
    }

    pub(crate) fn ensure_current(&self, hash: &Checksum256) -> Result<()> {
        match self.superseded_by(hash)? {
            Some(replacement) => Err(DaoError::Superseded { document: *hash, replacement }),
            None => Ok(()),
        }
    }

    pub(crate) fn zero_vote_power(&self) -> Result<Asset> {
        Ok(Asset::zero(self.config.voting_precision, self.config.voting_symbol.clone())?)
    }
}

fn root_content(dao: &Name) -> Vec<ContentGroup> {
    vec![
        ContentGroup::labeled(fields::DETAILS).with(fields::ROOT_NODE, dao.clone()),
        ContentGroup::labeled(fields::SYSTEM)
            .with(fields::TYPE, "dho")
            .with(fields::NODE_LABEL, dao.as_str()),
    ]
}

pub(crate) fn system_type(document: &Document) -> Option<&str> {
    document.get(fields::SYSTEM, fields::TYPE).and_then(FlexValue::as_str)
}

pub(crate) fn require<'a, T>(
    groups: &'a [ContentGroup],
    group: &str,
    label: &str,
    extract: impl Fn(&'a FlexValue) -> Option<T>,
) -> Result<T> {
    let value = groups
        .iter()
        .find(|candidate| candidate.label() == Some(group))
        .and_then(|found| found.get(label))
        .ok_or_else(|| DaoError::InvalidContent(format!("missing {group}.{label}")))?;
    extract(value).ok_or_else(|| {
        DaoError::InvalidContent(format!("{group}.{label} has unexpected type {}", value.type_name()))
    })
}

pub(crate) fn optional<'a, T>(
    groups: &'a [ContentGroup],
    group: &str,
    label: &str,
    extract: impl Fn(&'a FlexValue) -> Option<T>,
) -> Result<Option<T>> {
    let found = groups
        .iter()
        .find(|candidate| candidate.label() == Some(group))
        .and_then(|found| found.get(label));
    match found {
        None => Ok(None),
        Some(value) => extract(value).map(Some).ok_or_else(|| {
            DaoError::InvalidContent(format!("{group}.{label} has unexpected type {}", value.type_name()))
        }),
    }
}
