use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::DaoConfig;
use crate::error::{DaoError, Result};
use crate::governance::{fields, require};
use crate::parser::{Asset, ContentGroup, Document, FlexValue, Name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Pass,
    Fail,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Pass => "pass",
            VoteChoice::Fail => "fail",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteChoice {
    type Err = DaoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pass" => Ok(VoteChoice::Pass),
            "fail" => Ok(VoteChoice::Fail),
            other => Err(DaoError::InvalidContent(format!("unknown vote {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVote {
    pub voter: Name,
    pub power: Asset,
    pub choice: VoteChoice,
}

impl CastVote {
    pub fn to_content(&self) -> Vec<ContentGroup> {
        vec![ContentGroup::new()
            .with(fields::VOTER, self.voter.clone())
            .with(fields::VOTE_POWER, self.power.clone())
            .with(fields::VOTE, self.choice.as_str())]
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        let group = document
            .content_groups
            .first()
            .ok_or_else(|| DaoError::InvalidContent(format!("vote {} is empty", document.hash)))?;
        let field = |label: &str| {
            group
                .get(label)
                .ok_or_else(|| DaoError::InvalidContent(format!("vote {} lacks {label}", document.hash)))
        };
        let voter = field(fields::VOTER)?
            .as_name()
            .cloned()
            .ok_or_else(|| DaoError::InvalidContent("voter must be a name".to_string()))?;
        let power = field(fields::VOTE_POWER)?
            .as_asset()
            .cloned()
            .ok_or_else(|| DaoError::InvalidContent("vote_power must be an asset".to_string()))?;
        let choice = field(fields::VOTE)?
            .as_str()
            .ok_or_else(|| DaoError::InvalidContent("vote must be a string".to_string()))?
            .parse()?;
        Ok(Self { voter, power, choice })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub pass: Asset,
    pub fail: Asset,
}

impl Tally {
    pub fn zero(zero: Asset) -> Self {
        Self { pass: zero.clone(), fail: zero }
    }

    pub fn aggregate(zero: Asset, votes: impl IntoIterator<Item = CastVote>) -> Result<Self> {
        let mut latest: HashMap<Name, CastVote> = HashMap::new();
        for vote in votes {
            latest.insert(vote.voter.clone(), vote);
        }

        let mut tally = Self::zero(zero);
        for vote in latest.into_values() {
            match vote.choice {
                VoteChoice::Pass => tally.pass = tally.pass.checked_add(&vote.power)?,
                VoteChoice::Fail => tally.fail = tally.fail.checked_add(&vote.power)?,
            }
        }
        Ok(tally)
    }

    pub fn total(&self) -> Result<Asset> {
        Ok(self.pass.checked_add(&self.fail)?)
    }

    pub fn to_content(&self) -> Vec<ContentGroup> {
        vec![
            ContentGroup::labeled(VoteChoice::Pass.as_str()).with(fields::VOTE_POWER, self.pass.clone()),
            ContentGroup::labeled(VoteChoice::Fail.as_str()).with(fields::VOTE_POWER, self.fail.clone()),
        ]
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        let groups = &document.content_groups;
        Ok(Self {
            pass: require(groups, VoteChoice::Pass.as_str(), fields::VOTE_POWER, FlexValue::as_asset)?.clone(),
            fail: require(groups, VoteChoice::Fail.as_str(), fields::VOTE_POWER, FlexValue::as_asset)?.clone(),
        })
    }
}

pub trait ClosurePolicy: Send + Sync {
    fn passes(&self, tally: &Tally, supply: &Asset) -> bool;
}

/// Passes when votes cast reach `quorum_percent` of the supply and pass
/// votes reach `pass_percent` of the votes cast.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
    pub quorum_percent: u32,
    pub pass_percent: u32,
}

impl ThresholdPolicy {
    pub fn from_config(config: &DaoConfig) -> Self {
        Self {
            quorum_percent: config.quorum_percent,
            pass_percent: config.pass_percent,
        }
    }
}

impl ClosurePolicy for ThresholdPolicy {
    fn passes(&self, tally: &Tally, supply: &Asset) -> bool {
        let pass = tally.pass.amount() as i128;
        let cast = pass + tally.fail.amount() as i128;
        if cast <= 0 {
            return false;
        }
        let quorum = cast * 100 >= supply.amount() as i128 * self.quorum_percent as i128;
        let majority = pass * 100 >= cast * self.pass_percent as i128;
        quorum && majority
    }
}
