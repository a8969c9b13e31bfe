use chrono::{DateTime, Duration, Utc};
use docgraph_database::basic_db::SafeDatabase;
use tracing::{info, warn};

use crate::error::{DaoError, Result};
use crate::governance::tally::Tally;
use crate::governance::{
    fields, labels, optional, require, system_type, Dao, Outcome, ProposalKind, ProposalState,
};
use crate::graph::GraphWrite;
use crate::parser::{Checksum256, ContentGroup, Document, FlexValue, Name};

#[derive(Debug, Clone)]
pub struct Closure {
    pub outcome: Outcome,
    pub tally: Document,
    pub document: Document,
}

impl<D: SafeDatabase> Dao<D> {
    pub fn propose(&self, proposer: &Name, kind: ProposalKind, content: Vec<ContentGroup>) -> Result<Document> {
        let member = self.member(proposer)?;
        let original = self.validate_proposal(kind, &content)?;

        let expires_at = self.now() + Duration::seconds(self.config.voting_duration_secs as i64);
        let mut groups: Vec<ContentGroup> = content
            .into_iter()
            .filter(|group| group.label() != Some(fields::SYSTEM))
            .collect();
        groups.push(
            ContentGroup::labeled(fields::SYSTEM)
                .with(fields::TYPE, kind.as_str())
                .with(fields::NODE_LABEL, kind.as_str())
                .with(fields::BALLOT_EXPIRATION, expires_at),
        );

        let mut write = self.store.writer();
        let proposal = write.fresh_document(proposer, groups)?;
        let tally = write.document(&self.config.dao_account, Tally::zero(self.zero_vote_power()?).to_content())?;

        write.edge(&self.root.hash, &proposal.hash, labels::PROPOSAL);
        write.edge(&member.hash, &proposal.hash, labels::OWNS);
        write.edge(&proposal.hash, &member.hash, labels::OWNED_BY);
        write.edge(&proposal.hash, &tally.hash, labels::VOTE_TALLY);
        if let Some(original) = original {
            write.edge(&proposal.hash, &original, labels::ORIGINAL);
        }
        write.commit()?;

        info!(proposal = %proposal.hash, kind = %kind, proposer = %proposer, expires_at = %expires_at, "Proposal created");
        Ok(proposal)
    }

    fn validate_proposal(&self, kind: ProposalKind, content: &[ContentGroup]) -> Result<Option<Checksum256>> {
        match kind {
            ProposalKind::Role => {
                require(content, fields::DETAILS, fields::TITLE, FlexValue::as_str)?;
                Ok(None)
            }
            ProposalKind::Assignment => {
                let assignee = require(content, fields::DETAILS, fields::ASSIGNEE, FlexValue::as_name)?;
                self.member(assignee)?;

                let role = require(content, fields::DETAILS, fields::ROLE, FlexValue::as_checksum)?;
                if !self.store.edge_exists(&self.root.hash, &role, labels::ROLE)? {
                    return Err(DaoError::InvalidContent(format!("{role} is not an approved role")));
                }
                self.ensure_current(&role)?;

                let start = require(content, fields::DETAILS, fields::START_PERIOD, FlexValue::as_checksum)?;
                self.load_period(&start)?;

                let share = require(content, fields::DETAILS, fields::TIME_SHARE, FlexValue::as_i64)?;
                if !(1..=100).contains(&share) {
                    return Err(DaoError::InvalidContent(format!("time share {share} outside 1..=100")));
                }
                if let Some(min) = optional(content, fields::DETAILS, fields::MIN_TIME_SHARE, FlexValue::as_i64)? {
                    if !(1..=share).contains(&min) {
                        return Err(DaoError::InvalidContent(format!("minimum time share {min} outside 1..={share}")));
                    }
                }
                Ok(None)
            }
            ProposalKind::Edit => {
                let original = require(content, fields::DETAILS, fields::ORIGINAL_DOCUMENT, FlexValue::as_checksum)?;
                let document = self.store.load_document(&original)?;
                self.ensure_current(&original)?;
                // an open ballot keeps writing edges the merged copy would inherit
                if self.proposal_kind(&document).is_ok() {
                    let state = self.proposal_state(&original)?;
                    if !state.is_closed() {
                        return Err(DaoError::InvalidContent(format!(
                            "proposal {original} is {state} and cannot be edited"
                        )));
                    }
                }
                Ok(Some(original))
            }
        }
    }

    pub fn proposal_kind(&self, proposal: &Document) -> Result<ProposalKind> {
        system_type(proposal)
            .ok_or_else(|| DaoError::InvalidContent(format!("{} has no type", proposal.hash)))?
            .parse()
    }

    pub fn proposal_state(&self, proposal: &Checksum256) -> Result<ProposalState> {
        let root = &self.root.hash;
        if !self.store.edge_exists(root, proposal, labels::PROPOSAL)? {
            let document = self.store.load_document(proposal)?;
            return match self.proposal_kind(&document) {
                Ok(_) => Ok(ProposalState::Draft),
                Err(_) => Err(DaoError::NotFound(format!("proposal {proposal}"))),
            };
        }
        if self.superseded_by(proposal)?.is_some() {
            return Ok(ProposalState::Superseded);
        }
        if self.store.edge_exists(root, proposal, labels::CLOSED_PROPS)? {
            let outcome = if self.store.edge_exists(root, proposal, labels::PASSED_PROPS)? {
                Outcome::Passed
            } else {
                Outcome::Rejected
            };
            return Ok(ProposalState::Closed(outcome));
        }
        Ok(ProposalState::Active)
    }

    pub fn ballot_expiration(&self, proposal: &Document) -> Result<DateTime<Utc>> {
        require(&proposal.content_groups, fields::SYSTEM, fields::BALLOT_EXPIRATION, FlexValue::as_time_point)
    }

    pub fn is_voting_window_closed(&self, proposal: &Checksum256) -> Result<bool> {
        let document = self.store.load_document(proposal)?;
        Ok(self.now() >= self.ballot_expiration(&document)?)
    }

    pub fn current_tally(&self, proposal: &Checksum256) -> Result<Document> {
        self.store.get_last_document_of_edge_from(proposal, labels::VOTE_TALLY)
    }

    /// Closes an active proposal whose ballot has expired and, when the
    /// tally passes the closure policy, applies its structural effect.
    pub fn close_proposal(&self, closer: &Name, proposal: &Checksum256) -> Result<Closure> {
        let document = self.store.load_document(proposal)?;
        match self.edit_target(&document)? {
            // the original's subgraph is copied on pass, so it must not move meanwhile
            Some(original) => self.with_lock(proposal, || {
                self.with_lock(&original, || self.close_locked(closer, proposal))
            }),
            None => self.with_lock(proposal, || self.close_locked(closer, proposal)),
        }
    }

    fn edit_target(&self, proposal: &Document) -> Result<Option<Checksum256>> {
        match self.proposal_kind(proposal) {
            Ok(ProposalKind::Edit) => Ok(Some(require(
                &proposal.content_groups,
                fields::DETAILS,
                fields::ORIGINAL_DOCUMENT,
                FlexValue::as_checksum,
            )?)),
            _ => Ok(None),
        }
    }

    fn close_locked(&self, closer: &Name, proposal: &Checksum256) -> Result<Closure> {
        let state = self.proposal_state(proposal)?;
        if state != ProposalState::Active {
            return Err(DaoError::ProposalNotActive { proposal: *proposal, state });
        }
        self.member(closer)?;

        let document = self.store.load_document(proposal)?;
        let expires_at = self.ballot_expiration(&document)?;
        if self.now() < expires_at {
            return Err(DaoError::VotingWindowOpen { proposal: *proposal, expires_at });
        }

        let tally_document = self.current_tally(proposal)?;
        let tally = Tally::from_document(&tally_document)?;
        let supply = self.voting_power.total_supply()?;
        let mut outcome = if self.policy.passes(&tally, &supply) {
            Outcome::Passed
        } else {
            Outcome::Rejected
        };
        if outcome == Outcome::Passed {
            if let Some(original) = self.edit_target(&document)? {
                if let Some(replacement) = self.superseded_by(&original)? {
                    warn!(proposal = %proposal, original = %original, replacement = %replacement, "Edit target already replaced");
                    outcome = Outcome::Rejected;
                }
            }
        }

        let mut write = self.store.writer();
        write.edge(&self.root.hash, proposal, labels::CLOSED_PROPS);
        let result = match outcome {
            Outcome::Passed => {
                write.edge(&self.root.hash, proposal, labels::PASSED_PROPS);
                self.apply_passed(&mut write, &document)?
            }
            Outcome::Rejected => document.clone(),
        };
        write.commit()?;

        match outcome {
            Outcome::Passed => info!(proposal = %proposal, closer = %closer, pass = %tally.pass, fail = %tally.fail, "Proposal passed"),
            Outcome::Rejected => warn!(proposal = %proposal, closer = %closer, pass = %tally.pass, fail = %tally.fail, "Proposal rejected"),
        }

        Ok(Closure { outcome, tally: tally_document, document: result })
    }

    fn apply_passed(&self, write: &mut GraphWrite<'_, D>, proposal: &Document) -> Result<Document> {
        match self.proposal_kind(proposal)? {
            ProposalKind::Role => {
                write.edge(&self.root.hash, &proposal.hash, labels::ROLE);
                Ok(proposal.clone())
            }
            ProposalKind::Assignment => {
                self.stage_assignment(write, proposal)?;
                Ok(proposal.clone())
            }
            ProposalKind::Edit => self.stage_edit(write, proposal),
        }
    }
}
