use docgraph_database::basic_db::SafeDatabase;
use tracing::{debug, info};

use crate::error::{DaoError, Result};
use crate::governance::tally::{CastVote, Tally, VoteChoice};
use crate::governance::{labels, Dao, ProposalState};
use crate::parser::{Checksum256, Document, Name};

#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub vote: Document,
    pub tally: Document,
    /// False when the vote left the tally content unchanged.
    pub tally_changed: bool,
}

impl<D: SafeDatabase> Dao<D> {
    pub fn vote(&self, voter: &Name, proposal: &Checksum256, choice: VoteChoice) -> Result<VoteReceipt> {
        self.with_lock(proposal, || self.vote_locked(voter, proposal, choice))
    }

    fn vote_locked(&self, voter: &Name, proposal: &Checksum256, choice: VoteChoice) -> Result<VoteReceipt> {
        match self.proposal_state(proposal)? {
            ProposalState::Active => {}
            ProposalState::Closed(_) => return Err(DaoError::ProposalClosed { proposal: *proposal }),
            state => return Err(DaoError::ProposalNotActive { proposal: *proposal, state }),
        }

        let document = self.store.load_document(proposal)?;
        let expires_at = self.ballot_expiration(&document)?;
        if self.now() >= expires_at {
            return Err(DaoError::VotingExpired { proposal: *proposal, expires_at });
        }

        let member = self.member(voter)?;
        let cast = CastVote {
            voter: voter.clone(),
            power: self.voting_power.voting_power(voter)?,
            choice,
        };

        let mut history = self.votes_on(proposal)?;
        history.push(cast.clone());
        let tally = Tally::aggregate(self.zero_vote_power()?, history)?;
        let current = self.current_tally(proposal)?;

        let mut write = self.store.writer();
        let vote = write.document(voter, cast.to_content())?;
        write.edge(&member.hash, &vote.hash, labels::VOTE);
        write.edge(proposal, &vote.hash, labels::VOTE);
        write.edge(&vote.hash, &member.hash, labels::OWNED_BY);
        write.edge(&vote.hash, proposal, labels::VOTE_ON);

        let next = write.document(&self.config.dao_account, tally.to_content())?;
        let tally_changed = next.hash != current.hash;
        if tally_changed {
            write.edge(proposal, &next.hash, labels::VOTE_TALLY);
        }
        write.commit()?;

        info!(proposal = %proposal, voter = %voter, vote = %choice, power = %cast.power, "Vote cast");
        if tally_changed {
            debug!(proposal = %proposal, pass = %tally.pass, fail = %tally.fail, "Tally updated");
        }

        Ok(VoteReceipt { vote, tally: next, tally_changed })
    }

    pub fn votes_on(&self, proposal: &Checksum256) -> Result<Vec<CastVote>> {
        self.store
            .edges_from(proposal, labels::VOTE)?
            .iter()
            .map(|edge| CastVote::from_document(&self.store.load_document(&edge.to)?))
            .collect()
    }
}
