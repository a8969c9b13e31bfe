use docgraph_database::basic_db::SafeDatabase;
use tracing::{error, info};

use crate::error::{DaoError, Result};
use crate::governance::commitment::time_share_content;
use crate::governance::{fields, labels, require, Dao, ProposalKind};
use crate::graph::GraphWrite;
use crate::parser::{Asset, Checksum256, ContentGroup, ContentItem, Document, FlexValue, Name};

#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub period: Document,
    pub payment: Document,
    pub amounts: Vec<Asset>,
}

impl<D: SafeDatabase> Dao<D> {
    pub(crate) fn stage_assignment(&self, write: &mut GraphWrite<'_, D>, proposal: &Document) -> Result<()> {
        let groups = &proposal.content_groups;
        let assignee = self.member(require(groups, fields::DETAILS, fields::ASSIGNEE, FlexValue::as_name)?)?;
        let role = require(groups, fields::DETAILS, fields::ROLE, FlexValue::as_checksum)?;
        let start = self.load_period(&require(groups, fields::DETAILS, fields::START_PERIOD, FlexValue::as_checksum)?)?;
        let share = require(groups, fields::DETAILS, fields::TIME_SHARE, FlexValue::as_i64)?;

        write.edge(&assignee.hash, &proposal.hash, labels::ASSIGNED);
        write.edge(&proposal.hash, &assignee.hash, labels::ASSIGNEE);
        write.edge(&proposal.hash, &role, labels::ROLE);
        write.edge(&role, &proposal.hash, labels::ASSIGNMENT);
        write.edge(&proposal.hash, &start.hash, labels::START);

        let initial = write.document(
            &self.config.dao_account,
            time_share_content(&proposal.hash, share, self.period_start(&start)?),
        )?;
        write.edge(&proposal.hash, &initial.hash, labels::INIT_TIME_SHARE);
        write.edge(&proposal.hash, &initial.hash, labels::LAST_TIME_SHARE);
        Ok(())
    }

    pub fn approved_assignment(&self, hash: &Checksum256) -> Result<Document> {
        let document = self.store.load_document(hash)?;
        if self.proposal_kind(&document)? != ProposalKind::Assignment
            || !self.store.edge_exists(&self.root.hash, hash, labels::PASSED_PROPS)?
        {
            return Err(DaoError::NotFound(format!("approved assignment {hash}")));
        }
        self.ensure_current(hash)?;
        Ok(document)
    }

    pub fn last_claimed_period(&self, assignment: &Checksum256) -> Result<Option<Document>> {
        match self.store.get_last_document_of_edge_from(assignment, labels::CLAIMED) {
            Ok(period) => Ok(Some(period)),
            Err(DaoError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn is_claimed(&self, assignment: &Checksum256, period: &Checksum256) -> Result<bool> {
        self.store.edge_exists(assignment, period, labels::CLAIMED)
    }

    /// Pays the assignee for the period following the last claimed one (or
    /// the start period). Fails with the transient `PeriodNotElapsed` until
    /// that period has ended; succeeds once per period.
    pub fn claim_next_period(&self, claimer: &Name, assignment_hash: &Checksum256) -> Result<ClaimReceipt> {
        self.with_lock(assignment_hash, || self.claim_locked(claimer, assignment_hash))
    }

    fn claim_locked(&self, claimer: &Name, assignment_hash: &Checksum256) -> Result<ClaimReceipt> {
        let assignment = self.approved_assignment(assignment_hash)?;
        let groups = &assignment.content_groups;
        let assignee = require(groups, fields::DETAILS, fields::ASSIGNEE, FlexValue::as_name)?;
        if assignee != claimer {
            return Err(DaoError::Unauthorized {
                account: claimer.clone(),
                action: format!("claim pay for {assignment_hash}"),
            });
        }
        let member = self.member(claimer)?;

        let period = match self.last_claimed_period(assignment_hash)? {
            Some(last) => self.next_period(&last.hash)?.ok_or(DaoError::PeriodNotElapsed {
                assignment: *assignment_hash,
                period: last.hash,
            })?,
            None => self.load_period(&require(groups, fields::DETAILS, fields::START_PERIOD, FlexValue::as_checksum)?)?,
        };
        if self.is_claimed(assignment_hash, &period.hash)? {
            return Err(DaoError::AlreadyClaimed { assignment: *assignment_hash, period: period.hash });
        }

        let not_elapsed = DaoError::PeriodNotElapsed { assignment: *assignment_hash, period: period.hash };
        let end = match self.period_end(&period.hash)? {
            Some(end) if self.now() >= end => end,
            _ => return Err(not_elapsed),
        };
        let start = self.period_start(&period)?;
        let (weighted, window) = self.weighted_time_share(assignment_hash, start, end)?;

        let mut details = ContentGroup::labeled(fields::PAYMENT_GROUP)
            .with(fields::RECIPIENT, claimer.clone())
            .with(fields::ASSIGNMENT, *assignment_hash)
            .with(fields::PERIOD, period.hash);
        let mut amounts = Vec::new();
        for group in groups.iter().filter(|group| group.label() == Some(fields::DETAILS)) {
            for item in group.items() {
                let (Some(prefix), Some(salary)) =
                    (item.label.strip_suffix(fields::SALARY_SUFFIX), item.value.as_asset())
                else {
                    continue;
                };
                let amount = salary.scale(weighted, window)?;
                if amount.is_zero() {
                    continue;
                }
                details.push(ContentItem::new(format!("{prefix}_amount"), amount.clone()));
                amounts.push(amount);
            }
        }

        let mut write = self.store.writer();
        let payment = write.fresh_document(
            &self.config.dao_account,
            vec![
                details,
                ContentGroup::labeled(fields::SYSTEM)
                    .with(fields::TYPE, "payment")
                    .with(fields::NODE_LABEL, "payment"),
            ],
        )?;
        write.edge(assignment_hash, &period.hash, labels::CLAIMED);
        write.edge(assignment_hash, &payment.hash, labels::PAYMENT);
        write.edge(&member.hash, &payment.hash, labels::PAYMENT);

        // pay first: a failed credit leaves the period claimable
        if let Err(err) = self.treasury.credit_all(claimer, &amounts) {
            error!(assignment = %assignment_hash, claimer = %claimer, error = %err, "Failed to credit payment");
            return Err(err);
        }
        if let Err(err) = write.commit() {
            if let Err(revert) = self.treasury.revert_all(claimer, &amounts) {
                error!(assignment = %assignment_hash, claimer = %claimer, error = %revert, "Failed to revert payment");
            }
            return Err(err);
        }

        info!(assignment = %assignment_hash, period = %period.hash, claimer = %claimer, payments = amounts.len(), "Period claimed");
        Ok(ClaimReceipt { period, payment, amounts })
    }
}
