use chrono::{DateTime, Utc};
use docgraph_database::basic_db::SafeDatabase;
use tracing::info;

use crate::error::{DaoError, Result};
use crate::governance::{fields, labels, optional, require, Dao};
use crate::parser::{Checksum256, ContentGroup, Document, FlexValue, Name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeShare {
    pub hash: Checksum256,
    pub share: i64,
    pub start: DateTime<Utc>,
}

impl TimeShare {
    pub fn from_document(document: &Document) -> Result<Self> {
        let groups = &document.content_groups;
        Ok(Self {
            hash: document.hash,
            share: require(groups, fields::DETAILS, fields::TIME_SHARE, FlexValue::as_i64)?,
            start: require(groups, fields::DETAILS, fields::START_DATE, FlexValue::as_time_point)?,
        })
    }
}

pub(crate) fn time_share_content(assignment: &Checksum256, share: i64, start: DateTime<Utc>) -> Vec<ContentGroup> {
    vec![
        ContentGroup::labeled(fields::DETAILS)
            .with(fields::TIME_SHARE, share)
            .with(fields::START_DATE, start)
            .with(fields::ASSIGNMENT, *assignment),
        ContentGroup::labeled(fields::SYSTEM)
            .with(fields::TYPE, "timeshare")
            .with(fields::NODE_LABEL, "timeshare"),
    ]
}

impl<D: SafeDatabase> Dao<D> {
    pub fn current_time_share(&self, assignment: &Checksum256) -> Result<TimeShare> {
        let document = self.store.get_last_document_of_edge_from(assignment, labels::LAST_TIME_SHARE)?;
        TimeShare::from_document(&document)
    }

    pub fn time_share_history(&self, assignment: &Checksum256) -> Result<Vec<TimeShare>> {
        let first = self.store.get_last_document_of_edge_from(assignment, labels::INIT_TIME_SHARE)?;
        let mut history = vec![TimeShare::from_document(&first)?];
        loop {
            let Some(last) = history.last() else { break };
            let next = match self.store.get_last_document_of_edge_from(&last.hash, labels::NEXT_TIME_SHARE) {
                Ok(next) => TimeShare::from_document(&next)?,
                Err(DaoError::NotFound(_)) => break,
                Err(err) => return Err(err),
            };
            if next.start <= last.start {
                return Err(DaoError::InvalidContent(format!("time share chain of {assignment} is not ordered")));
            }
            history.push(next);
        }
        Ok(history)
    }

    /// `(Σ share × overlap, 100 × window)` in microseconds over `[from, to)`.
    pub(crate) fn weighted_time_share(
        &self,
        assignment: &Checksum256,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(i128, i128)> {
        let window = (to - from).num_microseconds().unwrap_or(i64::MAX) as i128;
        if window <= 0 {
            return Err(DaoError::InvalidContent(format!("empty pay window {from}..{to}")));
        }

        let history = self.time_share_history(assignment)?;
        let mut weighted: i128 = 0;
        for (position, share) in history.iter().enumerate() {
            let segment_start = share.start.max(from);
            let segment_end = history
                .get(position + 1)
                .map_or(to, |next| next.start.min(to));
            if segment_end > segment_start {
                let micros = (segment_end - segment_start).num_microseconds().unwrap_or(i64::MAX) as i128;
                weighted += share.share as i128 * micros;
            }
        }
        Ok((weighted, window * 100))
    }

    pub fn adjust_commitment(&self, issuer: &Name, adjust_info: Vec<ContentGroup>) -> Result<Document> {
        let assignment_hash = require(&adjust_info, fields::DETAILS, fields::ASSIGNMENT, FlexValue::as_checksum)?;
        self.with_lock(&assignment_hash, || self.adjust_locked(issuer, assignment_hash, &adjust_info))
    }

    fn adjust_locked(&self, issuer: &Name, assignment_hash: Checksum256, adjust_info: &[ContentGroup]) -> Result<Document> {
        let assignment = self.approved_assignment(&assignment_hash)?;
        let groups = &assignment.content_groups;
        let assignee = require(groups, fields::DETAILS, fields::ASSIGNEE, FlexValue::as_name)?;
        if assignee != issuer {
            return Err(DaoError::Unauthorized {
                account: issuer.clone(),
                action: format!("adjust commitment of {assignment_hash}"),
            });
        }

        let new_share = require(adjust_info, fields::DETAILS, fields::NEW_TIME_SHARE, FlexValue::as_i64)?;
        let full_share = require(groups, fields::DETAILS, fields::TIME_SHARE, FlexValue::as_i64)?;
        let min_share = optional(groups, fields::DETAILS, fields::MIN_TIME_SHARE, FlexValue::as_i64)?.unwrap_or(1);
        if !(min_share..=full_share).contains(&new_share) {
            return Err(DaoError::InvalidContent(format!(
                "time share {new_share} outside {min_share}..={full_share}"
            )));
        }

        let start = optional(adjust_info, fields::DETAILS, fields::FIXED_START_DATE, FlexValue::as_time_point)?
            .unwrap_or_else(|| self.now());
        let current = self.current_time_share(&assignment_hash)?;
        if start <= current.start {
            return Err(DaoError::InvalidContent(format!(
                "commitment change must start after {}",
                current.start
            )));
        }

        let mut write = self.store.writer();
        let next = write.fresh_document(
            &self.config.dao_account,
            time_share_content(&assignment_hash, new_share, start),
        )?;
        write.edge(&current.hash, &next.hash, labels::NEXT_TIME_SHARE);
        write.edge(&assignment_hash, &next.hash, labels::LAST_TIME_SHARE);
        write.commit()?;

        info!(assignment = %assignment_hash, issuer = %issuer, share = new_share, start = %start, "Commitment adjusted");
        Ok(next)
    }
}
