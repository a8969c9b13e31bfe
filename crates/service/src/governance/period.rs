use chrono::{DateTime, Utc};
use docgraph_database::basic_db::SafeDatabase;
use tracing::info;

use crate::error::{DaoError, Result};
use crate::governance::{fields, labels, require, system_type, Dao};
use crate::parser::{Checksum256, ContentGroup, Document, FlexValue};

impl<D: SafeDatabase> Dao<D> {
    pub fn add_period(&self, start: DateTime<Utc>, label: &str) -> Result<Document> {
        self.with_lock(&self.root.hash, || self.add_period_locked(start, label))
    }

    fn add_period_locked(&self, start: DateTime<Utc>, label: &str) -> Result<Document> {
        let root = self.root.hash;
        let previous = match self.store.get_last_document_of_edge_from(&root, labels::PERIOD) {
            Ok(previous) => Some(previous),
            Err(DaoError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        if let Some(previous) = &previous {
            let previous_start = self.period_start(previous)?;
            if start <= previous_start {
                return Err(DaoError::InvalidContent(format!(
                    "period must start after {previous_start}"
                )));
            }
        }

        let mut write = self.store.writer();
        let period = write.fresh_document(
            &self.config.dao_account,
            vec![
                ContentGroup::labeled(fields::DETAILS)
                    .with(fields::START_TIME, start)
                    .with(fields::LABEL, label),
                ContentGroup::labeled(fields::SYSTEM)
                    .with(fields::TYPE, "period")
                    .with(fields::NODE_LABEL, label),
            ],
        )?;
        write.edge(&root, &period.hash, labels::PERIOD);
        if let Some(previous) = &previous {
            write.edge(&previous.hash, &period.hash, labels::NEXT);
        }
        write.commit()?;

        info!(period = %period.hash, start = %start, label, "Period added");
        Ok(period)
    }

    pub fn load_period(&self, hash: &Checksum256) -> Result<Document> {
        let period = self.store.load_document(hash)?;
        if system_type(&period) != Some("period") {
            return Err(DaoError::InvalidContent(format!("{hash} is not a period")));
        }
        Ok(period)
    }

    pub fn period_start(&self, period: &Document) -> Result<DateTime<Utc>> {
        require(&period.content_groups, fields::DETAILS, fields::START_TIME, FlexValue::as_time_point)
    }

    pub fn next_period(&self, period: &Checksum256) -> Result<Option<Document>> {
        match self.store.get_last_document_of_edge_from(period, labels::NEXT) {
            Ok(next) => Ok(Some(next)),
            Err(DaoError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn period_end(&self, period: &Checksum256) -> Result<Option<DateTime<Utc>>> {
        match self.next_period(period)? {
            Some(next) => Ok(Some(self.period_start(&next)?)),
            None => Ok(None),
        }
    }

    pub fn is_period_elapsed(&self, period: &Checksum256) -> Result<bool> {
        Ok(match self.period_end(period)? {
            Some(end) => self.now() >= end,
            None => false,
        })
    }
}
