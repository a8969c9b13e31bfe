use docgraph_database::basic_db::SafeDatabase;
use tracing::info;

use crate::error::{DaoError, Result};
use crate::governance::{fields, labels, Dao};
use crate::parser::{Checksum256, ContentGroup, Document, Name};

fn member_content(account: &Name) -> Vec<ContentGroup> {
    vec![
        ContentGroup::labeled(fields::DETAILS).with(fields::MEMBER, account.clone()),
        ContentGroup::labeled(fields::SYSTEM)
            .with(fields::TYPE, "member")
            .with(fields::NODE_LABEL, account.as_str()),
    ]
}

impl<D: SafeDatabase> Dao<D> {
    pub fn member_hash(&self, account: &Name) -> Result<Checksum256> {
        Ok(Document::hash_content(&member_content(account))?)
    }

    pub fn enroll(&self, account: &Name) -> Result<Document> {
        let hash = self.member_hash(account)?;
        self.with_lock(&hash, || self.enroll_locked(account, hash))
    }

    fn enroll_locked(&self, account: &Name, hash: Checksum256) -> Result<Document> {
        if self.store.edge_exists(&self.root.hash, &hash, labels::MEMBER)? {
            return self.store.load_document(&hash);
        }

        let mut write = self.store.writer();
        let member = write.document(&self.config.dao_account, member_content(account))?;
        write.edge(&self.root.hash, &member.hash, labels::MEMBER);
        write.edge(&member.hash, &self.root.hash, labels::MEMBER_OF);
        write.commit()?;

        info!(account = %account, member = %member.hash, "Member enrolled");
        Ok(member)
    }

    pub fn member(&self, account: &Name) -> Result<Document> {
        let hash = self.member_hash(account)?;
        if !self.store.edge_exists(&self.root.hash, &hash, labels::MEMBER)? {
            return Err(DaoError::NotFound(format!("member {account}")));
        }
        self.store.load_document(&hash)
    }
}
