use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use docgraph_database::basic_db::{SafeDatabase, TableWrite};
use tracing::{debug, info};

use crate::error::{DaoError, Result};
use crate::external::Clock;
use crate::graph::edge::{Edge, EdgeIndex};
use crate::parser::{Checksum256, ContentGroup, Document, Name};

const DOCUMENTS: &str = "documents";
const EDGES: &str = "edges";

fn edge_key(sequence: u64) -> String {
    format!("{:020}", sequence)
}

pub struct GraphStore<D: SafeDatabase> {
    db: D,
    index: RwLock<EdgeIndex>,
    clock: Arc<dyn Clock>,
}

impl<D: SafeDatabase> GraphStore<D> {
    pub fn open(db: D, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut index = EdgeIndex::default();
        for (_, value) in db.read_all(EDGES)? {
            let edge: Edge = serde_json::from_slice(&value)?;
            index.insert(edge);
        }
        info!(edges = index.len(), "Opened document graph");

        Ok(Self { db, index: RwLock::new(index), clock })
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn index(&self) -> Result<RwLockReadGuard<'_, EdgeIndex>> {
        self.index.read().map_err(|_| DaoError::Poisoned)
    }

    fn index_mut(&self) -> Result<RwLockWriteGuard<'_, EdgeIndex>> {
        self.index.write().map_err(|_| DaoError::Poisoned)
    }

    pub fn writer(&self) -> GraphWrite<'_, D> {
        GraphWrite {
            store: self,
            documents: Vec::new(),
            fresh: HashSet::new(),
            edges: Vec::new(),
        }
    }

    pub fn create_document(&self, creator: &Name, content_groups: Vec<ContentGroup>) -> Result<Document> {
        let mut write = self.writer();
        let document = write.document(creator, content_groups)?;
        write.commit()?;
        Ok(document)
    }

    pub fn create_fresh_document(&self, creator: &Name, content_groups: Vec<ContentGroup>) -> Result<Document> {
        let mut write = self.writer();
        let document = write.fresh_document(creator, content_groups)?;
        write.commit()?;
        Ok(document)
    }

    pub fn create_edge(&self, from: &Checksum256, to: &Checksum256, name: &str) -> Result<Edge> {
        let mut write = self.writer();
        write.edge(from, to, name);
        let mut edges = write.commit()?;
        edges.pop().ok_or_else(|| DaoError::NotFound(format!("edge {name}")))
    }

    pub fn document_exists(&self, hash: &Checksum256) -> Result<bool> {
        Ok(self.db.read(&hash.to_hex(), DOCUMENTS)?.is_some())
    }

    pub fn load_document(&self, hash: &Checksum256) -> Result<Document> {
        match self.db.read(&hash.to_hex(), DOCUMENTS)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(DaoError::NotFound(format!("document {hash}"))),
        }
    }

    pub fn edge_exists(&self, from: &Checksum256, to: &Checksum256, name: &str) -> Result<bool> {
        Ok(self.index()?.exists(from, to, name))
    }

    pub fn get_last_document_of_edge(&self, name: &str) -> Result<Document> {
        let target = self.index()?.last_named(name).map(|edge| edge.to);
        match target {
            Some(hash) => self.load_document(&hash),
            None => Err(DaoError::NotFound(format!("edge {name}"))),
        }
    }

    pub fn get_last_document_of_edge_from(&self, from: &Checksum256, name: &str) -> Result<Document> {
        let target = self.index()?.last_from_named(from, name).map(|edge| edge.to);
        match target {
            Some(hash) => self.load_document(&hash),
            None => Err(DaoError::NotFound(format!("edge {from} --{name}-->"))),
        }
    }

    pub fn edges_from(&self, from: &Checksum256, name: &str) -> Result<Vec<Edge>> {
        Ok(self.index()?.from_named(from, name).cloned().collect())
    }

    pub fn edges_to(&self, to: &Checksum256, name: &str) -> Result<Vec<Edge>> {
        Ok(self.index()?.to_named(to, name).cloned().collect())
    }

    pub fn edges_of(&self, node: &Checksum256) -> Result<Vec<Edge>> {
        Ok(self.index()?.touching(node).cloned().collect())
    }
}

/// A batch of documents and edges applied as one unit. Nothing is visible
/// until [`commit`](GraphWrite::commit) succeeds.
pub struct GraphWrite<'a, D: SafeDatabase> {
    store: &'a GraphStore<D>,
    documents: Vec<Document>,
    fresh: HashSet<Checksum256>,
    edges: Vec<(Checksum256, Checksum256, String)>,
}

impl<'a, D: SafeDatabase> GraphWrite<'a, D> {
    fn staged(&self, hash: &Checksum256) -> Option<&Document> {
        self.documents.iter().find(|document| document.hash == *hash)
    }

    pub fn document(&mut self, creator: &Name, content_groups: Vec<ContentGroup>) -> Result<Document> {
        let hash = Document::hash_content(&content_groups)?;
        if let Some(document) = self.staged(&hash) {
            return Ok(document.clone());
        }
        if self.store.document_exists(&hash)? {
            return self.store.load_document(&hash);
        }

        let document = Document {
            hash,
            creator: creator.clone(),
            content_groups,
            created_at: self.store.clock.now(),
        };
        self.documents.push(document.clone());
        Ok(document)
    }

    pub fn fresh_document(&mut self, creator: &Name, content_groups: Vec<ContentGroup>) -> Result<Document> {
        let hash = Document::hash_content(&content_groups)?;
        if self.staged(&hash).is_some() || self.store.document_exists(&hash)? {
            return Err(DaoError::DuplicateContent(hash));
        }
        let document = self.document(creator, content_groups)?;
        self.fresh.insert(hash);
        Ok(document)
    }

    pub fn edge(&mut self, from: &Checksum256, to: &Checksum256, name: &str) {
        self.edges.push((*from, *to, name.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.edges.is_empty()
    }

    pub fn commit(self) -> Result<Vec<Edge>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut index = self.store.index_mut()?;

        let mut known: HashMap<Checksum256, bool> = self
            .documents
            .iter()
            .map(|document| (document.hash, true))
            .collect();
        for (from, to, name) in &self.edges {
            for endpoint in [from, to] {
                let present = match known.get(endpoint) {
                    Some(present) => *present,
                    None => {
                        let present = self.store.document_exists(endpoint)?;
                        known.insert(*endpoint, present);
                        present
                    }
                };
                if !present {
                    return Err(DaoError::DanglingReference {
                        from: *from,
                        to: *to,
                        name: name.clone(),
                    });
                }
            }
        }

        let now = self.store.clock.now();
        let mut sequence = index.next_sequence();
        let mut rows = Vec::with_capacity(self.documents.len() + self.edges.len());
        let mut edges = Vec::with_capacity(self.edges.len());

        // another batch may have stored the same content since staging
        for document in &self.documents {
            if self.store.document_exists(&document.hash)? {
                if self.fresh.contains(&document.hash) {
                    return Err(DaoError::DuplicateContent(document.hash));
                }
                continue;
            }
            rows.push(TableWrite::new(DOCUMENTS, document.hash.to_hex(), serde_json::to_vec(document)?));
        }
        for (from, to, name) in self.edges {
            let edge = Edge { from, to, name, created_at: now, sequence };
            rows.push(TableWrite::new(EDGES, edge_key(sequence), serde_json::to_vec(&edge)?));
            edges.push(edge);
            sequence += 1;
        }

        self.store.db.commit(&rows)?;

        for edge in &edges {
            debug!(from = %edge.from, to = %edge.to, name = %edge.name, "Edge written");
            index.insert(edge.clone());
        }

        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ManualClock;
    use crate::parser::FlexValue;
    use chrono::{Duration, TimeZone, Utc};
    use docgraph_database::basic_db::InnerDatabase;

    struct Fixture {
        store: GraphStore<InnerDatabase>,
        clock: Arc<ManualClock>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap()));
        let db = InnerDatabase::new(dir.path()).unwrap();
        let store = GraphStore::open(db, clock.clone()).unwrap();
        Fixture { store, clock, _dir: dir }
    }

    fn alice() -> Name {
        Name::new("alice").unwrap()
    }

    fn groups(title: &str) -> Vec<ContentGroup> {
        vec![ContentGroup::labeled("details").with("title", title)]
    }

    #[test]
    fn test_create_document_is_idempotent() {
        let f = fixture();
        let first = f.store.create_document(&alice(), groups("one")).unwrap();
        f.clock.advance(Duration::seconds(5));
        let again = f.store.create_document(&Name::new("bob").unwrap(), groups("one")).unwrap();

        assert_eq!(first.hash, again.hash);
        assert_eq!(again.creator, alice());
        assert_eq!(again.created_at, first.created_at);

        let loaded = f.store.load_document(&first.hash).unwrap();
        assert!(loaded.is_equal(&first));
    }

    #[test]
    fn test_fresh_document_rejects_duplicates() {
        let f = fixture();
        f.store.create_fresh_document(&alice(), groups("one")).unwrap();
        let err = f.store.create_fresh_document(&alice(), groups("one")).unwrap_err();
        assert!(matches!(err, DaoError::DuplicateContent(_)));
    }

    #[test]
    fn test_fresh_document_checked_again_at_commit() {
        let f = fixture();
        let anchor = f.store.create_document(&alice(), groups("anchor")).unwrap();

        let mut first = f.store.writer();
        let mut second = f.store.writer();
        let staged = first.fresh_document(&alice(), groups("one")).unwrap();
        second.fresh_document(&Name::new("bob").unwrap(), groups("one")).unwrap();
        second.edge(&anchor.hash, &staged.hash, "link");

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, DaoError::DuplicateContent(hash) if hash == staged.hash));
        assert!(f.store.edges_from(&anchor.hash, "link").unwrap().is_empty());
        assert_eq!(f.store.load_document(&staged.hash).unwrap().creator, alice());
    }

    #[test]
    fn test_concurrent_stage_keeps_first_stored_copy() {
        let f = fixture();
        let mut first = f.store.writer();
        let mut second = f.store.writer();
        let staged = first.document(&alice(), groups("one")).unwrap();
        f.clock.advance(Duration::seconds(5));
        second.document(&Name::new("bob").unwrap(), groups("one")).unwrap();

        first.commit().unwrap();
        second.commit().unwrap();

        let stored = f.store.load_document(&staged.hash).unwrap();
        assert_eq!(stored.creator, alice());
        assert_eq!(stored.created_at, staged.created_at);
    }

    #[test]
    fn test_edge_requires_both_endpoints() {
        let f = fixture();
        let a = f.store.create_document(&alice(), groups("a")).unwrap();
        let ghost = Checksum256::digest(b"ghost");

        let err = f.store.create_edge(&a.hash, &ghost, "owns").unwrap_err();
        assert!(matches!(err, DaoError::DanglingReference { .. }));
        assert!(!f.store.edge_exists(&a.hash, &ghost, "owns").unwrap());
    }

    #[test]
    fn test_failed_batch_leaves_no_trace() {
        let f = fixture();
        let a = f.store.create_document(&alice(), groups("a")).unwrap();
        let ghost = Checksum256::digest(b"ghost");

        let mut write = f.store.writer();
        let b = write.document(&alice(), groups("b")).unwrap();
        write.edge(&a.hash, &b.hash, "link");
        write.edge(&b.hash, &ghost, "link");
        assert!(write.commit().is_err());

        assert!(!f.store.document_exists(&b.hash).unwrap());
        assert!(f.store.edges_from(&a.hash, "link").unwrap().is_empty());
    }

    #[test]
    fn test_edges_may_point_at_documents_in_the_same_batch() {
        let f = fixture();
        let mut write = f.store.writer();
        let a = write.document(&alice(), groups("a")).unwrap();
        let b = write.document(&alice(), groups("b")).unwrap();
        write.edge(&a.hash, &b.hash, "link");
        let edges = write.commit().unwrap();

        assert_eq!(edges.len(), 1);
        assert!(f.store.edge_exists(&a.hash, &b.hash, "link").unwrap());
    }

    #[test]
    fn test_last_document_of_edge() {
        let f = fixture();
        let root = f.store.create_document(&alice(), groups("root")).unwrap();
        let first = f.store.create_document(&alice(), groups("first")).unwrap();
        let second = f.store.create_document(&alice(), groups("second")).unwrap();

        assert!(matches!(
            f.store.get_last_document_of_edge("proposal"),
            Err(DaoError::NotFound(_))
        ));

        f.store.create_edge(&root.hash, &first.hash, "proposal").unwrap();
        f.store.create_edge(&root.hash, &second.hash, "proposal").unwrap();
        assert_eq!(f.store.get_last_document_of_edge("proposal").unwrap().hash, second.hash);

        // same timestamp, later insert wins
        f.store.create_edge(&root.hash, &first.hash, "proposal").unwrap();
        assert_eq!(f.store.get_last_document_of_edge("proposal").unwrap().hash, first.hash);
        assert_eq!(
            f.store.get_last_document_of_edge_from(&root.hash, "proposal").unwrap().hash,
            first.hash
        );
        assert_eq!(f.store.edges_from(&root.hash, "proposal").unwrap().len(), 3);
    }

    #[test]
    fn test_reopen_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (a, b) = {
            let store = GraphStore::open(InnerDatabase::new(dir.path()).unwrap(), clock.clone()).unwrap();
            let a = store.create_document(&alice(), groups("a")).unwrap();
            let b = store.create_document(&alice(), groups("b")).unwrap();
            store.create_edge(&a.hash, &b.hash, "link").unwrap();
            store.create_edge(&b.hash, &a.hash, "back").unwrap();
            (a, b)
        };

        let store = GraphStore::open(InnerDatabase::new(dir.path()).unwrap(), clock).unwrap();
        assert!(store.edge_exists(&a.hash, &b.hash, "link").unwrap());
        assert_eq!(store.edges_of(&a.hash).unwrap().len(), 2);

        let edge = store.create_edge(&a.hash, &b.hash, "link").unwrap();
        assert_eq!(edge.sequence, 3);
        assert_eq!(
            store.load_document(&b.hash).unwrap().get("details", "title"),
            Some(&FlexValue::from("b"))
        );
    }
}
