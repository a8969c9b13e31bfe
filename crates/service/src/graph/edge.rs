use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::parser::Checksum256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: Checksum256,
    pub to: Checksum256,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub sequence: u64,
}

impl Edge {
    /// Ordering used to decide which edge is "the latest".
    pub fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}

#[derive(Debug, Default)]
pub(crate) struct EdgeIndex {
    log: Vec<Edge>,
    by_name: HashMap<String, Vec<usize>>,
    by_from: HashMap<(Checksum256, String), Vec<usize>>,
    by_to: HashMap<(Checksum256, String), Vec<usize>>,
    by_node: HashMap<Checksum256, Vec<usize>>,
}

impl EdgeIndex {
    pub(crate) fn insert(&mut self, edge: Edge) {
        let position = self.log.len();
        self.by_name.entry(edge.name.clone()).or_default().push(position);
        self.by_from.entry((edge.from, edge.name.clone())).or_default().push(position);
        self.by_to.entry((edge.to, edge.name.clone())).or_default().push(position);
        self.by_node.entry(edge.from).or_default().push(position);
        if edge.to != edge.from {
            self.by_node.entry(edge.to).or_default().push(position);
        }
        self.log.push(edge);
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.log.last().map_or(1, |edge| edge.sequence + 1)
    }

    pub(crate) fn len(&self) -> usize {
        self.log.len()
    }

    fn resolve<'a>(&'a self, positions: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a Edge> + 'a {
        positions
            .into_iter()
            .flatten()
            .map(move |position| &self.log[*position])
    }

    pub(crate) fn from_named(&self, from: &Checksum256, name: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.resolve(self.by_from.get(&(*from, name.to_string())))
    }

    pub(crate) fn to_named(&self, to: &Checksum256, name: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.resolve(self.by_to.get(&(*to, name.to_string())))
    }

    pub(crate) fn touching(&self, node: &Checksum256) -> impl Iterator<Item = &Edge> + '_ {
        self.resolve(self.by_node.get(node))
    }

    pub(crate) fn exists(&self, from: &Checksum256, to: &Checksum256, name: &str) -> bool {
        self.from_named(from, name).any(|edge| edge.to == *to)
    }

    pub(crate) fn last_named(&self, name: &str) -> Option<&Edge> {
        self.resolve(self.by_name.get(name)).max_by_key(|edge| edge.recency())
    }

    pub(crate) fn last_from_named(&self, from: &Checksum256, name: &str) -> Option<&Edge> {
        self.from_named(from, name).max_by_key(|edge| edge.recency())
    }
}
