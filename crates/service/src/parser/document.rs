use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::flex::{Checksum256, FlexValue, Name};

/// Label of the item that names a group's role ("details", "pass", ...).
pub const CONTENT_GROUP_LABEL: &str = "content_group_label";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub label: String,
    pub value: FlexValue,
}

impl ContentItem {
    pub fn new(label: impl Into<String>, value: impl Into<FlexValue>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentGroup(pub Vec<ContentItem>);

impl ContentGroup {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn labeled(label: &str) -> Self {
        Self(vec![ContentItem::new(CONTENT_GROUP_LABEL, label)])
    }

    pub fn with(mut self, label: impl Into<String>, value: impl Into<FlexValue>) -> Self {
        self.0.push(ContentItem::new(label, value));
        self
    }

    pub fn push(&mut self, item: ContentItem) {
        self.0.push(item);
    }

    pub fn get(&self, label: &str) -> Option<&FlexValue> {
        self.0.iter().find(|item| item.label == label).map(|item| &item.value)
    }

    pub fn set(&mut self, label: &str, value: FlexValue) {
        match self.0.iter_mut().find(|item| item.label == label) {
            Some(item) => item.value = value,
            None => self.0.push(ContentItem::new(label, value)),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.get(CONTENT_GROUP_LABEL).and_then(FlexValue::as_str)
    }

    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub hash: Checksum256,
    pub creator: Name,
    pub content_groups: Vec<ContentGroup>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn hash_content(content_groups: &[ContentGroup]) -> Result<Checksum256, serde_json::Error> {
        let canonical = serde_json::to_vec(content_groups)?;
        Ok(Checksum256::digest(&canonical))
    }

    pub fn new(
        creator: Name,
        content_groups: Vec<ContentGroup>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let hash = Self::hash_content(&content_groups)?;
        Ok(Self { hash, creator, content_groups, created_at })
    }

    pub fn is_equal(&self, other: &Document) -> bool {
        self.content_eq(&other.content_groups)
    }

    pub fn content_eq(&self, content_groups: &[ContentGroup]) -> bool {
        self.content_groups.as_slice() == content_groups
    }

    pub fn group(&self, label: &str) -> Option<&ContentGroup> {
        self.content_groups.iter().find(|group| group.label() == Some(label))
    }

    pub fn get(&self, group_label: &str, item_label: &str) -> Option<&FlexValue> {
        self.group(group_label).and_then(|group| group.get(item_label))
    }
}
