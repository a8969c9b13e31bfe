use docgraph_database::basic_db::SafeDatabase;
use tracing::info;

use crate::error::Result;
use crate::governance::{fields, labels, require, Dao};
use crate::graph::GraphWrite;
use crate::parser::{ContentGroup, Document, FlexValue, CONTENT_GROUP_LABEL};

/// Overlays `edits` onto `original`, matching groups by their
/// `content_group_label`. Unmatched groups are appended; the `system` group
/// and the `original_document` pointer are never copied.
pub fn merge_content(original: &[ContentGroup], edits: &[ContentGroup]) -> Vec<ContentGroup> {
    let mut merged = original.to_vec();
    for group in edits {
        let label = group.label();
        if label == Some(fields::SYSTEM) {
            continue;
        }
        let changes = group
            .items()
            .filter(|item| item.label != CONTENT_GROUP_LABEL && item.label != fields::ORIGINAL_DOCUMENT);

        let target = match label {
            Some(label) => merged.iter_mut().find(|candidate| candidate.label() == Some(label)),
            None => None,
        };
        match target {
            Some(target) => {
                for item in changes {
                    target.set(&item.label, item.value.clone());
                }
            }
            None => {
                let mut added = match label {
                    Some(label) => ContentGroup::labeled(label),
                    None => ContentGroup::new(),
                };
                for item in changes {
                    added.push(item.clone());
                }
                if added.items().any(|item| item.label != CONTENT_GROUP_LABEL) {
                    merged.push(added);
                }
            }
        }
    }
    merged
}

impl<D: SafeDatabase> Dao<D> {
    pub(crate) fn stage_edit(&self, write: &mut GraphWrite<'_, D>, proposal: &Document) -> Result<Document> {
        let original_hash = require(
            &proposal.content_groups,
            fields::DETAILS,
            fields::ORIGINAL_DOCUMENT,
            FlexValue::as_checksum,
        )?;
        let original = self.store.load_document(&original_hash)?;
        let merged = write.document(
            &original.creator,
            merge_content(&original.content_groups, &proposal.content_groups),
        )?;
        if merged.hash == original.hash {
            return Ok(original);
        }

        for edge in self.store.edges_of(&original_hash)? {
            if edge.from == proposal.hash || edge.to == proposal.hash {
                continue;
            }
            let from = if edge.from == original_hash { merged.hash } else { edge.from };
            let to = if edge.to == original_hash { merged.hash } else { edge.to };
            write.edge(&from, &to, &edge.name);
        }
        write.edge(&merged.hash, &original_hash, labels::REPLACES);

        info!(original = %original_hash, merged = %merged.hash, proposal = %proposal.hash, "Edit merged");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Checksum256;

    #[test]
    fn test_merge_overlays_matching_groups() {
        let original = vec![
            ContentGroup::labeled("details")
                .with("title", "Gardener")
                .with("description", "tends the garden"),
            ContentGroup::labeled("system").with("type", "role"),
        ];
        let edits = vec![
            ContentGroup::labeled("details")
                .with("title", "Head Gardener")
                .with("original_document", Checksum256::digest(b"role")),
            ContentGroup::labeled("extra").with("note", "new group"),
            ContentGroup::labeled("system").with("type", "edit"),
        ];

        let merged = merge_content(&original, &edits);
        assert_eq!(
            merged,
            vec![
                ContentGroup::labeled("details")
                    .with("title", "Head Gardener")
                    .with("description", "tends the garden"),
                ContentGroup::labeled("system").with("type", "role"),
                ContentGroup::labeled("extra").with("note", "new group"),
            ]
        );
    }

    #[test]
    fn test_merge_without_changes_is_identity() {
        let original = vec![ContentGroup::labeled("details").with("title", "Gardener")];
        let edits = vec![ContentGroup::labeled("details").with("original_document", Checksum256::digest(b"x"))];
        assert_eq!(merge_content(&original, &edits), original);
    }
}
