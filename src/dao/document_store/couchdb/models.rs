use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dao::document::{DocPath, Document};

/// All documents sharing one root (`rooms/{code}`) stored as a single CouchDB document,
/// which makes every batch a single revisioned write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRootDocument {
    #[serde(rename = "_id")]
    /// Aggregate id derived from the room root.
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    /// CouchDB revision; `None` before the first write.
    pub rev: Option<String>,
    /// Stored documents keyed by their full path.
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
}

impl CouchRootDocument {
    /// Aggregate that has never been written.
    pub fn empty(id: String) -> Self {
        Self {
            id,
            rev: None,
            documents: BTreeMap::new(),
        }
    }

    /// Documents stored directly under `collection`, keyed by id.
    pub fn children(&self, collection: &DocPath) -> Vec<(String, Document)> {
        self.documents
            .iter()
            .filter_map(|(raw, document)| {
                let path = DocPath::parse(raw).ok()?;
                path.is_child_of(collection)
                    .then(|| (path.id().to_owned(), document.clone()))
            })
            .collect()
    }
}

/// CouchDB id for the aggregate holding `root` (`rooms/ABC234` -> `rooms::ABC234`).
pub fn root_doc_id(root: &DocPath) -> String {
    root.segments().collect::<Vec<_>>().join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_children_of_collection() {
        let mut doc = CouchRootDocument::empty("rooms::R".into());
        let mut player = Document::new();
        player.insert("name".into(), json!("Ada"));
        doc.documents.insert("rooms/R/players/p1".into(), player);
        doc.documents.insert("rooms/R".into(), Document::new());

        let players = doc.children(&DocPath::parse("rooms/R/players").unwrap());
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].0, "p1");
        assert_eq!(
            root_doc_id(&DocPath::parse("rooms/R").unwrap()),
            "rooms::R"
        );
    }
}
