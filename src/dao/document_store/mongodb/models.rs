use mongodb::bson::{Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};

use crate::dao::document::{DocPath, Document};

/// One stored document, addressed by its full path and indexed by its parent collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPathDocument {
    #[serde(rename = "_id")]
    /// Full document path, used as `_id`.
    pub path: String,
    /// Parent collection path, indexed for listings.
    pub parent: String,
    /// Room root the document belongs to.
    pub root: String,
    #[serde(default)]
    /// Document fields.
    pub data: Document,
}

impl MongoPathDocument {
    /// Wrap `data` stored at `path`.
    pub fn new(path: &DocPath, data: Document) -> Self {
        Self {
            path: path.to_string(),
            parent: path
                .parent()
                .map(|parent| parent.to_string())
                .unwrap_or_default(),
            root: path.root().to_string(),
            data,
        }
    }
}

/// Filter matching exactly `path`.
pub fn path_filter(path: &DocPath) -> BsonDocument {
    doc! { "_id": path.as_str() }
}

/// Filter matching the direct children of `collection`.
pub fn children_filter(collection: &DocPath) -> BsonDocument {
    doc! { "parent": collection.as_str() }
}
