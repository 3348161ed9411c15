//! Backend-agnostic document model: slash-separated paths, JSON field maps, and
//! the write batches committed atomically by every [`DocumentStore`](super::document_store::DocumentStore).

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::dao::storage::{StorageError, StorageResult};

/// Milliseconds since the Unix epoch, as assigned by the store on commit.
pub type Millis = i64;

/// Field map persisted at a document path.
pub type Document = Map<String, Value>;

/// Slash-separated location of a document or collection (`rooms/ABC123/players/p1`).
///
/// Document paths have an even number of segments, collection paths an odd one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath(String);

impl DocPath {
    /// Build a path from its segments. Empty segments and embedded slashes are rejected.
    pub fn from_segments<I, S>(segments: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() || segment.contains('/') {
                return Err(StorageError::InvalidBatch(format!(
                    "invalid path segment `{segment}`"
                )));
            }
            if !joined.is_empty() {
                joined.push('/');
            }
            joined.push_str(segment);
        }

        if joined.is_empty() {
            return Err(StorageError::InvalidBatch("empty document path".into()));
        }

        Ok(Self(joined))
    }

    /// Parse a raw path previously produced by [`DocPath::as_str`].
    pub fn parse(raw: &str) -> StorageResult<Self> {
        Self::from_segments(raw.split('/'))
    }

    /// Append one segment, yielding a child collection or document path.
    pub fn child(&self, segment: impl AsRef<str>) -> StorageResult<Self> {
        let segment = segment.as_ref();
        if segment.is_empty() || segment.contains('/') {
            return Err(StorageError::InvalidBatch(format!(
                "invalid path segment `{segment}`"
            )));
        }
        Ok(Self(format!("{}/{}", self.0, segment)))
    }

    /// Slash-separated path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment: the document id for document paths.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of the enclosing collection (or document for a collection path).
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_owned()))
    }

    /// Top-level document owning this path (`rooms/{code}` for every room path).
    pub fn root(&self) -> Self {
        let mut parts = self.0.splitn(3, '/');
        match (parts.next(), parts.next()) {
            (Some(collection), Some(id)) => Self(format!("{collection}/{id}")),
            _ => self.clone(),
        }
    }

    /// Whether `self` lives directly inside the `collection` path.
    pub fn is_child_of(&self, collection: &DocPath) -> bool {
        self.parent().as_ref() == Some(collection)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value written into a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Literal JSON value.
    Value(Value),
    /// Replaced by the commit timestamp of the enclosing batch.
    ServerTimestamp,
    /// Added to the current integer value (missing fields count as zero).
    Increment(i64),
}

/// Ordered set of field writes applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(IndexMap<String, FieldValue>);

impl Fields {
    /// No field writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a literal JSON value.
    pub fn value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), FieldValue::Value(value.into()));
        self
    }

    /// Write the commit timestamp of the batch.
    pub fn timestamp(mut self, key: &str) -> Self {
        self.0.insert(key.to_owned(), FieldValue::ServerTimestamp);
        self
    }

    /// Add `delta` to the stored integer.
    pub fn increment(mut self, key: &str, delta: i64) -> Self {
        self.0.insert(key.to_owned(), FieldValue::Increment(delta));
        self
    }

    /// Field writes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Whether no field is written.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create the document, failing the whole batch when it already exists.
    Create {
        /// Target document.
        path: DocPath,
        /// Field writes.
        fields: Fields,
    },
    /// Replace the document entirely.
    Set {
        /// Target document.
        path: DocPath,
        /// Field writes.
        fields: Fields,
    },
    /// Update the listed fields, creating the document when missing.
    Merge {
        /// Target document.
        path: DocPath,
        /// Field writes.
        fields: Fields,
    },
    /// Remove the document if present.
    Delete {
        /// Target document.
        path: DocPath,
    },
}

impl WriteOp {
    /// Document the operation targets.
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Create { path, .. }
            | WriteOp::Set { path, .. }
            | WriteOp::Merge { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }
}

/// All-or-nothing group of writes. Every store applies a batch atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a [`WriteOp::Create`].
    pub fn create(&mut self, path: DocPath, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Create { path, fields });
        self
    }

    /// Queue a [`WriteOp::Set`].
    pub fn set(&mut self, path: DocPath, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Set { path, fields });
        self
    }

    /// Queue a [`WriteOp::Merge`].
    pub fn merge(&mut self, path: DocPath, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Merge { path, fields });
        self
    }

    /// Queue a [`WriteOp::Delete`].
    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    /// Queued operations in order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Distinct top-level roots touched by the batch.
    pub fn roots(&self) -> Vec<DocPath> {
        let mut roots: Vec<DocPath> = Vec::new();
        for op in &self.ops {
            let root = op.path().root();
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Paths touched by the batch, in write order and without duplicates.
    pub fn paths(&self) -> Vec<DocPath> {
        let mut paths: Vec<DocPath> = Vec::new();
        for op in &self.ops {
            if !paths.contains(op.path()) {
                paths.push(op.path().clone());
            }
        }
        paths
    }
}

/// Apply one write to the current value of a document, returning its next value
/// (`None` when the document ends up deleted).
///
/// Shared by every backend so all of them resolve timestamps and increments identically.
pub fn apply_write(
    current: Option<Document>,
    op: &WriteOp,
    committed_at: Millis,
) -> StorageResult<Option<Document>> {
    match op {
        WriteOp::Create { path, fields } => {
            if current.is_some() {
                return Err(StorageError::Conflict {
                    path: path.to_string(),
                });
            }
            Ok(Some(write_fields(Document::new(), fields, committed_at)?))
        }
        WriteOp::Set { fields, .. } => Ok(Some(write_fields(Document::new(), fields, committed_at)?)),
        WriteOp::Merge { fields, .. } => Ok(Some(write_fields(
            current.unwrap_or_default(),
            fields,
            committed_at,
        )?)),
        WriteOp::Delete { .. } => Ok(None),
    }
}

fn write_fields(
    mut document: Document,
    fields: &Fields,
    committed_at: Millis,
) -> StorageResult<Document> {
    for (key, value) in fields.iter() {
        let next = match value {
            FieldValue::Value(value) => value.clone(),
            FieldValue::ServerTimestamp => Value::from(committed_at),
            FieldValue::Increment(delta) => {
                let base = match document.get(key) {
                    None | Some(Value::Null) => 0,
                    Some(existing) => existing.as_i64().ok_or_else(|| {
                        StorageError::InvalidBatch(format!(
                            "cannot increment non-integer field `{key}`"
                        ))
                    })?,
                };
                Value::from(base + delta)
            }
        };
        document.insert(key.clone(), next);
    }
    Ok(document)
}

/// Decode a stored document into a typed model.
pub fn decode<T: DeserializeOwned>(path: &DocPath, document: Document) -> StorageResult<T> {
    serde_json::from_value(Value::Object(document)).map_err(|source| StorageError::Corrupted {
        path: path.to_string(),
        source,
    })
}
