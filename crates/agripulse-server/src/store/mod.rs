// SPDX-License-Identifier: Apache-2.0

//! Document-store port.
//!
//! The store exposes the collection/document model the service was designed
//! against: JSON documents addressed by alternating collection/id segments,
//! shallow merge writes, and a read-check-write transaction primitive that
//! carries the access-code cap invariant.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Malformed path or non-object fields: a caller bug.
    Invalid(String),
    /// The backend failed; retrying may help, the request gets a 500.
    Backend(String),
    /// A transaction decide step rejected the operation (business rule).
    /// Nothing was written.
    Aborted(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid store request: {msg}"),
            Self::Backend(msg) => write!(f, "store backend failed: {msg}"),
            Self::Aborted(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Path to a collection: an odd run of segments
/// (`farmers/{uid}/advisories`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        validate_segments(&segments)?;
        if segments.len() % 2 == 0 {
            return Err(StoreError::Invalid(
                "collection paths have an odd number of segments".to_string(),
            ));
        }
        Ok(Self { segments })
    }

    pub fn doc(&self, id: &str) -> Result<DocPath, StoreError> {
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        DocPath::new(segments)
    }

    #[must_use]
    pub fn as_key(&self) -> String {
        self.segments.join("/")
    }
}

/// Path to a document: an even run of segments (`farmers/{uid}`,
/// `access_codes/{code}/uses/{uid}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        validate_segments(&segments)?;
        if segments.len() % 2 != 0 {
            return Err(StoreError::Invalid(
                "document paths have an even number of segments".to_string(),
            ));
        }
        Ok(Self { segments })
    }

    #[must_use]
    pub fn as_key(&self) -> String {
        self.segments.join("/")
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Key of the containing collection.
    #[must_use]
    pub fn collection_key(&self) -> String {
        self.segments[..self.segments.len() - 1].join("/")
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

fn validate_segments(segments: &[String]) -> Result<(), StoreError> {
    if segments.is_empty() {
        return Err(StoreError::Invalid("empty path".to_string()));
    }
    for segment in segments {
        if segment.is_empty() || segment.contains('/') {
            return Err(StoreError::Invalid(format!("bad path segment: {segment:?}")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Replace the document wholesale.
    Set { path: DocPath, fields: Value },
    /// Shallow field merge: top-level keys of `fields` overwrite, all other
    /// existing fields survive. Creates the document when absent.
    Merge { path: DocPath, fields: Value },
    Delete { path: DocPath },
}

/// Shallow merge used by both backends.
pub(crate) fn merge_fields(existing: Option<Value>, incoming: &Value) -> Result<Value, StoreError> {
    let Some(incoming) = incoming.as_object() else {
        return Err(StoreError::Invalid(
            "document fields must be a JSON object".to_string(),
        ));
    };
    let mut base: Map<String, Value> = match existing {
        Some(Value::Object(map)) => map,
        Some(_) | None => Map::new(),
    };
    for (key, value) in incoming {
        base.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(base))
}

/// Decide step of a transaction: receives the snapshot of the requested
/// reads (in request order) and returns the writes plus an output payload,
/// or a business abort message. Runs exactly once, with no awaits, while
/// the backend holds the transaction.
pub type TxDecide =
    Box<dyn FnOnce(&[Option<Value>]) -> Result<TxPlan, String> + Send + 'static>;

#[derive(Debug, Default)]
pub struct TxPlan {
    pub writes: Vec<WriteOp>,
    pub output: Value,
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError>;

    async fn apply(&self, op: WriteOp) -> Result<(), StoreError>;

    /// Documents directly inside a collection, as `(id, fields)` pairs in
    /// key order. Audit and history reads only; not a query engine.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Value)>, StoreError>;

    /// Atomic read-check-write. The snapshot, the decide step, and every
    /// write it plans commit as one unit; an abort leaves no trace.
    async fn run_transaction(
        &self,
        reads: Vec<DocPath>,
        decide: TxDecide,
    ) -> Result<Value, StoreError>;
}

/// Deterministic document id for history writes: content-addressed so a
/// retried write lands on the same document instead of duplicating it.
#[must_use]
pub fn content_doc_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..20].to_string()
}
