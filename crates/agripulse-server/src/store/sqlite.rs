// SPDX-License-Identifier: Apache-2.0

use super::{merge_fields, CollectionPath, DocPath, DocumentStore, StoreError, TxDecide, WriteOp};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Durable backend: one `documents` table keyed by the slash-joined path.
/// A single connection serialized behind a mutex keeps every transaction
/// exclusive, which is exactly the guarantee the cap invariant needs; all
/// I/O runs on the blocking pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    path TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    fields TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
";

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Backend(format!("open failed: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Backend(format!("pragma failed: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::Backend(format!("pragma failed: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Backend(format!("schema failed: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("connection poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }
}

fn read_doc(conn: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT fields FROM documents WHERE path = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::Backend(format!("read failed: {e}")))?;
    match raw {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Backend(format!("stored document corrupt: {e}"))),
        None => Ok(None),
    }
}

fn write_doc(conn: &Connection, path: &DocPath, fields: &Value) -> Result<(), StoreError> {
    let text = serde_json::to_string(fields)
        .map_err(|e| StoreError::Backend(format!("serialize failed: {e}")))?;
    conn.execute(
        "INSERT INTO documents (path, collection, fields, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(path) DO UPDATE SET fields = ?3, updated_at = ?4",
        params![
            path.as_key(),
            path.collection_key(),
            text,
            Utc::now().to_rfc3339()
        ],
    )
    .map_err(|e| StoreError::Backend(format!("write failed: {e}")))?;
    Ok(())
}

fn exec_op(conn: &Connection, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Set { path, fields } => {
            if !fields.is_object() {
                return Err(StoreError::Invalid(
                    "document fields must be a JSON object".to_string(),
                ));
            }
            write_doc(conn, &path, &fields)
        }
        WriteOp::Merge { path, fields } => {
            let existing = read_doc(conn, &path.as_key())?;
            let merged = merge_fields(existing, &fields)?;
            write_doc(conn, &path, &merged)
        }
        WriteOp::Delete { path } => {
            conn.execute(
                "DELETE FROM documents WHERE path = ?1",
                params![path.as_key()],
            )
            .map_err(|e| StoreError::Backend(format!("delete failed: {e}")))?;
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        let key = path.as_key();
        self.with_conn(move |conn| read_doc(conn, &key)).await
    }

    async fn apply(&self, op: WriteOp) -> Result<(), StoreError> {
        self.with_conn(move |conn| exec_op(conn, op)).await
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Value)>, StoreError> {
        let key = collection.as_key();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT path, fields FROM documents WHERE collection = ?1 ORDER BY path",
                )
                .map_err(|e| StoreError::Backend(format!("prepare failed: {e}")))?;
            let rows = stmt
                .query_map(params![key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| StoreError::Backend(format!("query failed: {e}")))?;
            let mut out = Vec::new();
            for row in rows {
                let (path, text) =
                    row.map_err(|e| StoreError::Backend(format!("row failed: {e}")))?;
                let id = path.rsplit('/').next().unwrap_or_default().to_string();
                let fields: Value = serde_json::from_str(&text)
                    .map_err(|e| StoreError::Backend(format!("stored document corrupt: {e}")))?;
                out.push((id, fields));
            }
            Ok(out)
        })
        .await
    }

    async fn run_transaction(
        &self,
        reads: Vec<DocPath>,
        decide: TxDecide,
    ) -> Result<Value, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| StoreError::Backend(format!("begin failed: {e}")))?;
            let mut snapshot = Vec::with_capacity(reads.len());
            for path in &reads {
                snapshot.push(read_doc(&tx, &path.as_key())?);
            }
            let plan = decide(&snapshot).map_err(StoreError::Aborted)?;
            for op in plan.writes {
                exec_op(&tx, op)?;
            }
            tx.commit()
                .map_err(|e| StoreError::Backend(format!("commit failed: {e}")))?;
            Ok(plan.output)
        })
        .await
    }
}
