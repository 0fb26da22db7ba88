// SPDX-License-Identifier: Apache-2.0

use super::{merge_fields, CollectionPath, DocPath, DocumentStore, StoreError, TxDecide, WriteOp};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// In-process backend. Serves as the test double and as the zero-setup dev
/// store; the single map mutex held across the decide step gives the same
/// transaction guarantee the sqlite backend gets from an exclusive
/// transaction.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
    /// Failure injection for best-effort write paths.
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_locked(
        docs: &mut BTreeMap<String, Value>,
        op: WriteOp,
    ) -> Result<(), StoreError> {
        match op {
            WriteOp::Set { path, fields } => {
                if !fields.is_object() {
                    return Err(StoreError::Invalid(
                        "document fields must be a JSON object".to_string(),
                    ));
                }
                docs.insert(path.as_key(), fields);
            }
            WriteOp::Merge { path, fields } => {
                let key = path.as_key();
                let merged = merge_fields(docs.get(&key).cloned(), &fields)?;
                docs.insert(key, merged);
            }
            WriteOp::Delete { path } => {
                docs.remove(&path.as_key());
            }
        }
        Ok(())
    }

    fn check_write_failure(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.lock().await.get(&path.as_key()).cloned())
    }

    async fn apply(&self, op: WriteOp) -> Result<(), StoreError> {
        self.check_write_failure()?;
        let mut docs = self.docs.lock().await;
        Self::apply_locked(&mut docs, op)
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Value)>, StoreError> {
        let prefix = format!("{}/", collection.as_key());
        let docs = self.docs.lock().await;
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, value)| (key[prefix.len()..].to_string(), value.clone()))
            .collect())
    }

    async fn run_transaction(
        &self,
        reads: Vec<DocPath>,
        decide: TxDecide,
    ) -> Result<Value, StoreError> {
        self.check_write_failure()?;
        let mut docs = self.docs.lock().await;
        let snapshot: Vec<Option<Value>> = reads
            .iter()
            .map(|path| docs.get(&path.as_key()).cloned())
            .collect();
        let plan = decide(&snapshot).map_err(StoreError::Aborted)?;
        for op in plan.writes {
            Self::apply_locked(&mut docs, op)?;
        }
        Ok(plan.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TxPlan;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_merge_delete_round_trip() {
        let store = MemoryStore::new();
        let path = DocPath::new(["farmers", "u1"]).unwrap();
        store
            .apply(WriteOp::Set {
                path: path.clone(),
                fields: json!({"name": "Amina"}),
            })
            .await
            .unwrap();
        store
            .apply(WriteOp::Merge {
                path: path.clone(),
                fields: json!({"paidAccess": true}),
            })
            .await
            .unwrap();
        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc["name"], "Amina");
        assert_eq!(doc["paidAccess"], true);
        store.apply(WriteOp::Delete { path: path.clone() }).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_only_direct_children() {
        let store = MemoryStore::new();
        for key in [
            ["farmers", "u1", "advisories", "a1"],
            ["farmers", "u1", "advisories", "a2"],
        ] {
            store
                .apply(WriteOp::Set {
                    path: DocPath::new(key).unwrap(),
                    fields: json!({"advice": "x"}),
                })
                .await
                .unwrap();
        }
        store
            .apply(WriteOp::Set {
                path: DocPath::new(["farmers", "u1"]).unwrap(),
                fields: json!({"name": "Amina"}),
            })
            .await
            .unwrap();
        let advisories = store
            .list(&CollectionPath::new(["farmers", "u1", "advisories"]).unwrap())
            .await
            .unwrap();
        assert_eq!(advisories.len(), 2);
        assert_eq!(advisories[0].0, "a1");
    }

    #[tokio::test]
    async fn aborted_transaction_writes_nothing() {
        let store = MemoryStore::new();
        let path = DocPath::new(["access_codes", "X"]).unwrap();
        let write_path = path.clone();
        let err = store
            .run_transaction(
                vec![path.clone()],
                Box::new(move |_| {
                    let _ = WriteOp::Set {
                        path: write_path,
                        fields: json!({"uses": 1}),
                    };
                    Err("Code has expired".to_string())
                }),
            )
            .await
            .expect_err("abort");
        assert_eq!(err, StoreError::Aborted("Code has expired".to_string()));
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transaction_sees_and_applies_writes() {
        let store = MemoryStore::new();
        let path = DocPath::new(["access_codes", "X"]).unwrap();
        let tx_path = path.clone();
        let out = store
            .run_transaction(
                vec![path.clone()],
                Box::new(move |snapshot| {
                    assert!(snapshot[0].is_none());
                    Ok(TxPlan {
                        writes: vec![WriteOp::Merge {
                            path: tx_path,
                            fields: json!({"uses": 1}),
                        }],
                        output: json!({"uses": 1}),
                    })
                }),
            )
            .await
            .unwrap();
        assert_eq!(out["uses"], 1);
        assert_eq!(store.get(&path).await.unwrap().unwrap()["uses"], 1);
    }
}
