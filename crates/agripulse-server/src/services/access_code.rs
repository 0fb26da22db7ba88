// SPDX-License-Identifier: Apache-2.0

use crate::clock::Clock;
use crate::store::{DocPath, DocumentStore, StoreError, TxPlan, WriteOp};
use crate::upstream::AuthUser;
use agripulse_ledger::{decide_redemption, Redemption};
use agripulse_model::{AccessCodeState, CodeUseRecord};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCodeError {
    /// The submitted value is not the configured code.
    InvalidCode,
    /// The cap has been reached; no mutation happened.
    Expired(String),
    Store(StoreError),
}

impl Display for AccessCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCode => write!(f, "Invalid code"),
            Self::Expired(msg) => write!(f, "{msg}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AccessCodeError {}

/// Guard around the shared promotional code: a capped global counter with
/// per-consumer audit records, all mutation inside one store transaction.
pub struct AccessCodeService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    code_value: String,
    default_max_uses: u64,
}

impl AccessCodeService {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        code_value: String,
        default_max_uses: u64,
    ) -> Self {
        Self {
            store,
            clock,
            code_value,
            default_max_uses,
        }
    }

    fn code_path(&self) -> Result<DocPath, StoreError> {
        DocPath::new(["access_codes", self.code_value.as_str()])
    }

    fn audit_path(&self, uid: &str) -> Result<DocPath, StoreError> {
        DocPath::new(["access_codes", self.code_value.as_str(), "uses", uid])
    }

    /// Creates the code document when absent. Run once at startup; a merge
    /// write keeps an operator-tuned cap intact.
    pub async fn seed(&self) -> Result<(), StoreError> {
        let path = self.code_path()?;
        if self.store.get(&path).await?.is_none() {
            self.store
                .apply(WriteOp::Merge {
                    path,
                    fields: json!({
                        "uses": 0,
                        "maxUses": self.default_max_uses,
                        "createdAt": self.clock.now().to_rfc3339(),
                    }),
                })
                .await?;
        }
        Ok(())
    }

    /// Pure read: reports validity and counters without reserving a slot.
    pub async fn check(&self, code: &str) -> Result<AccessCodeState, AccessCodeError> {
        if code != self.code_value {
            return Err(AccessCodeError::InvalidCode);
        }
        let path = self.code_path().map_err(AccessCodeError::Store)?;
        let doc = self.store.get(&path).await.map_err(AccessCodeError::Store)?;
        let state = AccessCodeState::from_document(doc.as_ref(), self.default_max_uses);
        if state.exhausted() {
            return Err(AccessCodeError::Expired("Code has expired".to_string()));
        }
        Ok(state)
    }

    /// Atomic consumption. With a consumer identity the redemption is
    /// audited and idempotent per uid; without one (server-to-server path)
    /// a slot is always burned and no audit record exists to key on.
    pub async fn consume(
        &self,
        code: &str,
        consumer: Option<&AuthUser>,
    ) -> Result<AccessCodeState, AccessCodeError> {
        if code != self.code_value {
            return Err(AccessCodeError::InvalidCode);
        }
        let code_path = self.code_path().map_err(AccessCodeError::Store)?;
        let audit_path = match consumer {
            Some(user) => Some(self.audit_path(&user.uid).map_err(AccessCodeError::Store)?),
            None => None,
        };
        let mut reads = vec![code_path.clone()];
        if let Some(path) = &audit_path {
            reads.push(path.clone());
        }

        let default_max_uses = self.default_max_uses;
        let now = self.clock.now();
        let consumer = consumer.cloned();
        let output = self
            .store
            .run_transaction(
                reads,
                Box::new(move |snapshot: &[Option<Value>]| {
                    let state =
                        AccessCodeState::from_document(snapshot[0].as_ref(), default_max_uses);
                    let already_redeemed =
                        audit_path.is_some() && snapshot.get(1).is_some_and(Option::is_some);
                    let redemption = decide_redemption(&state, already_redeemed)
                        .map_err(|e| e.to_string())?;
                    let (uses, max_uses) = redemption.counters();
                    let mut writes = Vec::new();
                    if matches!(redemption, Redemption::Granted { .. }) {
                        writes.push(WriteOp::Merge {
                            path: code_path,
                            fields: json!({
                                "uses": uses,
                                "maxUses": max_uses,
                                "lastUsed": now.to_rfc3339(),
                            }),
                        });
                        if let (Some(path), Some(user)) = (audit_path, consumer) {
                            let record = CodeUseRecord {
                                uid: user.uid,
                                email: user.email,
                                used_at: now,
                            };
                            let fields = serde_json::to_value(&record)
                                .map_err(|e| format!("audit record serialize failed: {e}"))?;
                            writes.push(WriteOp::Set { path, fields });
                        }
                    }
                    Ok(TxPlan {
                        writes,
                        output: json!({ "uses": uses, "maxUses": max_uses }),
                    })
                }),
            )
            .await
            .map_err(|err| match err {
                StoreError::Aborted(msg) => AccessCodeError::Expired(msg),
                other => AccessCodeError::Store(other),
            })?;

        Ok(AccessCodeState {
            uses: output.get("uses").and_then(Value::as_u64).unwrap_or(0),
            max_uses: output
                .get("maxUses")
                .and_then(Value::as_u64)
                .unwrap_or(self.default_max_uses),
            last_used: Some(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{CollectionPath, MemoryStore};
    use chrono::TimeZone;
    use chrono::Utc;

    fn service(store: Arc<MemoryStore>) -> AccessCodeService {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        ));
        AccessCodeService::new(store, clock, "HARVEST-GATE".to_string(), 3)
    }

    fn consumer(uid: &str) -> AuthUser {
        AuthUser {
            uid: uid.to_string(),
            email: Some(format!("{uid}@example.test")),
        }
    }

    #[tokio::test]
    async fn wrong_code_is_rejected_without_touching_the_store() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        assert_eq!(
            svc.check("WRONG").await.unwrap_err(),
            AccessCodeError::InvalidCode
        );
        assert_eq!(
            svc.consume("WRONG", None).await.unwrap_err(),
            AccessCodeError::InvalidCode
        );
        let path = DocPath::new(["access_codes", "HARVEST-GATE"]).unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audited_consume_increments_and_writes_the_audit_record() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        let state = svc
            .consume("HARVEST-GATE", Some(&consumer("u1")))
            .await
            .unwrap();
        assert_eq!((state.uses, state.max_uses), (1, 3));
        let audit = store
            .list(&CollectionPath::new(["access_codes", "HARVEST-GATE", "uses"]).unwrap())
            .await
            .unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].1["uid"], "u1");
    }

    #[tokio::test]
    async fn repeat_consume_by_the_same_uid_burns_no_second_slot() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        svc.consume("HARVEST-GATE", Some(&consumer("u1")))
            .await
            .unwrap();
        let state = svc
            .consume("HARVEST-GATE", Some(&consumer("u1")))
            .await
            .unwrap();
        assert_eq!(state.uses, 1);
    }

    #[tokio::test]
    async fn cap_abort_leaves_no_partial_state() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        for uid in ["u1", "u2", "u3"] {
            svc.consume("HARVEST-GATE", Some(&consumer(uid)))
                .await
                .unwrap();
        }
        let err = svc
            .consume("HARVEST-GATE", Some(&consumer("u4")))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessCodeError::Expired(_)));
        let audit = store
            .list(&CollectionPath::new(["access_codes", "HARVEST-GATE", "uses"]).unwrap())
            .await
            .unwrap();
        assert_eq!(audit.len(), 3);
        let code_doc = store
            .get(&DocPath::new(["access_codes", "HARVEST-GATE"]).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code_doc["uses"], 3);
    }

    #[tokio::test]
    async fn unattributed_consume_writes_no_audit_record() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        let state = svc.consume("HARVEST-GATE", None).await.unwrap();
        assert_eq!(state.uses, 1);
        let audit = store
            .list(&CollectionPath::new(["access_codes", "HARVEST-GATE", "uses"]).unwrap())
            .await
            .unwrap();
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn seed_creates_the_counter_once() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(Arc::clone(&store));
        svc.seed().await.unwrap();
        svc.consume("HARVEST-GATE", None).await.unwrap();
        // a second seed must not reset the counter
        svc.seed().await.unwrap();
        let state = svc.check("HARVEST-GATE").await.unwrap();
        assert_eq!(state.uses, 1);
    }
}
