// SPDX-License-Identifier: Apache-2.0

use crate::store::{DocPath, DocumentStore, WriteOp};
use crate::upstream::IdentityProvider;
use agripulse_api::RollbackDetails;
use std::sync::Arc;
use tracing::{error, warn};

/// Compensating side of the signup saga: when code consumption fails after
/// account creation, the caller rolls the account back here. Auth user
/// first, then the farmer document; each step best-effort, both reported,
/// failures logged for manual cleanup.
pub struct AdminService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl AdminService {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { identity, store }
    }

    pub async fn delete_farmer(&self, uid: &str) -> RollbackDetails {
        let mut details = RollbackDetails::default();

        match self.identity.delete_user(uid).await {
            Ok(true) => details.auth_deleted = true,
            Ok(false) => warn!("auth user {uid} not found during rollback"),
            Err(err) => error!("failed to delete auth user during rollback: {err}"),
        }

        match DocPath::new(["farmers", uid]) {
            Ok(path) => match self.store.apply(WriteOp::Delete { path }).await {
                Ok(()) => details.doc_deleted = true,
                Err(err) => error!("failed to delete farmer document during rollback: {err}"),
            },
            Err(err) => error!("rollback path invalid for {uid}: {err}"),
        }

        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::upstream::FakeIdentity;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn rollback_deletes_both_sides() {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(FakeIdentity::default());
        identity.register("tok", "u1", Some("a@example.test")).await;
        store
            .apply(WriteOp::Set {
                path: DocPath::new(["farmers", "u1"]).unwrap(),
                fields: json!({"name": "Amina"}),
            })
            .await
            .unwrap();

        let service = AdminService::new(
            Arc::clone(&identity) as Arc<dyn IdentityProvider>,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
        );
        let details = service.delete_farmer("u1").await;
        assert!(details.auth_deleted);
        assert!(details.doc_deleted);
        assert!(store
            .get(&DocPath::new(["farmers", "u1"]).unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn missing_auth_user_still_removes_the_document() {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(FakeIdentity::default());
        store
            .apply(WriteOp::Set {
                path: DocPath::new(["farmers", "u2"]).unwrap(),
                fields: json!({}),
            })
            .await
            .unwrap();

        let service = AdminService::new(
            identity as Arc<dyn IdentityProvider>,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
        );
        let details = service.delete_farmer("u2").await;
        assert!(!details.auth_deleted);
        assert!(details.doc_deleted);
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_raised() {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(FakeIdentity::default());
        identity.register("tok", "u3", None).await;
        store.fail_writes.store(true, Ordering::Relaxed);

        let service = AdminService::new(
            identity as Arc<dyn IdentityProvider>,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
        );
        let details = service.delete_farmer("u3").await;
        assert!(details.auth_deleted);
        assert!(!details.doc_deleted);
    }
}
