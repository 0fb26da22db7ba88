// SPDX-License-Identifier: Apache-2.0

use agripulse_server::services::{AccessCodeError, AccessCodeService};
use agripulse_server::store::{CollectionPath, DocPath, DocumentStore, MemoryStore, SqliteStore};
use agripulse_server::upstream::AuthUser;
use agripulse_server::{Clock, SystemClock};
use std::sync::Arc;
use tempfile::tempdir;

async fn hammer(store: Arc<dyn DocumentStore>, cap: u64, attempts: u64) {
    let service = Arc::new(AccessCodeService::new(
        Arc::clone(&store),
        Arc::new(SystemClock) as Arc<dyn Clock>,
        "HARVEST-GATE".to_string(),
        cap,
    ));
    service.seed().await.expect("seed");

    let mut tasks = Vec::new();
    for i in 0..attempts {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            let user = AuthUser {
                uid: format!("u{i}"),
                email: None,
            };
            service.consume("HARVEST-GATE", Some(&user)).await
        }));
    }

    let mut granted = 0u64;
    let mut expired = 0u64;
    for task in tasks {
        match task.await.expect("join") {
            Ok(_) => granted += 1,
            Err(AccessCodeError::Expired(_)) => expired += 1,
            Err(other) => panic!("unexpected consume failure: {other}"),
        }
    }

    assert_eq!(granted, cap, "exactly the cap succeeds");
    assert_eq!(expired, attempts - cap);

    let code_doc = store
        .get(&DocPath::new(["access_codes", "HARVEST-GATE"]).unwrap())
        .await
        .unwrap()
        .expect("code doc");
    assert_eq!(code_doc["uses"], cap, "counter never passes the cap");

    let audit = store
        .list(&CollectionPath::new(["access_codes", "HARVEST-GATE", "uses"]).unwrap())
        .await
        .unwrap();
    assert_eq!(
        audit.len() as u64,
        cap,
        "one audit record per granted redemption, none for aborts"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn memory_backend_holds_the_cap_under_concurrency() {
    hammer(Arc::new(MemoryStore::new()), 50, 80).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn sqlite_backend_holds_the_cap_under_concurrency() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("codes.sqlite3")).expect("open sqlite");
    hammer(Arc::new(store), 10, 25).await;
}
