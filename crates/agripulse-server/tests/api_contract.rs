// SPDX-License-Identifier: Apache-2.0

use agripulse_server::upstream::{
    CompletionClient, GatewayVerification, IdentityProvider, NewsProvider, PaymentGateway,
    WeatherProvider,
};
use agripulse_server::{
    build_router, ApiConfig, AppState, Clock, DocumentStore, FakeCompletion, FakeGateway,
    FakeIdentity, FakeWeather, ManualClock, MemoryStore,
};
use agripulse_server::store::{DocPath, WriteOp};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const ORIGIN: &str = "https://app.example.test";
const ADMIN_SECRET: &str = "shared-ops-secret";

struct Harness {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    identity: Arc<FakeIdentity>,
    gateway: Arc<FakeGateway>,
    completion: Arc<FakeCompletion>,
    clock: Arc<ManualClock>,
}

async fn start(max_uses: u64) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(FakeIdentity::default());
    let gateway = Arc::new(FakeGateway::default());
    let completion = Arc::new(FakeCompletion::default());
    let weather = Arc::new(FakeWeather::default());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
    ));

    let config = ApiConfig {
        admin_secret: Some(ADMIN_SECRET.to_string()),
        access_code: "HARVEST-GATE".to_string(),
        access_code_max_uses: max_uses,
        paystack_public_key: Some("pk_test_123".to_string()),
        cors_allowed_origins: vec![ORIGIN.to_string()],
        public_app_url: "https://app.example.test".to_string(),
        ..ApiConfig::default()
    };

    let state = AppState::new(
        config,
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&identity) as Arc<dyn IdentityProvider>,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        weather as Arc<dyn WeatherProvider>,
        Arc::clone(&completion) as Arc<dyn CompletionClient>,
        None::<Arc<dyn NewsProvider>>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    state.access_codes.seed().await.expect("seed access code");

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

    Harness {
        addr,
        store,
        identity,
        gateway,
        completion,
        clock,
    }
}

async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if let Some(body) = body {
        req.push_str("Content-Type: application/json\r\n");
        req.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    req.push_str("\r\n");
    if let Some(body) = body {
        req.push_str(body);
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).expect("json body")
}

#[tokio::test]
async fn health_and_readiness_report_the_store() {
    let h = start(50).await;
    let (status, _, body) = send_raw(h.addr, "GET", "/healthz", &[], None).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["status"], "ok");

    let (status, _, body) = send_raw(h.addr, "GET", "/readyz", &[], None).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["store"], "memory");
}

#[tokio::test]
async fn code_check_reports_counters_without_consuming() {
    let h = start(50).await;
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code",
        &[],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["valid"], true);
    assert_eq!(json["uses"], 0);
    assert_eq!(json["maxUses"], 50);

    // the check is a pure read
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code",
        &[],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["uses"], 0);
}

#[tokio::test]
async fn code_check_rejects_wrong_and_missing_codes() {
    let h = start(50).await;
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code",
        &[],
        Some(r#"{"code":"WRONG"}"#),
    )
    .await;
    assert_eq!(status, 400);
    let json = parse(&body);
    assert_eq!(json["valid"], false);
    assert_eq!(json["message"], "Invalid code");

    let (status, _, _) = send_raw(h.addr, "POST", "/api/access-code", &[], Some("{}")).await;
    assert_eq!(status, 400);

    let (status, _, _) =
        send_raw(h.addr, "POST", "/api/access-code", &[], Some("not json")).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn consume_client_requires_a_bearer_token() {
    let h = start(50).await;
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume-client",
        &[],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(parse(&body)["message"], "Missing token");
}

#[tokio::test]
async fn consume_client_is_idempotent_per_farmer() {
    let h = start(50).await;
    h.identity.register("tok-1", "u1", Some("u1@example.test")).await;

    let auth = [("Authorization", "Bearer tok-1")];
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume-client",
        &auth,
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["success"], true);
    assert_eq!(json["uses"], 1);

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume-client",
        &auth,
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["uses"], 1, "second redemption burns no slot");
}

#[tokio::test]
async fn exhausted_code_aborts_with_no_partial_state() {
    let h = start(1).await;
    h.identity.register("tok-1", "u1", None).await;
    h.identity.register("tok-2", "u2", None).await;

    let (status, _, _) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume-client",
        &[("Authorization", "Bearer tok-1")],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume-client",
        &[("Authorization", "Bearer tok-2")],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["message"], "Code has expired");

    let code_doc = h
        .store
        .get(&DocPath::new(["access_codes", "HARVEST-GATE"]).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code_doc["uses"], 1);
    assert!(h
        .store
        .get(&DocPath::new(["access_codes", "HARVEST-GATE", "uses", "u2"]).unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn server_consume_requires_the_admin_secret() {
    let h = start(50).await;
    let (status, _, _) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume",
        &[("x-admin-secret", "nope")],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 401);

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/access-code/consume",
        &[("x-admin-secret", ADMIN_SECRET)],
        Some(r#"{"code":"HARVEST-GATE"}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["uses"], 1);
}

#[tokio::test]
async fn delete_farmer_rolls_back_both_sides() {
    let h = start(50).await;
    h.identity.register("tok-1", "u1", Some("u1@example.test")).await;
    h.store
        .apply(WriteOp::Set {
            path: DocPath::new(["farmers", "u1"]).unwrap(),
            fields: json!({"name": "Amina"}),
        })
        .await
        .unwrap();

    let (status, _, _) = send_raw(
        h.addr,
        "POST",
        "/api/admin/delete-farmer",
        &[],
        Some(r#"{"uid":"u1"}"#),
    )
    .await;
    assert_eq!(status, 401);

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/admin/delete-farmer",
        &[("x-admin-secret", ADMIN_SECRET)],
        Some(r#"{"uid":"u1"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["success"], true);
    assert_eq!(json["details"]["authDeleted"], true);
    assert_eq!(json["details"]["docDeleted"], true);
    assert!(h
        .store
        .get(&DocPath::new(["farmers", "u1"]).unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn payment_config_exposes_the_package_table() {
    let h = start(50).await;
    let (status, _, body) = send_raw(h.addr, "GET", "/api/paystack/config", &[], None).await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["success"], true);
    assert_eq!(json["publicKey"], "pk_test_123");
    assert_eq!(json["packages"]["monthly"]["amountMajor"], 1500);
    assert_eq!(json["packages"]["yearly"]["amountMajor"], 15000);
}

#[tokio::test]
async fn initialize_validates_and_relays_the_checkout_url() {
    let h = start(50).await;
    let (status, _, body) =
        send_raw(h.addr, "POST", "/api/paystack", &[], Some(r#"{"plan":"monthly"}"#)).await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["message"], "Email is required");

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/paystack",
        &[],
        Some(r#"{"email":"amina@example.test","plan":"monthly"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["success"], true);
    assert!(json["authorizationUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.invalid/"));
}

#[tokio::test]
async fn verify_is_gated_by_the_origin_allow_list() {
    let h = start(50).await;
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/paystack/verify",
        &[],
        Some(r#"{"reference":"ref-1"}"#),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(parse(&body)["message"], "Origin not allowed");

    let (status, _, _) = send_raw(
        h.addr,
        "POST",
        "/api/paystack/verify",
        &[("Origin", "https://evil.example")],
        Some(r#"{"reference":"ref-1"}"#),
    )
    .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn verify_preflight_gets_cors_headers_for_allowed_origins() {
    let h = start(50).await;
    let (status, head, _) = send_raw(
        h.addr,
        "OPTIONS",
        "/api/paystack/verify",
        &[("Origin", ORIGIN)],
        None,
    )
    .await;
    assert_eq!(status, 204);
    let head = head.to_ascii_lowercase();
    assert!(head.contains(&format!("access-control-allow-origin: {ORIGIN}")));
    assert!(head.contains("access-control-allow-methods"));
}

#[tokio::test]
async fn first_payment_end_to_end_sets_the_ledger() {
    let h = start(50).await;
    h.identity.register("tok-1", "u1", Some("amina@example.test")).await;
    h.store
        .apply(WriteOp::Set {
            path: DocPath::new(["farmers", "u1"]).unwrap(),
            fields: json!({"name": "Amina", "email": "amina@example.test"}),
        })
        .await
        .unwrap();
    h.gateway
        .seed_verification(GatewayVerification {
            succeeded: true,
            reference: "ref-1".to_string(),
            amount_minor: 150_000,
            email: Some("amina@example.test".to_string()),
            plan_raw: Some("monthly".to_string()),
        })
        .await;
    h.clock.set(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/paystack/verify",
        &[("Origin", ORIGIN)],
        Some(r#"{"reference":"ref-1"}"#),
    )
    .await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["plan"], "monthly");
    assert_eq!(json["data"]["prorateDiscount"], 0);
    assert_eq!(json["data"]["finalCharge"], 150_000);
    assert_eq!(json["data"]["farmerUid"], "u1");
    assert!(json["data"]["nextPaymentDate"]
        .as_str()
        .unwrap()
        .starts_with("2025-04-01T00:00:00"));

    let doc = h
        .store
        .get(&DocPath::new(["farmers", "u1"]).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["paidAccess"], true);
    assert_eq!(doc["plan"], "monthly");
    assert_eq!(doc["name"], "Amina");
}

#[tokio::test]
async fn verify_maps_gateway_failures_to_the_taxonomy() {
    let h = start(50).await;
    // unknown reference: upstream failure
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/paystack/verify",
        &[("Origin", ORIGIN)],
        Some(r#"{"reference":"ref-unknown"}"#),
    )
    .await;
    assert_eq!(status, 502);
    assert_eq!(parse(&body)["message"], "Payment verification failed");

    // known but unsuccessful payment: business failure
    h.gateway
        .seed_verification(GatewayVerification {
            succeeded: false,
            reference: "ref-fail".to_string(),
            amount_minor: 150_000,
            email: None,
            plan_raw: None,
        })
        .await;
    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/paystack/verify",
        &[("Origin", ORIGIN)],
        Some(r#"{"reference":"ref-fail"}"#),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["message"], "Payment unsuccessful");

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/paystack/verify",
        &[("Origin", ORIGIN)],
        Some("{}"),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["message"], "Reference required");
}

#[tokio::test]
async fn advice_returns_structured_items_and_falls_back_to_raw_text() {
    let h = start(50).await;
    h.completion
        .set_response(
            r#"{"header":"Hot week","items":[{"crop":"maize","advice":"mulch"}]}"#,
        )
        .await;
    let request = r#"{"crops":["maize"],"weather":{"main":{"temp":33.0}},"lang":"en"}"#;
    let (status, _, body) = send_raw(h.addr, "POST", "/api/advice", &[], Some(request)).await;
    assert_eq!(status, 200);
    let json = parse(&body);
    assert_eq!(json["header"], "Hot week");
    assert_eq!(json["items"][0]["crop"], "maize");

    h.completion.set_response("just water them").await;
    let (status, _, body) = send_raw(h.addr, "POST", "/api/advice", &[], Some(request)).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["advice"], "just water them");

    let (status, _, body) =
        send_raw(h.addr, "POST", "/api/advice", &[], Some(r#"{"crops":[]}"#)).await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["message"], "Missing data");
}

#[tokio::test]
async fn weather_proxy_validates_and_relays_the_payload() {
    let h = start(50).await;
    let (status, _, body) = send_raw(h.addr, "POST", "/api/weather", &[], Some("{}")).await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["message"], "Missing coordinates");

    let (status, _, body) = send_raw(
        h.addr,
        "POST",
        "/api/weather",
        &[],
        Some(r#"{"lat":9.07,"lon":7.49}"#),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["main"]["temp"], 30.0);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let h = start(50).await;
    let (_, head, _) = send_raw(h.addr, "GET", "/healthz", &[], None).await;
    assert!(head.to_ascii_lowercase().contains("x-request-id"));
}
