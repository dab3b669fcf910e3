use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use tally_api::app::services::AppServices;
use tally_infra::AppConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppConfig::default()).await
    }

    async fn spawn_with(config: AppConfig) -> Self {
        // Same router as prod over the in-memory store, bound to an ephemeral port.
        let app = tally_api::app::router(Arc::new(AppServices::in_memory(&config)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn setup_wallet(client: &reqwest::Client, srv: &TestServer, body: Value) -> Value {
    let res = client.post(srv.url("/api/setup")).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn transact(client: &reqwest::Client, srv: &TestServer, wallet_id: &str, body: Value) -> (StatusCode, Value) {
    let res = client
        .post(srv.url(&format!("/api/transact/{wallet_id}")))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn list(client: &reqwest::Client, srv: &TestServer, query: &str) -> (StatusCode, Value) {
    let res = client
        .get(srv.url(&format!("/api/transactions?{query}")))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_status_and_uptime() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn setup_creates_wallet_with_setup_transaction() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 100})).await;
    assert_eq!(wallet["name"], "Alice");
    assert_eq!(wallet["balance"], "100.0000");
    assert!(wallet["transactionId"].is_string());

    let id = wallet["id"].as_str().unwrap();
    let res = client.get(srv.url(&format!("/api/wallet/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["balance"], "100.0000");
    assert_eq!(fetched["date"], wallet["date"]);
    assert!(fetched.get("transactionId").is_none());

    let (status, page) = list(&client, &srv, &format!("walletId={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    let setup = &page["data"][0];
    assert_eq!(setup["id"], wallet["transactionId"]);
    assert_eq!(setup["type"], "CREDIT");
    assert_eq!(setup["description"], "Setup");
    assert_eq!(setup["amount"], "100.0000");
    assert_eq!(setup["balance"], "100.0000");
}

#[tokio::test]
async fn setup_without_balance_starts_at_zero() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Bob"})).await;
    assert_eq!(wallet["balance"], "0.0000");
}

#[tokio::test]
async fn credit_and_debit_update_balance() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": "100.0000"})).await;
    let id = wallet["id"].as_str().unwrap();

    let (status, credit) = transact(&client, &srv, id, json!({"amount": 50.25, "description": "pay"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(credit["balance"], "150.2500");

    let (status, debit) = transact(&client, &srv, id, json!({"amount": "-40", "description": "Groceries"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(debit["balance"], "110.2500");

    let (_, page) = list(&client, &srv, &format!("walletId={id}")).await;
    assert_eq!(page["total"], 3);
    let newest = &page["data"][0];
    assert_eq!(newest["id"], debit["transactionId"]);
    assert_eq!(newest["type"], "DEBIT");
    assert_eq!(newest["amount"], "-40.0000");
    assert_eq!(newest["balance"], "110.2500");
    assert_eq!(page["data"][1]["amount"], "50.2500");
}

#[tokio::test]
async fn overdraft_is_rejected_without_side_effects() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 100})).await;
    let id = wallet["id"].as_str().unwrap();

    let (status, body) = transact(&client, &srv, id, json!({"amount": -200, "description": "rent"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_balance");

    let fetched: Value = client
        .get(srv.url(&format!("/api/wallet/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["balance"], "100.0000");
    let (_, page) = list(&client, &srv, &format!("walletId={id}")).await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn invalid_requests_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 10})).await;
    let id = wallet["id"].as_str().unwrap();

    for body in [
        json!({"balance": 10}),
        json!({"name": ""}),
        json!({"name": "x".repeat(256)}),
        json!({"name": "Neg", "balance": -1}),
        json!({"name": "Precise", "balance": 1.00001}),
    ] {
        let res = client.post(srv.url("/api/setup")).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error", "{body}");
    }

    for body in [
        json!({"amount": 0, "description": "zero"}),
        json!({"amount": 5, "description": ""}),
        json!({"amount": 5}),
        json!({"amount": "five", "description": "x"}),
        json!({"amount": 0.00001, "description": "x"}),
    ] {
        let (status, err) = transact(&client, &srv, id, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(err["error"], "validation_error", "{body}");
    }

    let res = client
        .post(srv.url(&format!("/api/transact/{id}")))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/api/wallet/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");

    let (_, page) = list(&client, &srv, &format!("walletId={id}")).await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn unknown_wallet_is_not_found_everywhere() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let ghost = "018f3a52-7c1e-7b6a-9d4e-2f3b4c5d6e7f";

    let res = client.get(srv.url(&format!("/api/wallet/{ghost}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "not_found");

    let (status, _) = transact(&client, &srv, ghost, json!({"amount": 1, "description": "x"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = list(&client, &srv, &format!("walletId={ghost}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("/api/transactions/export/{ghost}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_paginates_newest_first_with_full_total() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice"})).await;
    let id = wallet["id"].as_str().unwrap();

    for n in 1..=24 {
        let (status, _) = transact(&client, &srv, id, json!({"amount": n, "description": format!("tx {n}")})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, page) = list(&client, &srv, &format!("walletId={id}&skip=0&limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 25);
    let data = page["data"].as_array().unwrap();
    assert_eq!(data.len(), 10);
    assert_eq!(data[0]["description"], "tx 24");
    assert_eq!(data[9]["description"], "tx 15");

    let (_, tail) = list(&client, &srv, &format!("walletId={id}&skip=20&limit=10")).await;
    let tail = tail["data"].as_array().unwrap();
    assert_eq!(tail.len(), 5);
    assert_eq!(tail[4]["description"], "Setup");

    // Default page size.
    let (_, default) = list(&client, &srv, &format!("walletId={id}")).await;
    assert_eq!(default["data"].as_array().unwrap().len(), 10);

    for bad in ["limit=0", "limit=101", "limit=abc", "skip=-1"] {
        let (status, err) = list(&client, &srv, &format!("walletId={id}&{bad}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(err["error"], "validation_error");
    }

    let (status, _) = list(&client, &srv, "skip=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_is_csv_attachment_newest_first() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 100})).await;
    let id = wallet["id"].as_str().unwrap();
    transact(&client, &srv, id, json!({"amount": "-40.5", "description": "Groceries, weekly"})).await;
    transact(&client, &srv, id, json!({"amount": "0.0001", "description": "Interest"})).await;

    let res = client
        .get(srv.url(&format!("/api/transactions/export/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    assert_eq!(
        res.headers()["content-disposition"].to_str().unwrap(),
        format!("attachment; filename=\"transactions-{id}.csv\"")
    );

    let body = res.text().await.unwrap();
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        ["Transaction ID", "Wallet ID", "Amount", "Balance After", "Description", "Type", "Date"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);

    assert_eq!(&rows[0][2], "0.0001");
    assert_eq!(&rows[0][3], "59.5001");
    assert_eq!(&rows[0][5], "CREDIT");
    assert_eq!(&rows[1][2], "40.5000");
    assert_eq!(&rows[1][4], "Groceries, weekly");
    assert_eq!(&rows[1][5], "DEBIT");
    assert_eq!(&rows[2][4], "Setup");
    assert!(rows.iter().all(|r| &r[1] == id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_on_one_wallet_serialize() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 0})).await;
    let id = wallet["id"].as_str().unwrap().to_string();

    let handles: Vec<_> = (1..=20)
        .map(|n| {
            let client = client.clone();
            let url = srv.url(&format!("/api/transact/{id}"));
            tokio::spawn(async move {
                client
                    .post(url)
                    .json(&json!({"amount": n, "description": "parallel"}))
                    .send()
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let fetched: Value = client
        .get(srv.url(&format!("/api/wallet/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["balance"], "210.0000");

    let (_, page) = list(&client, &srv, &format!("walletId={id}&limit=100")).await;
    assert_eq!(page["total"], 21);
    let mut stamps: Vec<&str> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["balance"].as_str().unwrap())
        .collect();
    stamps.sort();
    stamps.dedup();
    assert_eq!(stamps.len(), 21);
}

#[tokio::test]
async fn business_errors_keep_their_message_in_production() {
    let config = AppConfig {
        expose_internal_errors: false,
        ..AppConfig::default()
    };
    let srv = TestServer::spawn_with(config).await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 1})).await;
    let id = wallet["id"].as_str().unwrap();

    // Business errors keep their message regardless of environment.
    let (status, body) = transact(&client, &srv, id, json!({"amount": -2, "description": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("insufficient balance"));
}

#[tokio::test]
async fn validation_errors_list_the_offending_field() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "Alice", "balance": 10})).await;
    let id = wallet["id"].as_str().unwrap();

    let res = client
        .post(srv.url("/api/setup"))
        .json(&json!({"name": "Bob", "balance": "1.00001"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["errors"][0]["field"], "balance");

    for (body, field) in [
        (json!({"description": "no amount"}), "amount"),
        (json!({"amount": 0, "description": "zero"}), "amount"),
        (json!({"amount": 5}), "description"),
    ] {
        let (status, err) = transact(&client, &srv, id, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(err["errors"][0]["field"], field, "{body}");
        assert_eq!(err["errors"][0]["message"], err["message"], "{body}");
    }

    let (status, err) = list(&client, &srv, &format!("walletId={id}&limit=500")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["errors"][0]["field"], "limit");
}

#[tokio::test]
async fn wide_json_amounts_are_kept_exactly() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let res = client
        .post(srv.url("/api/setup"))
        .header("content-type", "application/json")
        .body(r#"{"name":"Whale","balance":12345678901234.5678}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let wallet: Value = res.json().await.unwrap();
    assert_eq!(wallet["balance"], "12345678901234.5678");

    let res = client
        .post(srv.url("/api/setup"))
        .header("content-type", "application/json")
        .body(r#"{"name":"Dust","balance":0.00000000000000000000000000001}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn whitespace_only_name_is_a_valid_name() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let wallet = setup_wallet(&client, &srv, json!({"name": "   "})).await;
    assert_eq!(wallet["name"], "   ");
}

#[tokio::test]
async fn cors_allows_the_configured_frontend() {
    let config = AppConfig {
        frontend_url: "https://wallet.example.com".to_string(),
        ..AppConfig::default()
    };
    let srv = TestServer::spawn_with(config).await;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, srv.url("/api/setup"))
        .header("origin", "https://wallet.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], "https://wallet.example.com");
    assert_eq!(headers["access-control-allow-credentials"], "true");

    let res = client
        .get(srv.url("/health"))
        .header("origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    // Only the configured origin is ever echoed back.
    assert_eq!(res.headers()["access-control-allow-origin"], "https://wallet.example.com");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/health", "/api/wallet/not-a-uuid"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        let headers = res.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff", "{path}");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN", "{path}");
        assert_eq!(headers["referrer-policy"], "no-referrer", "{path}");
        assert!(headers.contains_key("strict-transport-security"), "{path}");
        assert!(headers.contains_key("content-security-policy"), "{path}");
    }
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let app = tally_api::app::router(Arc::new(AppServices::in_memory(&AppConfig::default())));
    let body = vec![b' '; tally_api::app::MAX_BODY_BYTES + 1];
    let req = Request::builder()
        .method("POST")
        .uri("/api/setup")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
}
