use reqwest::StatusCode;
use serde_json::{Value, json};

use stockroom_api::config::ApiConfig;
use stockroom_infra::SeedData;

const KURTA: &str = "KUR-IND-M";
const DUPATTA: &str = "DUP-GRN-L";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, seeded, bound to an ephemeral port.
        let config = ApiConfig {
            seed: Some(seed()),
            ..ApiConfig::default()
        };
        let app = stockroom_api::app::build_app(&config).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, self.url(path))
            .header("x-actor", "packer-1")
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, body).await
    }

    async fn current_balance(&self, code: &str) -> i64 {
        let (status, body) = self.get(&format!("/inventory/balance/{code}")).await;
        assert_eq!(status, StatusCode::OK);
        body["current"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn seed() -> SeedData {
    serde_json::from_value(json!({
        "skus": [
            {"code": KURTA, "barcode": "8901000000017", "product_name": "Kurta", "colour": "Indigo", "size": "M"},
            {"code": DUPATTA, "product_name": "Dupatta", "colour": "Green", "size": "L"}
        ],
        "opening_stock": [
            {"sku_code": KURTA, "qty": 10},
            {"sku_code": DUPATTA, "qty": 5}
        ],
        "batches": [
            {"batch_code": "B-1", "sku_code": KURTA, "batch_date": "2026-09-01", "qty_planned": 5}
        ],
        "returns": [
            {"ticket_number": "RET-1", "sku_code": KURTA, "qty": 1, "customer_name": "Asha",
             "requested_at": "2026-10-01T10:00:00Z"}
        ],
        "rto_orders": [
            {"order_number": "ORD-9", "customer_name": "Ravi", "rto_initiated_at": "2026-10-05T09:00:00Z",
             "delivered": true,
             "lines": [{"sku_code": DUPATTA, "qty": 1}, {"sku_code": DUPATTA, "qty": 1}]}
        ],
        "repacking": [
            {"sku_code": KURTA, "qty": 1, "origin_reference": "SHELF-2"}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn health_reports_backend() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "in-memory");
}

#[tokio::test]
async fn scan_prefers_repacking_and_ranks_matches() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/inventory/scan-lookup?code=kur-ind-m").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommended_source"], "repacking");
    assert_eq!(body["current_balance"], 10);
    let sources: Vec<&str> = body["matches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["source"].as_str().unwrap())
        .collect();
    assert_eq!(sources, vec!["repacking", "returns", "production"]);

    let (_, by_barcode) = srv.get("/inventory/scan-lookup?code=8901000000017").await;
    assert_eq!(by_barcode["sku"]["code"], KURTA);

    let (status, body) = srv.get("/inventory/scan-lookup?code=NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = srv.get("/inventory/scan-lookup?code=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_queue_rejects_unknown_sources() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/inventory/pending-queue/rto?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["sku_code"], DUPATTA);

    let (status, body) = srv.get("/inventory/pending-queue/warehouse").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn quick_inward_credits_batch_and_records_actor() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post("/inventory/quick-inward", json!({"sku_code": KURTA, "qty": 2, "notes": "line 3"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["batch"]["batch_code"], "B-1");
    assert_eq!(body["batch"]["credited"], 2);
    assert_eq!(body["batch"]["qty_pending"], 3);

    assert_eq!(srv.current_balance(KURTA).await, 12);

    let (_, txns) = srv.get(&format!("/inventory/transactions?sku={KURTA}&limit=1")).await;
    assert_eq!(txns[0]["reason"], "production");
    assert_eq!(txns[0]["created_by"], "packer-1");

    let (status, _) = srv.post("/inventory/quick-inward", json!({"sku_code": KURTA, "qty": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn return_then_repacking_restocks() {
    let srv = TestServer::spawn().await;
    let (_, queue) = srv.get("/inventory/pending-queue/returns").await;
    let line_id = queue["items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = srv.post("/inventory/return-receive", json!({"line_id": line_id})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "selection_required");

    let (status, body) = srv
        .post("/inventory/return-receive", json!({"line_id": line_id, "condition": "good"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let item_id = body["repacking_item"]["id"].as_str().unwrap().to_string();
    assert_eq!(srv.current_balance(KURTA).await, 10);

    let (status, _) = srv
        .post("/inventory/return-receive", json!({"line_id": line_id, "condition": "good"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = srv
        .post("/repacking/process", json!({"item_id": item_id, "decision": "write_off"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "selection_required");

    let (status, body) = srv
        .post("/repacking/process", json!({"item_id": item_id, "decision": "ready"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["reason"], "repack_complete");
    assert_eq!(srv.current_balance(KURTA).await, 11);
}

#[tokio::test]
async fn rto_lines_complete_the_order() {
    let srv = TestServer::spawn().await;
    let (_, queue) = srv.get("/inventory/pending-queue/rto").await;
    let lines: Vec<String> = queue["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(lines.len(), 2);

    let (status, first) = srv
        .post("/inventory/rto-inward-line", json!({"line_id": lines[0], "condition": "unopened"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["progress"]["processed_lines"], 1);
    assert_eq!(srv.current_balance(DUPATTA).await, 6);

    let (status, _) = srv
        .post("/inventory/rto-inward-line", json!({"line_id": lines[0], "condition": "good"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, second) = srv
        .post("/inventory/rto-inward-line", json!({"line_id": lines[1], "condition": "damaged"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["write_off"].is_object());
    assert_eq!(srv.current_balance(DUPATTA).await, 6);

    let order_id = second["progress"]["order_id"].as_str().unwrap();
    let (status, order) = srv.get(&format!("/inventory/rto/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order"]["status"], "rto_received");
    assert_eq!(order["progress"]["processed_lines"], 2);
}

#[tokio::test]
async fn adjustments_need_a_reason_and_stay_non_negative() {
    let srv = TestServer::spawn().await;

    let (status, _) = srv
        .post("/inventory/adjust", json!({"sku_code": DUPATTA, "delta": -1, "reason": " "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv
        .post("/inventory/adjust", json!({"sku_code": DUPATTA, "delta": -6, "reason": "lost"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");

    let (status, _) = srv
        .post("/inventory/adjust", json!({"sku_code": DUPATTA, "delta": -5, "reason": "lost"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(srv.current_balance(DUPATTA).await, 0);
}

#[tokio::test]
async fn reconciliation_session_lifecycle() {
    let srv = TestServer::spawn().await;

    let (status, started) = srv.post("/inventory/reconciliation/start", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = started["session"]["id"].as_str().unwrap().to_string();
    let kurta = started["session"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["sku_code"] == KURTA)
        .unwrap()
        .clone();
    assert_eq!(kurta["system_qty"], 10);

    let (status, again) = srv.post("/inventory/reconciliation/start", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["session"]["id"], id.as_str());

    let path = format!("/inventory/reconciliation/{id}");
    let (status, _) = srv
        .send(
            reqwest::Method::PUT,
            &path,
            json!({"items": [{"sku_id": kurta["sku_id"], "physical_qty": 8}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv.post(&format!("{path}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "selection_required");

    let (status, body) = srv
        .send(
            reqwest::Method::PUT,
            &path,
            json!({"items": [{"sku_id": kurta["sku_id"], "physical_qty": 8, "adjustment_reason": "found"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = srv
        .send(
            reqwest::Method::PUT,
            &path,
            json!({"items": [{"sku_id": kurta["sku_id"], "physical_qty": 8, "adjustment_reason": "damaged"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv.post(&format!("{path}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["adjustments_created"], 1);
    assert_eq!(srv.current_balance(KURTA).await, 8);

    let (status, _) = srv.post(&format!("{path}/submit"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = srv.send(reqwest::Method::DELETE, &path, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, list) = srv.get("/inventory/reconciliation").await;
    assert_eq!(list[0]["status"], "submitted");
}

#[tokio::test]
async fn count_sheet_upload_and_template() {
    let srv = TestServer::spawn().await;
    let (_, started) = srv.post("/inventory/reconciliation/start", json!({})).await;
    let id = started["session"]["id"].as_str().unwrap().to_string();

    let template = srv
        .client
        .get(srv.url(&format!("/inventory/reconciliation/{id}/template")))
        .send()
        .await
        .unwrap();
    assert_eq!(template.status(), StatusCode::OK);
    let text = template.text().await.unwrap();
    assert!(text.starts_with("SKU Code,Physical Qty\n"));
    assert!(text.contains(KURTA));

    let upload = |csv: &'static str| {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(csv.as_bytes().to_vec()).file_name("count.csv"),
        );
        srv.client
            .post(srv.url(&format!("/inventory/reconciliation/{id}/upload-csv")))
            .multipart(form)
            .send()
    };

    let res = upload("sku;qty\ndup-grn-l;5\nkur-ind-m;9\nNOPE-1;3\n").await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["total_rows"], 3);
    assert_eq!(report["matched"], 2);
    assert_eq!(report["not_found"], json!(["NOPE-1"]));
    assert!(report.get("diagnostics").is_none());

    let (_, session) = srv.get(&format!("/inventory/reconciliation/{id}")).await;
    assert_eq!(session["summary"]["counted_items"], 2);
    assert_eq!(session["summary"]["shortage_units"], 1);

    let res = upload("colour,size\nred,large\n").await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "upload_format");
    assert_eq!(body["diagnostics"]["delimiter"], "comma");
}
