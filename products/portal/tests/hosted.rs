use entity::{NewOrder, OrderDetails, OrderStatus, QuoteUpdate};
use ops_testkit::{Method, MockUpstream};
use platform_db::{BackendClient, BackendSettings, DbError};
use products_portal::{CompletionPolicy, Db, FileUpload};
use serde_json::json;
use uuid::Uuid;

const ORDER_ID: &str = "8f2d0c56-5a8e-4d7e-9a4e-0c1b6a1f3b10";
const ROUND_ID: &str = "1c7e5f0a-3b2d-4e8f-9a6b-5d4c3b2a1f00";
const OTHER_ROUND_ID: &str = "2d8f6a1b-4c3e-4f90-8b7c-6e5d4c3b2a11";

fn db_for(mock: &MockUpstream) -> Db {
    let client =
        BackendClient::connect(&BackendSettings::new(mock.url(), "service-key", "anon-key"))
            .unwrap();
    Db::hosted(client)
}

fn order_row(status: &str) -> serde_json::Value {
    json!({
        "id": ORDER_ID,
        "ref": "FT-1042",
        "client_name": "Ada Lovelace",
        "client_email": "ada@example.com",
        "status": status
    })
}

#[tokio::test]
async fn create_upserts_client_before_inserting_received_order() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::POST, "/rest/v1/clients", 201, serde_json::Value::Null)
        .respond(Method::POST, "/rest/v1/orders", 201, json!([order_row("Received")]));
    let db = db_for(&mock);

    let order = db
        .orders()
        .create(NewOrder {
            reference: "FT-1042".into(),
            details: OrderDetails {
                client_name: "Ada Lovelace".into(),
                client_email: "ada@example.com".into(),
                floors: Some(2),
                ..OrderDetails::default()
            },
            phone: Some("555-0100".into()),
        })
        .await
        .unwrap();
    assert_eq!(order.reference, "FT-1042");
    assert_eq!(order.status, OrderStatus::Received);

    let requests = mock.requests();
    assert_eq!(requests[0].path, "/rest/v1/clients");
    assert_eq!(requests[0].json()["phone"], "555-0100");
    assert_eq!(requests[1].path, "/rest/v1/orders");
    let inserted = requests[1].json();
    assert_eq!(inserted["status"], "Received");
    assert_eq!(inserted["floors"], 2);
    assert!(inserted.get("phone").is_none());
    assert_eq!(requests[1].header("prefer"), Some("return=representation"));
}

#[tokio::test]
async fn lookup_distinguishes_missing_from_failed() {
    let mock = MockUpstream::start().await;
    let db = db_for(&mock);

    mock.respond(Method::GET, "/rest/v1/orders", 200, json!([]));
    assert!(matches!(
        db.orders().get_by_ref("FT-404").await,
        Err(DbError::NotFound)
    ));

    mock.respond(Method::GET, "/rest/v1/orders", 503, json!({"message": "unavailable"}));
    assert!(matches!(
        db.orders().get_by_ref("FT-404").await,
        Err(DbError::Upstream { status: 503, .. })
    ));
}

#[tokio::test]
async fn status_update_with_no_matching_row_is_not_found() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::PATCH, "/rest/v1/orders", 200, json!([]));
    let db = db_for(&mock);

    let result = db.orders().update_status("FT-9", &OrderStatus::Review).await;
    assert!(matches!(result, Err(DbError::NotFound)));
    let patch = &mock.requests_to(Method::PATCH, "/rest/v1/orders")[0];
    assert_eq!(patch.json(), json!({"status": "Review"}));
    assert_eq!(patch.query_param("ref").as_deref(), Some("eq.FT-9"));
}

#[tokio::test]
async fn approving_any_round_completes_the_order_by_default() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::PATCH, "/rest/v1/revision_rounds", 200, json!([{"id": ROUND_ID}]))
        .respond(Method::PATCH, "/rest/v1/orders", 200, json!([order_row("Complete")]));
    let db = db_for(&mock);

    let round_id: Uuid = ROUND_ID.parse().unwrap();
    let approval = db
        .revisions()
        .approve_round(round_id, ORDER_ID.parse().unwrap())
        .await
        .unwrap();
    assert!(approval.order_completed);

    let round_patch = &mock.requests_to(Method::PATCH, "/rest/v1/revision_rounds")[0];
    assert_eq!(round_patch.json()["status"], "Approved");
    assert!(round_patch.json()["approved_at"].is_string());
    let order_patch = &mock.requests_to(Method::PATCH, "/rest/v1/orders")[0];
    assert_eq!(order_patch.json(), json!({"status": "Complete"}));
    assert_eq!(order_patch.query_param("id"), Some(format!("eq.{ORDER_ID}")));
}

#[tokio::test]
async fn all_rounds_policy_waits_for_pending_rounds() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::PATCH, "/rest/v1/revision_rounds", 200, json!([{"id": ROUND_ID}]))
        .respond(
            Method::GET,
            "/rest/v1/revision_rounds",
            200,
            json!([
                {"id": ROUND_ID, "order_id": ORDER_ID, "round_number": 1, "status": "Approved"},
                {"id": OTHER_ROUND_ID, "order_id": ORDER_ID, "round_number": 2, "status": "Pending"}
            ]),
        );
    let db = db_for(&mock).with_completion_policy(CompletionPolicy::AllRoundsApproved);

    let approval = db
        .revisions()
        .approve_round(ROUND_ID.parse().unwrap(), ORDER_ID.parse().unwrap())
        .await
        .unwrap();
    assert!(!approval.order_completed);
    assert!(mock.requests_to(Method::PATCH, "/rest/v1/orders").is_empty());
}

#[tokio::test]
async fn deliverable_is_stored_at_fixed_path_with_decoded_size() {
    let mock = MockUpstream::start().await;
    mock.respond(
        Method::POST,
        "/storage/v1/object/deliverables/FT-1042/final.pdf",
        200,
        json!({"Key": "deliverables/FT-1042/final.pdf"}),
    )
    .respond(Method::POST, "/rest/v1/order_files", 201, serde_json::Value::Null);
    let db = db_for(&mock);

    let path = db
        .orders()
        .record_deliverable("FT-1042", "final.pdf", "application/pdf", vec![0u8; 1234])
        .await
        .unwrap();
    assert_eq!(path, "FT-1042/final.pdf");

    let upload =
        &mock.requests_to(Method::POST, "/storage/v1/object/deliverables/FT-1042/final.pdf")[0];
    assert_eq!(upload.header("x-upsert"), Some("true"));
    let row = mock.requests_to(Method::POST, "/rest/v1/order_files")[0].json();
    assert_eq!(row["file_size"], 1234);
    assert_eq!(row["storage_path"], "FT-1042/final.pdf");
    assert_eq!(row["category"], "deliverable");
    assert_eq!(row["order_ref"], "FT-1042");
}

#[tokio::test]
async fn failed_metadata_insert_is_reported_after_upload() {
    let mock = MockUpstream::start().await;
    mock.respond(
        Method::POST,
        "/storage/v1/object/deliverables/FT-1/a.png",
        200,
        json!({}),
    )
    .respond(
        Method::POST,
        "/rest/v1/order_files",
        400,
        json!({"message": "column does not exist"}),
    );
    let db = db_for(&mock);

    let result = db
        .orders()
        .record_deliverable("FT-1", "a.png", "image/png", vec![1, 2, 3])
        .await;
    assert!(matches!(result, Err(DbError::Upstream { status: 400, .. })));
    assert_eq!(
        mock.requests_to(Method::POST, "/storage/v1/object/deliverables/FT-1/a.png").len(),
        1
    );
}

#[tokio::test]
async fn order_upload_uses_timestamped_path() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::POST, "/rest/v1/order_files", 201, serde_json::Value::Null);
    let db = db_for(&mock);

    let result = db
        .orders()
        .upload_file(
            ORDER_ID.parse().unwrap(),
            "FT-7",
            FileUpload::new("plan.pdf", "application/pdf", b"%PDF".to_vec()),
        )
        .await;
    // Storage is unscripted, so the upload fails before any metadata insert.
    assert!(matches!(result, Err(DbError::Upstream { status: 404, .. })));
    let upload = mock
        .requests()
        .into_iter()
        .find(|request| request.path.starts_with("/storage/v1/object/order-files/FT-7/"))
        .unwrap();
    assert!(upload.path.ends_with("-plan.pdf"));
    assert!(mock.requests_to(Method::POST, "/rest/v1/order_files").is_empty());
}

#[tokio::test]
async fn quote_update_stamps_updated_at() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::PATCH, "/rest/v1/quotes", 200, json!([{"ref": "Q-7"}]));
    let db = db_for(&mock);

    db.quotes()
        .update(
            "Q-7",
            &QuoteUpdate {
                status: Some("Quoted".into()),
                confirmed_total: Some(5200.0),
                ..QuoteUpdate::default()
            },
        )
        .await
        .unwrap();
    let patch = mock.requests_to(Method::PATCH, "/rest/v1/quotes")[0].json();
    assert_eq!(patch["status"], "Quoted");
    assert_eq!(patch["confirmed_total"], 5200.0);
    assert!(patch["updated_at"].is_string());
    assert!(patch.get("estimate_low").is_none());
}

#[tokio::test]
async fn portal_reads_use_the_session_token() {
    let mock = MockUpstream::start().await;
    mock.respond(Method::GET, "/rest/v1/orders", 200, json!([order_row("Review")]));
    let db = db_for(&mock);

    let mine = db.orders().get_mine("user-jwt").await.unwrap();
    assert_eq!(mine.len(), 1);
    let sent = &mock.requests_to(Method::GET, "/rest/v1/orders")[0];
    assert_eq!(sent.header("apikey"), Some("anon-key"));
    assert_eq!(sent.header("authorization"), Some("Bearer user-jwt"));
    assert_eq!(sent.query_param("order").as_deref(), Some("created_at.desc"));
}
