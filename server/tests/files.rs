mod common;

use axum::http::StatusCode;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use common::Harness;
use ops_testkit::Method;
use serde_json::json;

const PLAN_UPLOAD: &str = "/storage/v1/object/deliverables/FT-9/plan.pdf";
const PLAN_SIGN: &str = "/storage/v1/object/sign/deliverables/FT-9/plan.pdf";

#[tokio::test]
async fn deliverable_is_stored_at_ref_and_name_with_its_size() {
    let harness = Harness::hosted().await;
    harness
        .mock
        .respond(Method::POST, PLAN_UPLOAD, 200, json!({"Key": "deliverables/FT-9/plan.pdf"}));
    harness
        .mock
        .respond(Method::POST, "/rest/v1/order_files", 201, json!(null));
    let bytes = b"%PDF-1.7 floor plan".to_vec();

    let reply = harness
        .post_json(
            "/api/upload-deliverable",
            json!({
                "orderRef": "FT-9",
                "fileName": "plan.pdf",
                "fileBase64": STANDARD.encode(&bytes),
                "mimeType": "application/pdf",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"ok": true, "path": "FT-9/plan.pdf"}));

    let upload = &harness.mock.requests_to(Method::POST, PLAN_UPLOAD)[0];
    assert_eq!(upload.body.as_ref(), bytes.as_slice());
    assert_eq!(upload.header("x-upsert"), Some("true"));
    assert_eq!(upload.header("content-type"), Some("application/pdf"));

    let row = harness.mock.requests_to(Method::POST, "/rest/v1/order_files")[0].json();
    assert_eq!(row["order_ref"], "FT-9");
    assert_eq!(row["storage_path"], "FT-9/plan.pdf");
    assert_eq!(row["file_size"], bytes.len());
    assert_eq!(row["category"], "deliverable");
}

#[tokio::test]
async fn mime_type_defaults_to_octet_stream() {
    let harness = Harness::hosted().await;
    harness.mock.respond(Method::POST, PLAN_UPLOAD, 200, json!({}));
    harness
        .mock
        .respond(Method::POST, "/rest/v1/order_files", 201, json!(null));

    let reply = harness
        .post_json(
            "/api/upload-deliverable",
            json!({"orderRef": "FT-9", "fileName": "plan.pdf", "fileBase64": "JVBERg=="}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let upload = &harness.mock.requests_to(Method::POST, PLAN_UPLOAD)[0];
    assert_eq!(upload.header("content-type"), Some("application/octet-stream"));
}

#[tokio::test]
async fn incomplete_or_undecodable_uploads_are_400() {
    let harness = Harness::hosted().await;
    let missing = harness
        .post_json(
            "/api/upload-deliverable",
            json!({"orderRef": "FT-9", "fileBase64": "JVBERg=="}),
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json(), json!({"error": "Missing required fields"}));

    let garbage = harness
        .post_json(
            "/api/upload-deliverable",
            json!({"orderRef": "FT-9", "fileName": "plan.pdf", "fileBase64": "%%%not-base64%%%"}),
        )
        .await;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);
    assert_eq!(garbage.json(), json!({"error": "Invalid base64 payload"}));
    assert_eq!(harness.mock.request_count(), 0);
}

#[tokio::test]
async fn failed_storage_upload_is_500() {
    let harness = Harness::hosted().await;
    harness
        .mock
        .respond(Method::POST, PLAN_UPLOAD, 400, json!({"message": "Bucket not found"}));
    let reply = harness
        .post_json(
            "/api/upload-deliverable",
            json!({"orderRef": "FT-9", "fileName": "plan.pdf", "fileBase64": "JVBERg=="}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json(), json!({"error": "Bucket not found"}));
    assert!(harness.mock.requests_to(Method::POST, "/rest/v1/order_files").is_empty());
}

#[tokio::test]
async fn download_url_without_token_is_signed_for_an_hour() {
    let harness = Harness::hosted().await;
    harness.mock.respond(
        Method::POST,
        PLAN_SIGN,
        200,
        json!({"signedURL": "/object/sign/deliverables/FT-9/plan.pdf?token=abc"}),
    );

    let reply = harness
        .post_json("/api/get-download-url", json!({"filePath": "FT-9/plan.pdf"}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json()["url"],
        format!(
            "{}/storage/v1/object/sign/deliverables/FT-9/plan.pdf?token=abc",
            harness.mock.url()
        )
    );
    let sign = &harness.mock.requests_to(Method::POST, PLAN_SIGN)[0];
    assert_eq!(sign.json(), json!({"expiresIn": 3600}));
    assert!(harness.mock.requests_to(Method::GET, "/auth/v1/user").is_empty());
}

#[tokio::test]
async fn rejected_token_is_401_and_nothing_is_signed() {
    let harness = Harness::hosted().await;
    harness
        .mock
        .respond(Method::GET, "/auth/v1/user", 401, json!({"msg": "invalid JWT"}));

    let reply = harness
        .post_json(
            "/api/get-download-url",
            json!({"filePath": "FT-9/plan.pdf", "userToken": "expired"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json(), json!({"error": "Unauthorized"}));
    assert!(harness.mock.requests_to(Method::POST, PLAN_SIGN).is_empty());

    let check = &harness.mock.requests_to(Method::GET, "/auth/v1/user")[0];
    assert_eq!(check.header("authorization"), Some("Bearer expired"));
}

#[tokio::test]
async fn valid_token_gets_a_link() {
    let harness = Harness::hosted().await;
    harness.mock.respond(
        Method::GET,
        "/auth/v1/user",
        200,
        json!({"id": "3d8c1d5e-7f25-4f0c-9a55-2b7b8d9f0a11", "email": "ada@example.com"}),
    );
    harness
        .mock
        .respond(Method::POST, PLAN_SIGN, 200, json!({"signedURL": "/object/sign/x?token=t"}));

    let reply = harness
        .post_json(
            "/api/get-download-url",
            json!({"filePath": "FT-9/plan.pdf", "userToken": "good"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json()["url"].as_str().unwrap().ends_with("?token=t"));
}

#[tokio::test]
async fn file_path_is_required() {
    let harness = Harness::hosted().await;
    let reply = harness
        .post_json("/api/get-download-url", json!({"userToken": "good"}))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json(), json!({"error": "filePath required"}));
}

#[tokio::test]
async fn file_names_with_url_delimiters_keep_their_full_key() {
    let harness = Harness::hosted().await;
    let stored = "/storage/v1/object/deliverables/FT-9/plan%20%232.pdf";
    harness.mock.respond(Method::POST, stored, 200, json!({}));
    harness
        .mock
        .respond(Method::POST, "/rest/v1/order_files", 201, json!(null));

    let reply = harness
        .post_json(
            "/api/upload-deliverable",
            json!({"orderRef": "FT-9", "fileName": "plan #2.pdf", "fileBase64": "JVBERg=="}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!({"ok": true, "path": "FT-9/plan #2.pdf"}));
    assert_eq!(harness.mock.requests_to(Method::POST, stored).len(), 1);

    let row = harness.mock.requests_to(Method::POST, "/rest/v1/order_files")[0].json();
    assert_eq!(row["storage_path"], "FT-9/plan #2.pdf");
}
