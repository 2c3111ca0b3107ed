use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use platform_api::{ApiError, ApiResult};
use platform_authn::AuthError;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::field;
use crate::http::AppState;

/// Deliverables arrive base64-encoded inside JSON.
pub const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

const DEFAULT_MIME: &str = "application/octet-stream";

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloadRequest {
    file_path: Option<String>,
    user_token: Option<String>,
}

pub async fn get_download_url(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let Some(file_path) = field(&body.file_path) else {
        return Err(ApiError::invalid("filePath required"));
    };
    state.require_backend()?;

    if let Some(token) = field(&body.user_token) {
        match state.auth()?.verify_access_token(token).await {
            Ok(_) => {}
            Err(AuthError::Unauthorized) => return Err(ApiError::Unauthorized),
            Err(err) => return Err(ApiError::upstream("get-download-url.verify", err)),
        }
    }

    let url = state
        .db
        .orders()
        .deliverable_url(file_path)
        .await
        .map_err(|err| ApiError::upstream("get-download-url.sign", err))?;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeliverableUpload {
    order_ref: Option<String>,
    file_name: Option<String>,
    file_base64: Option<String>,
    mime_type: Option<String>,
}

pub async fn upload_deliverable(
    State(state): State<AppState>,
    payload: Result<Json<DeliverableUpload>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let (Some(order_ref), Some(file_name), Some(encoded)) = (
        field(&body.order_ref),
        field(&body.file_name),
        field(&body.file_base64),
    ) else {
        return Err(ApiError::invalid("Missing required fields"));
    };
    let bytes = decode_payload(encoded).ok_or_else(|| ApiError::invalid("Invalid base64 payload"))?;
    let mime_type = field(&body.mime_type).unwrap_or(DEFAULT_MIME);
    state.require_backend()?;

    let size = bytes.len();
    let path = state
        .db
        .orders()
        .record_deliverable(order_ref, file_name, mime_type, bytes)
        .await
        .map_err(|err| ApiError::upstream("upload-deliverable", err))?;
    info!(%order_ref, %path, size, "deliverable uploaded");
    Ok(Json(json!({ "ok": true, "path": path })))
}

/// Decodes a browser-produced base64 payload. Accepts a `data:` URL prefix,
/// embedded whitespace, either alphabet and missing padding.
fn decode_payload(encoded: &str) -> Option<Vec<u8>> {
    let body = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD_LENIENT
        .decode(&compact)
        .or_else(|_| URL_SAFE_LENIENT.decode(&compact))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_padded_payloads() {
        assert_eq!(decode_payload("JVBERg==").unwrap(), b"%PDF");
        assert_eq!(decode_payload("JVBERg").unwrap(), b"%PDF");
        assert_eq!(decode_payload("aGVs\nbG8=").unwrap(), b"hello");
    }

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(
            decode_payload("data:application/pdf;base64,JVBERg==").unwrap(),
            b"%PDF"
        );
    }

    #[test]
    fn falls_back_to_url_safe_alphabet() {
        assert_eq!(decode_payload("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_payload("not base64!").is_none());
    }
}
