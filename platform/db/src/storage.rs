use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use crate::{BackendClient, DbError, DbResult, ensure_success};

/// One object-storage bucket (`/storage/v1/object/{bucket}/...`).
#[derive(Clone, Debug)]
pub struct Bucket {
    client: BackendClient,
    name: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl Bucket {
    pub(crate) fn new(client: BackendClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `bytes` at `path`. With `upsert` an existing object is replaced,
    /// otherwise the backend rejects the duplicate.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> DbResult<()> {
        let url = self.object_url("/storage/v1/object", path)?;
        let request = self
            .client
            .authorize(self.client.http().post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes);
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    /// Time-limited retrieval URL for `path`.
    pub async fn create_signed_url(&self, path: &str, expires_in: Duration) -> DbResult<String> {
        let url = self.object_url("/storage/v1/object/sign", path)?;
        let request = self
            .client
            .authorize(self.client.http().post(url))
            .json(&json!({ "expiresIn": expires_in.as_secs() }));
        let response = ensure_success(request.send().await?).await?;
        let signed: SignedUrlResponse = response.json().await?;
        Ok(format!(
            "{}/storage/v1{}",
            self.client.base_url(),
            signed.signed_url
        ))
    }

    /// `{prefix}/{bucket}/{path}` with every `/`-separated segment of `path`
    /// percent-encoded, so `#` and `?` stay part of the object key.
    fn object_url(&self, prefix: &str, path: &str) -> DbResult<Url> {
        let mut url = Url::parse(&self.client.endpoint(prefix))
            .map_err(|err| DbError::InvalidUrl(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| DbError::InvalidUrl("cannot carry a path".into()))?
            .push(&self.name)
            .extend(path.split('/'));
        Ok(url)
    }
}
