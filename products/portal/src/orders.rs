use std::time::Duration;

use chrono::Utc;
use entity::{NewOrder, Order, OrderFile, OrderStatus, RecordId};
use platform_db::{
    BackendClient, ChangeEvent, ChangeFilter, DbError, DbResult, Subscription,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{Backend, DELIVERABLES_BUCKET, FileUpload, ORDERS_BUCKET, millis_now, traced};

/// Lifetime of dashboard file links.
pub const FILE_URL_TTL: Duration = Duration::from_secs(48 * 60 * 60);
/// Lifetime of client download links.
pub const DELIVERABLE_URL_TTL: Duration = Duration::from_secs(60 * 60);

const ORDER_SELECT: &str =
    "*, order_files(*), revision_rounds(*, revision_files(*), revision_notes(*))";

#[derive(Serialize)]
struct OrderInsert<'a> {
    #[serde(flatten)]
    order: &'a NewOrder,
    status: OrderStatus,
}

pub struct OrdersApi<'a> {
    backend: &'a Backend,
}

impl<'a> OrdersApi<'a> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    /// Every order, newest first, with files and revision history embedded.
    pub async fn get_all(&self) -> DbResult<Vec<Order>> {
        let result = match self.backend {
            Backend::Hosted(client) => list(client).await,
            Backend::Local(store) => store.orders().await,
        };
        traced("orders.getAll", result)
    }

    /// Orders visible to the signed-in client holding `access_token`.
    pub async fn get_mine(&self, access_token: &str) -> DbResult<Vec<Order>> {
        let result = match self.backend {
            Backend::Hosted(client) => list(&client.as_user(access_token)).await,
            Backend::Local(store) => store.orders().await,
        };
        traced("orders.getMine", result)
    }

    pub async fn get_by_ref(&self, reference: &str) -> DbResult<Order> {
        let result = match self.backend {
            Backend::Hosted(client) => {
                client
                    .from("orders")
                    .select(ORDER_SELECT)
                    .eq("ref", reference)
                    .fetch_one()
                    .await
            }
            Backend::Local(store) => store.order_by_ref(reference).await,
        };
        traced("orders.getByRef", result)
    }

    /// Checkout: record the client, then the order itself as `Received`.
    pub async fn create(&self, new_order: NewOrder) -> DbResult<Order> {
        let result = match self.backend {
            Backend::Hosted(client) => create_hosted(client, &new_order).await,
            Backend::Local(store) => {
                let order = new_order.into_order(Uuid::new_v4(), Utc::now());
                store.create_order(order).await
            }
        };
        let result = traced("orders.create", result);
        if let Ok(order) = &result {
            info!(reference = %order.reference, "order created");
        }
        result
    }

    pub async fn update_status(&self, reference: &str, status: &OrderStatus) -> DbResult<()> {
        let result = match self.backend {
            Backend::Hosted(client) => {
                let changed = client
                    .from("orders")
                    .eq("ref", reference)
                    .update(&json!({ "status": status }))
                    .await;
                expect_rows(changed)
            }
            Backend::Local(store) => store.update_order_status(reference, status).await,
        };
        traced("orders.updateStatus", result)
    }

    pub async fn update_stage(&self, reference: &str, stage: &str) -> DbResult<()> {
        let client = hosted(self.backend, "orders.updateStage")?;
        let changed = client
            .from("orders")
            .eq("ref", reference)
            .update(&json!({ "project_stage": stage }))
            .await;
        traced("orders.updateStage", expect_rows(changed))
    }

    /// Store an order attachment and record it. Returns the storage path.
    pub async fn upload_file(
        &self,
        order_id: RecordId,
        order_ref: &str,
        file: FileUpload,
    ) -> DbResult<String> {
        let client = hosted(self.backend, "orders.uploadFile")?;
        let path = format!("{order_ref}/{}-{}", millis_now(), file.name);
        let row = OrderFile {
            order_id: Some(order_id),
            filename: file.name.clone(),
            storage_path: path.clone(),
            file_size: Some(file.size()),
            mime_type: Some(file.mime_type.clone()),
            ..OrderFile::default()
        };
        let result =
            store_and_record(client, ORDERS_BUCKET, &path, file, false, "order_files", &row).await;
        traced("orders.uploadFile", result.map(|()| path))
    }

    /// Store a finished deliverable at exactly `{order_ref}/{file_name}`,
    /// replacing any previous upload, and record it against the order.
    pub async fn record_deliverable(
        &self,
        order_ref: &str,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> DbResult<String> {
        let client = hosted(self.backend, "orders.recordDeliverable")?;
        let path = format!("{order_ref}/{file_name}");
        let file = FileUpload::new(file_name, mime_type, bytes);
        let row = OrderFile {
            order_ref: Some(order_ref.to_string()),
            filename: file_name.to_string(),
            storage_path: path.clone(),
            file_size: Some(file.size()),
            mime_type: Some(mime_type.to_string()),
            category: Some("deliverable".to_string()),
            ..OrderFile::default()
        };
        let result =
            store_and_record(client, DELIVERABLES_BUCKET, &path, file, true, "order_files", &row)
                .await;
        traced("orders.recordDeliverable", result.map(|()| path))
    }

    /// 48-hour link to a stored file, `order-files` unless another bucket is named.
    pub async fn get_file_url(&self, path: &str, bucket: Option<&str>) -> DbResult<String> {
        let client = hosted(self.backend, "orders.getFileUrl")?;
        let result = client
            .storage(bucket.unwrap_or(ORDERS_BUCKET))
            .create_signed_url(path, FILE_URL_TTL)
            .await;
        traced("orders.getFileUrl", result)
    }

    /// One-hour link to a deliverable.
    pub async fn deliverable_url(&self, path: &str) -> DbResult<String> {
        let client = hosted(self.backend, "orders.deliverableUrl")?;
        let result = client
            .storage(DELIVERABLES_BUCKET)
            .create_signed_url(path, DELIVERABLE_URL_TTL)
            .await;
        traced("orders.deliverableUrl", result)
    }

    pub async fn subscribe_to_new(&self) -> DbResult<Subscription<Order>> {
        match self.backend {
            Backend::Hosted(client) => {
                let filter = ChangeFilter::new("orders-insert", ChangeEvent::Insert, "orders");
                traced("orders.subscribeToNew", client.subscribe(filter).await)
            }
            Backend::Local(_) => Ok(Subscription::inert()),
        }
    }

    pub async fn subscribe_to_order(&self, reference: &str) -> DbResult<Subscription<Order>> {
        match self.backend {
            Backend::Hosted(client) => {
                let filter =
                    ChangeFilter::new(format!("order-{reference}"), ChangeEvent::Update, "orders")
                        .with_filter(format!("ref=eq.{reference}"));
                traced("orders.subscribeToOrder", client.subscribe(filter).await)
            }
            Backend::Local(_) => Ok(Subscription::inert()),
        }
    }
}

async fn list(client: &BackendClient) -> DbResult<Vec<Order>> {
    client
        .from("orders")
        .select(ORDER_SELECT)
        .order_desc("created_at")
        .fetch()
        .await
}

async fn create_hosted(client: &BackendClient, new_order: &NewOrder) -> DbResult<Order> {
    client
        .from("clients")
        .on_conflict("email")
        .upsert(&new_order.client())
        .await?;
    client
        .from("orders")
        .insert(&OrderInsert {
            order: new_order,
            status: OrderStatus::Received,
        })
        .await
}

/// Upload then insert the metadata row. A failed insert leaves the blob in place.
pub(crate) async fn store_and_record<R: Serialize>(
    client: &BackendClient,
    bucket: &str,
    path: &str,
    file: FileUpload,
    upsert: bool,
    table: &str,
    row: &R,
) -> DbResult<()> {
    client
        .storage(bucket)
        .upload(path, file.bytes, &file.mime_type, upsert)
        .await?;
    client.from(table).insert_minimal(row).await
}

pub(crate) fn hosted<'a>(backend: &'a Backend, site: &'static str) -> DbResult<&'a BackendClient> {
    match backend {
        Backend::Hosted(client) => Ok(client),
        Backend::Local(_) => traced(site, Err(DbError::Unavailable(site))),
    }
}

pub(crate) fn expect_rows(changed: DbResult<usize>) -> DbResult<()> {
    match changed? {
        0 => Err(DbError::NotFound),
        _ => Ok(()),
    }
}
