use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Client, RecordId, RevisionRound};

/// Lifecycle status of a paid floor-plan job.
///
/// The admin dashboard may write labels this enum does not know about; those
/// round-trip unchanged through [`OrderStatus::Other`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Received,
    InProgress,
    Review,
    Complete,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Received => "Received",
            OrderStatus::InProgress => "In Progress",
            OrderStatus::Review => "Review",
            OrderStatus::Complete => "Complete",
            OrderStatus::Other(label) => label,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Complete)
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Received" => OrderStatus::Received,
            "In Progress" => OrderStatus::InProgress,
            "Review" => OrderStatus::Review,
            "Complete" => OrderStatus::Complete,
            _ => OrderStatus::Other(value),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(value: &str) -> Self {
        OrderStatus::from(value.to_string())
    }
}

impl From<OrderStatus> for String {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns captured at checkout, shared by [`NewOrder`] and [`Order`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct OrderDetails {
    pub client_name: String,
    pub client_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Add-on name to price. Keys starting with `_` carry checkout metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub addons: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_payment_intent_id: Option<String>,
}

/// Checkout payload for `orders.create`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewOrder {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub details: OrderDetails,
    /// Stored on the client row only.
    #[serde(default, skip_serializing)]
    pub phone: Option<String>,
}

impl NewOrder {
    /// Client row upserted alongside the order.
    pub fn client(&self) -> Client {
        Client {
            email: self.details.client_email.clone(),
            name: Some(self.details.client_name.clone()),
            company: self.details.client_company.clone(),
            phone: self.phone.clone(),
            role: None,
            created_at: None,
        }
    }

    pub fn into_order(self, id: RecordId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            reference: self.reference,
            details: self.details,
            status: OrderStatus::Received,
            project_stage: None,
            created_at: Some(created_at),
            order_files: Vec::new(),
            revision_rounds: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: RecordId,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub details: OrderDetails,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_files: Vec<OrderFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revision_rounds: Vec<RevisionRound>,
}

/// File attached to an order. Written once on upload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ref: Option<String>,
    pub filename: String,
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn status_labels_round_trip() {
        for label in ["Received", "In Progress", "Review", "Complete", "On Hold"] {
            let status: OrderStatus = serde_json::from_value(json!(label)).unwrap();
            assert_eq!(serde_json::to_value(&status).unwrap(), json!(label));
        }
        assert_eq!(OrderStatus::from("On Hold"), OrderStatus::Other("On Hold".into()));
        assert!(OrderStatus::Complete.is_terminal());
    }

    #[test]
    fn order_rows_decode_with_nested_embeddings() {
        let row = json!({
            "id": "8f2d0c56-5a8e-4d7e-9a4e-0c1b6a1f3b10",
            "ref": "FT-1042",
            "client_name": "Ada Lovelace",
            "client_email": "ada@example.com",
            "floors": 2,
            "addons": {"Furniture": 150, "_source": "checkout"},
            "total": 1250.5,
            "status": "In Progress",
            "project_stage": "draft-1-ready",
            "created_at": "2025-02-01T10:00:00Z",
            "order_files": [{"filename": "plan.pdf", "storage_path": "FT-1042/plan.pdf"}],
            "revision_rounds": [],
            "updated_at": "2025-02-02T10:00:00Z"
        });
        let order: Order = serde_json::from_value(row).unwrap();
        assert_eq!(order.reference, "FT-1042");
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.details.floors, Some(2));
        assert_eq!(order.details.addons.len(), 2);
        assert_eq!(order.order_files[0].storage_path, "FT-1042/plan.pdf");
    }

    #[test]
    fn new_order_keeps_phone_off_the_order_row() {
        let new_order = NewOrder {
            reference: "FT-1".into(),
            details: OrderDetails {
                client_name: "Ada".into(),
                client_email: "ada@example.com".into(),
                ..OrderDetails::default()
            },
            phone: Some("555-0100".into()),
        };
        let value = serde_json::to_value(&new_order).unwrap();
        assert!(value.get("phone").is_none());
        assert_eq!(new_order.client().phone.as_deref(), Some("555-0100"));

        let order = new_order.into_order(Uuid::nil(), Utc::now());
        assert_eq!(order.status, OrderStatus::Received);
    }
}
