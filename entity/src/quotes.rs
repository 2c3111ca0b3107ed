use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Client, RecordId};

pub const QUOTE_RECEIVED: &str = "Received";

fn received() -> String {
    QUOTE_RECEIVED.to_string()
}

/// Everything the quote form collects.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct QuoteDetails {
    pub client_name: String,
    pub client_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Render type (`interior`, `aerial`, ...) to its selection, e.g. `{"views": 3}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub renders: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqft: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NewQuote {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub details: QuoteDetails,
}

impl NewQuote {
    pub fn client(&self) -> Client {
        Client {
            email: self.details.client_email.clone(),
            name: Some(self.details.client_name.clone()),
            company: self.details.client_company.clone(),
            phone: None,
            role: self.details.client_role.clone(),
            created_at: None,
        }
    }

    pub fn into_quote(self, id: RecordId, created_at: DateTime<Utc>) -> Quote {
        Quote {
            id,
            reference: self.reference,
            details: self.details,
            status: received(),
            confirmed_total: None,
            confirmed_timeline: None,
            created_at: Some(created_at),
            updated_at: None,
            quote_files: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub id: RecordId,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub details: QuoteDetails,
    #[serde(default = "received")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quote_files: Vec<QuoteFile>,
}

/// Admin edits to a quote. Only the fields that are set get written.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct QuoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_high: Option<f64>,
}

impl QuoteUpdate {
    pub fn apply(&self, quote: &mut Quote, now: DateTime<Utc>) {
        if let Some(status) = &self.status {
            quote.status = status.clone();
        }
        if let Some(total) = self.confirmed_total {
            quote.confirmed_total = Some(total);
        }
        if let Some(timeline) = &self.confirmed_timeline {
            quote.confirmed_timeline = Some(timeline.clone());
        }
        if let Some(low) = self.estimate_low {
            quote.details.estimate_low = Some(low);
        }
        if let Some(high) = self.estimate_high {
            quote.details.estimate_high = Some(high);
        }
        quote.updated_at = Some(now);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuoteFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub quote_id: RecordId,
    pub section: String,
    pub filename: String,
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn update_only_touches_set_fields() {
        let mut quote = NewQuote {
            reference: "Q-7".into(),
            details: QuoteDetails {
                client_name: "Grace".into(),
                client_email: "grace@example.com".into(),
                estimate_low: Some(4_000.0),
                estimate_high: Some(6_000.0),
                ..QuoteDetails::default()
            },
        }
        .into_quote(Uuid::nil(), Utc::now());

        let update = QuoteUpdate {
            status: Some("Quoted".into()),
            confirmed_total: Some(5_200.0),
            ..QuoteUpdate::default()
        };
        update.apply(&mut quote, Utc::now());

        assert_eq!(quote.status, "Quoted");
        assert_eq!(quote.confirmed_total, Some(5_200.0));
        assert_eq!(quote.details.estimate_low, Some(4_000.0));
        assert!(quote.updated_at.is_some());
    }
}
