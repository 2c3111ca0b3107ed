use std::collections::BTreeMap;

use anyhow::{Context, Result};
use entity::{NewOrder, NewQuote, OrderDetails, OrderStatus, QuoteDetails, QuoteUpdate};
use products_portal::{Db, LocalStore};
use serde_json::json;
use tracing::info;

/// Fill a local store with demo orders and quotes for working on the
/// dashboards without a backend.
pub async fn seed_local(store: LocalStore) -> Result<(usize, usize)> {
    let db = Db::local(store);

    let orders = demo_orders();
    let order_count = orders.len();
    for (new_order, status) in orders {
        let reference = new_order.reference.clone();
        db.orders()
            .create(new_order)
            .await
            .with_context(|| format!("seeding order {reference}"))?;
        if status != OrderStatus::Received {
            db.orders()
                .update_status(&reference, &status)
                .await
                .with_context(|| format!("setting status on {reference}"))?;
        }
    }

    let quotes = demo_quotes();
    let quote_count = quotes.len();
    for (new_quote, update) in quotes {
        let reference = new_quote.reference.clone();
        db.quotes()
            .create(new_quote)
            .await
            .with_context(|| format!("seeding quote {reference}"))?;
        if let Some(update) = update {
            db.quotes()
                .update(&reference, &update)
                .await
                .with_context(|| format!("updating quote {reference}"))?;
        }
    }

    info!(orders = order_count, quotes = quote_count, "local store seeded");
    Ok((order_count, quote_count))
}

fn demo_orders() -> Vec<(NewOrder, OrderStatus)> {
    let order = |reference: &str, name: &str, email: &str, floors: u32, total: f64| NewOrder {
        reference: reference.to_string(),
        details: OrderDetails {
            client_name: name.to_string(),
            client_email: email.to_string(),
            address: Some("120 Harbour St, Portland ME".into()),
            property_type: Some("residential".into()),
            floors: Some(floors),
            style: Some("modern".into()),
            addons: BTreeMap::from([("furniture".to_string(), json!(45))]),
            total: Some(total),
            deposit: Some(total / 2.0),
            payment_method: Some("card".into()),
            ..OrderDetails::default()
        },
        phone: None,
    };
    vec![
        (
            order("FT-1001", "Ada Byron", "ada@example.com", 2, 340.0),
            OrderStatus::Received,
        ),
        (
            order("FT-1002", "Grace Hopper", "grace@example.com", 1, 180.0),
            OrderStatus::InProgress,
        ),
        (
            order("FT-1003", "Alan Kay", "alan@example.com", 3, 520.0),
            OrderStatus::Complete,
        ),
    ]
}

fn demo_quotes() -> Vec<(NewQuote, Option<QuoteUpdate>)> {
    let quote = |reference: &str, name: &str, project: &str, low: f64, high: f64| NewQuote {
        reference: reference.to_string(),
        details: QuoteDetails {
            client_name: name.to_string(),
            client_email: format!("{}@example.com", name.to_ascii_lowercase().replace(' ', ".")),
            project_name: Some(project.to_string()),
            project_type: Some("multifamily".into()),
            city: Some("Portland".into()),
            phases: Some(1),
            renders: BTreeMap::from([("interior".to_string(), json!({"views": 3}))]),
            complexity: Some("standard".into()),
            timeline: Some("standard".into()),
            estimate_low: Some(low),
            estimate_high: Some(high),
            ..QuoteDetails::default()
        },
    };
    vec![
        (quote("FQ-2001", "Edsger Dijkstra", "Canal Lofts", 4200.0, 6100.0), None),
        (
            quote("FQ-2002", "Barbara Liskov", "Hillside Villas", 9800.0, 12500.0),
            Some(QuoteUpdate {
                status: Some("Quoted".into()),
                confirmed_total: Some(11000.0),
                confirmed_timeline: Some("3 weeks".into()),
                ..QuoteUpdate::default()
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeds_orders_and_quotes_into_the_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path());
        let (orders, quotes) = seed_local(store.clone()).await.unwrap();
        assert_eq!((orders, quotes), (3, 2));

        let saved = store.orders().await.unwrap();
        assert_eq!(saved.len(), 3);
        let done = store.order_by_ref("FT-1003").await.unwrap();
        assert_eq!(done.status, OrderStatus::Complete);

        let quoted = store.quotes().await.unwrap();
        let liskov = quoted.iter().find(|q| q.reference == "FQ-2002").unwrap();
        assert_eq!(liskov.status, "Quoted");
        assert!(liskov.updated_at.is_some());
    }
}
