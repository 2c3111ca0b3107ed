//! JSON-file store used when no hosted backend is configured.
//!
//! Orders and quotes live in `ft_orders.json` and `ft_quotes.json` inside the
//! data directory, newest first. Writes go through a temp file and a rename;
//! a process-local mutex serializes read-modify-write cycles. Nothing here is
//! shared safely between processes.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use entity::{Order, OrderStatus, Quote, QuoteUpdate};
use platform_db::{DbError, DbResult};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, sync::Mutex};
use tracing::debug;

pub const ORDERS_FILE: &str = "ft_orders.json";
pub const QUOTES_FILE: &str = "ft_quotes.json";

#[derive(Clone, Debug)]
pub struct LocalStore {
    dir: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn orders(&self) -> DbResult<Vec<Order>> {
        let _guard = self.lock.lock().await;
        self.read(ORDERS_FILE).await
    }

    pub async fn quotes(&self) -> DbResult<Vec<Quote>> {
        let _guard = self.lock.lock().await;
        self.read(QUOTES_FILE).await
    }

    pub async fn order_by_ref(&self, reference: &str) -> DbResult<Order> {
        self.orders()
            .await?
            .into_iter()
            .find(|order| order.reference == reference)
            .ok_or(DbError::NotFound)
    }

    pub async fn create_order(&self, order: Order) -> DbResult<Order> {
        let _guard = self.lock.lock().await;
        let mut orders: Vec<Order> = self.read(ORDERS_FILE).await?;
        orders.insert(0, order.clone());
        self.write(ORDERS_FILE, &orders).await?;
        Ok(order)
    }

    pub async fn create_quote(&self, quote: Quote) -> DbResult<Quote> {
        let _guard = self.lock.lock().await;
        let mut quotes: Vec<Quote> = self.read(QUOTES_FILE).await?;
        quotes.insert(0, quote.clone());
        self.write(QUOTES_FILE, &quotes).await?;
        Ok(quote)
    }

    pub async fn update_order_status(&self, reference: &str, status: &OrderStatus) -> DbResult<()> {
        let _guard = self.lock.lock().await;
        let mut orders: Vec<Order> = self.read(ORDERS_FILE).await?;
        let order = orders
            .iter_mut()
            .find(|order| order.reference == reference)
            .ok_or(DbError::NotFound)?;
        order.status = status.clone();
        self.write(ORDERS_FILE, &orders).await
    }

    pub async fn update_quote(&self, reference: &str, update: &QuoteUpdate) -> DbResult<()> {
        let _guard = self.lock.lock().await;
        let mut quotes: Vec<Quote> = self.read(QUOTES_FILE).await?;
        let quote = quotes
            .iter_mut()
            .find(|quote| quote.reference == reference)
            .ok_or(DbError::NotFound)?;
        update.apply(quote, Utc::now());
        self.write(QUOTES_FILE, &quotes).await
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> DbResult<Vec<T>> {
        match fs::read(self.dir.join(file)).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write<T: Serialize>(&self, file: &str, rows: &[T]) -> DbResult<()> {
        fs::create_dir_all(self.dir.as_path()).await?;
        let target = self.dir.join(file);
        let staging = self.dir.join(format!("{file}.tmp"));
        fs::write(&staging, serde_json::to_vec_pretty(rows)?).await?;
        fs::rename(&staging, &target).await?;
        debug!(path = %target.display(), rows = rows.len(), "local store written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::{NewOrder, OrderDetails};
    use uuid::Uuid;

    fn order(reference: &str) -> Order {
        NewOrder {
            reference: reference.into(),
            details: OrderDetails {
                client_name: "Ada".into(),
                client_email: "ada@example.com".into(),
                ..OrderDetails::default()
            },
            phone: None,
        }
        .into_order(Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("nested"));
        assert!(store.orders().await.unwrap().is_empty());
        assert!(store.quotes().await.unwrap().is_empty());
        assert!(store.order_by_ref("FT-1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn new_orders_are_prepended_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path());
        store.create_order(order("FT-1")).await.unwrap();
        store.create_order(order("FT-2")).await.unwrap();

        let reopened = LocalStore::open(dir.path());
        let refs: Vec<String> = reopened
            .orders()
            .await
            .unwrap()
            .into_iter()
            .map(|order| order.reference)
            .collect();
        assert_eq!(refs, ["FT-2", "FT-1"]);
        assert!(dir.path().join(ORDERS_FILE).exists());
    }

    #[tokio::test]
    async fn status_update_reports_unknown_refs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path());
        store.create_order(order("FT-1")).await.unwrap();

        store
            .update_order_status("FT-1", &OrderStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            store.order_by_ref("FT-1").await.unwrap().status,
            OrderStatus::InProgress
        );
        let missing = store.update_order_status("FT-9", &OrderStatus::Complete).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }
}
