use chrono::Utc;
use entity::{NewQuote, Quote, QuoteFile, QuoteUpdate, RecordId, quotes::QUOTE_RECEIVED};
use platform_db::{BackendClient, ChangeEvent, ChangeFilter, DbResult, Subscription};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    Backend, FileUpload, QUOTES_BUCKET,
    orders::{expect_rows, hosted, store_and_record},
    millis_now, traced,
};

#[derive(Serialize)]
struct QuoteInsert<'a> {
    #[serde(flatten)]
    quote: &'a NewQuote,
    status: &'static str,
}

pub struct QuotesApi<'a> {
    backend: &'a Backend,
}

impl<'a> QuotesApi<'a> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    pub async fn get_all(&self) -> DbResult<Vec<Quote>> {
        let result = match self.backend {
            Backend::Hosted(client) => {
                client
                    .from("quotes")
                    .select("*, quote_files(*)")
                    .order_desc("created_at")
                    .fetch()
                    .await
            }
            Backend::Local(store) => store.quotes().await,
        };
        traced("quotes.getAll", result)
    }

    pub async fn create(&self, new_quote: NewQuote) -> DbResult<Quote> {
        let result = match self.backend {
            Backend::Hosted(client) => create_hosted(client, &new_quote).await,
            Backend::Local(store) => {
                let quote = new_quote.into_quote(Uuid::new_v4(), Utc::now());
                store.create_quote(quote).await
            }
        };
        traced("quotes.create", result)
    }

    /// Write the fields set in `update` and stamp `updated_at`.
    pub async fn update(&self, reference: &str, update: &QuoteUpdate) -> DbResult<()> {
        let result = match self.backend {
            Backend::Hosted(client) => {
                let mut patch = serde_json::to_value(update)?;
                if let Value::Object(fields) = &mut patch {
                    fields.insert("updated_at".into(), serde_json::to_value(Utc::now())?);
                }
                let changed = client.from("quotes").eq("ref", reference).update(&patch).await;
                expect_rows(changed)
            }
            Backend::Local(store) => store.update_quote(reference, update).await,
        };
        traced("quotes.update", result)
    }

    /// Store a reference file under the quote's form `section`.
    pub async fn upload_file(
        &self,
        quote_id: RecordId,
        quote_ref: &str,
        section: &str,
        file: FileUpload,
    ) -> DbResult<String> {
        let client = hosted(self.backend, "quotes.uploadFile")?;
        let path = format!("{quote_ref}/{section}/{}-{}", millis_now(), file.name);
        let row = QuoteFile {
            id: None,
            quote_id,
            section: section.to_string(),
            filename: file.name.clone(),
            storage_path: path.clone(),
            file_size: Some(file.size()),
            mime_type: Some(file.mime_type.clone()),
        };
        let result =
            store_and_record(client, QUOTES_BUCKET, &path, file, false, "quote_files", &row).await;
        traced("quotes.uploadFile", result.map(|()| path))
    }

    pub async fn subscribe_to_new(&self) -> DbResult<Subscription<Quote>> {
        match self.backend {
            Backend::Hosted(client) => {
                let filter = ChangeFilter::new("quotes-insert", ChangeEvent::Insert, "quotes");
                traced("quotes.subscribeToNew", client.subscribe(filter).await)
            }
            Backend::Local(_) => Ok(Subscription::inert()),
        }
    }
}

async fn create_hosted(client: &BackendClient, new_quote: &NewQuote) -> DbResult<Quote> {
    client
        .from("clients")
        .on_conflict("email")
        .upsert(&new_quote.client())
        .await?;
    client
        .from("quotes")
        .insert(&QuoteInsert {
            quote: new_quote,
            status: QUOTE_RECEIVED,
        })
        .await
}
