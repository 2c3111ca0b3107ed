use std::{fmt, str::FromStr};

use chrono::Utc;
use entity::{
    AuthorType, OrderStatus, RecordId, RevisionFile, RevisionNote, RevisionRound, RoundStatus,
};
use platform_db::{BackendClient, ChangeEvent, ChangeFilter, DbResult, Subscription};
use serde_json::json;
use tracing::info;

use crate::{
    Backend, DELIVERABLES_BUCKET, FileUpload,
    orders::{expect_rows, hosted, store_and_record},
    millis_now, traced,
};

/// When approving a round completes the parent order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Any single approval completes the order.
    #[default]
    AnyRoundApproved,
    /// The order completes once none of its rounds is still pending.
    AllRoundsApproved,
}

impl FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" | "any-round" => Ok(CompletionPolicy::AnyRoundApproved),
            "all" | "all-rounds" => Ok(CompletionPolicy::AllRoundsApproved),
            other => Err(format!("unknown completion policy {other:?} (expected any or all)")),
        }
    }
}

impl fmt::Display for CompletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompletionPolicy::AnyRoundApproved => "any",
            CompletionPolicy::AllRoundsApproved => "all",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Approval {
    pub round_id: RecordId,
    pub order_completed: bool,
}

pub struct RevisionsApi<'a> {
    backend: &'a Backend,
    completion: CompletionPolicy,
}

impl<'a> RevisionsApi<'a> {
    pub(crate) fn new(backend: &'a Backend, completion: CompletionPolicy) -> Self {
        Self {
            backend,
            completion,
        }
    }

    /// Open a round for a freshly delivered draft.
    pub async fn create_round(
        &self,
        order_id: RecordId,
        round_number: i32,
    ) -> DbResult<RevisionRound> {
        let client = hosted(self.backend, "revisions.createRound")?;
        let result = client
            .from("revision_rounds")
            .insert(&json!({
                "order_id": order_id,
                "round_number": round_number,
                "status": RoundStatus::Pending,
                "delivered_at": Utc::now(),
            }))
            .await;
        traced("revisions.createRound", result)
    }

    pub async fn upload_deliverable(
        &self,
        order_ref: &str,
        round_id: RecordId,
        file: FileUpload,
    ) -> DbResult<String> {
        let client = hosted(self.backend, "revisions.uploadDeliverable")?;
        let path = format!("{order_ref}/round-{round_id}/{}-{}", millis_now(), file.name);
        let row = RevisionFile {
            id: None,
            round_id,
            filename: file.name.clone(),
            storage_path: path.clone(),
            file_size: Some(file.size()),
            mime_type: Some(file.mime_type.clone()),
        };
        let result = store_and_record(
            client,
            DELIVERABLES_BUCKET,
            &path,
            file,
            false,
            "revision_files",
            &row,
        )
        .await;
        traced("revisions.uploadDeliverable", result.map(|()| path))
    }

    pub async fn add_note(
        &self,
        round_id: RecordId,
        order_id: RecordId,
        author_type: AuthorType,
        author_name: &str,
        body: &str,
    ) -> DbResult<RevisionNote> {
        let client = hosted(self.backend, "revisions.addNote")?;
        let note = RevisionNote {
            id: None,
            round_id,
            order_id,
            author_type,
            author_name: author_name.to_string(),
            body: body.to_string(),
            created_at: None,
        };
        traced(
            "revisions.addNote",
            client.from("revision_notes").insert(&note).await,
        )
    }

    /// Approve a round, then complete the order as the [`CompletionPolicy`] says.
    pub async fn approve_round(
        &self,
        round_id: RecordId,
        order_id: RecordId,
    ) -> DbResult<Approval> {
        let client = hosted(self.backend, "revisions.approveRound")?;
        let approved = client
            .from("revision_rounds")
            .eq("id", round_id)
            .update(&json!({ "status": RoundStatus::Approved, "approved_at": Utc::now() }))
            .await;
        traced("revisions.approveRound", expect_rows(approved))?;

        let complete = match self.completion {
            CompletionPolicy::AnyRoundApproved => true,
            CompletionPolicy::AllRoundsApproved => {
                traced("revisions.approveRound", all_rounds_approved(client, order_id).await)?
            }
        };
        if complete {
            let marked = client
                .from("orders")
                .eq("id", order_id)
                .update(&json!({ "status": OrderStatus::Complete }))
                .await;
            traced("revisions.completeOrder", marked)?;
            info!(%order_id, %round_id, "order completed on approval");
        }
        Ok(Approval {
            round_id,
            order_completed: complete,
        })
    }

    pub async fn subscribe_to_notes(
        &self,
        order_id: RecordId,
    ) -> DbResult<Subscription<RevisionNote>> {
        match self.backend {
            Backend::Hosted(client) => {
                let filter = ChangeFilter::new(
                    format!("notes-{order_id}"),
                    ChangeEvent::Insert,
                    "revision_notes",
                )
                .with_filter(format!("order_id=eq.{order_id}"));
                traced("revisions.subscribeToNotes", client.subscribe(filter).await)
            }
            Backend::Local(_) => Ok(Subscription::inert()),
        }
    }
}

async fn all_rounds_approved(client: &BackendClient, order_id: RecordId) -> DbResult<bool> {
    let rounds: Vec<RevisionRound> = client
        .from("revision_rounds")
        .select("*")
        .eq("order_id", order_id)
        .fetch()
        .await?;
    Ok(rounds.iter().all(RevisionRound::is_approved))
}
