use entity::Client;
use platform_db::DbResult;

use crate::{Backend, traced};

pub struct ClientsApi<'a> {
    backend: &'a Backend,
}

impl<'a> ClientsApi<'a> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    /// Everyone who has ordered or asked for a quote, newest first. The local
    /// store keeps no client table, so it lists nobody.
    pub async fn get_all(&self) -> DbResult<Vec<Client>> {
        let result = match self.backend {
            Backend::Hosted(client) => {
                client
                    .from("clients")
                    .select("*")
                    .order_desc("created_at")
                    .fetch()
                    .await
            }
            Backend::Local(_) => Ok(Vec::new()),
        };
        traced("clients.getAll", result)
    }
}
