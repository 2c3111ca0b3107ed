//! Rows exchanged with the hosted backend.
//!
//! Column names follow the backend tables verbatim (`snake_case`), so these
//! types serialize straight into REST payloads and deserialize from query
//! results, including the nested `select=*, child(*)` embeddings.

pub mod clients;
pub mod orders;
pub mod quotes;
pub mod revisions;

pub use clients::Client;
pub use orders::{NewOrder, Order, OrderDetails, OrderFile, OrderStatus};
pub use quotes::{NewQuote, Quote, QuoteDetails, QuoteFile, QuoteUpdate};
pub use revisions::{AuthorType, RevisionFile, RevisionNote, RevisionRound, RoundStatus};

/// Primary key type used by every table.
pub type RecordId = uuid::Uuid;
