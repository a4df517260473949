//! Connection graph: suggestions, status labels and request handling

pub mod requests;
pub mod status;
pub mod suggest;

pub use requests::{RequestResponse, RequestService};
pub use status::{label_for, resolve_statuses, ConnectionStatus};
pub use suggest::{SuggestedConnection, SuggestionService};
