//! Connection request document schema
//!
//! Requests are directional: `sender` proposed, `recipient` answers.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for connection requests
pub const CONNECTION_REQUEST_COLLECTION: &str = "connectionrequests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Accepted => write!(f, "accepted"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Key shared by every request between `a` and `b`, whichever way it points
pub fn pair_key(a: &ObjectId, b: &ObjectId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", low.to_hex(), high.to_hex())
}

/// Connection request stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConnectionRequestDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    pub sender: ObjectId,

    pub recipient: ObjectId,

    /// Direction-free key for the user pair, see [`pair_key`]
    pub pair: String,

    #[serde(default)]
    pub status: RequestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime>,
}

impl ConnectionRequestDoc {
    /// New pending request from `sender` to `recipient`
    pub fn new(sender: ObjectId, recipient: ObjectId) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            sender,
            recipient,
            pair: pair_key(&sender, &recipient),
            status: RequestStatus::Pending,
            responded_at: None,
        }
    }

    /// The endpoint that is not `viewer`
    pub fn other_party(&self, viewer: &ObjectId) -> ObjectId {
        if &self.sender != viewer {
            self.sender
        } else {
            self.recipient
        }
    }

    /// Whether this request joins `a` and `b` in either direction
    pub fn joins(&self, a: &ObjectId, b: &ObjectId) -> bool {
        (&self.sender == a && &self.recipient == b) || (&self.sender == b && &self.recipient == a)
    }

    /// Creation time in milliseconds, 0 when unknown
    pub fn created_millis(&self) -> i64 {
        self.metadata
            .created_at
            .map(|d| d.timestamp_millis())
            .unwrap_or(0)
    }
}

impl Default for ConnectionRequestDoc {
    fn default() -> Self {
        Self::new(ObjectId::new(), ObjectId::new())
    }
}

impl IntoIndexes for ConnectionRequestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one pending request per pair
            (
                doc! { "pair": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "status": "pending" })
                        .name("pending_pair_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "sender": 1, "recipient": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("pair_status_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "recipient": 1 },
                Some(
                    IndexOptions::builder()
                        .name("recipient_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ConnectionRequestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
