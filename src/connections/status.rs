//! Relationship status resolution
//!
//! Maps each suggested candidate to how they relate to the viewer, derived
//! purely from the connection requests touching the viewer. Nothing here
//! touches a store.
//!
//! When several requests exist between the viewer and the same person, the
//! most recently created one decides the label. Equal creation times fall back
//! to input order, last one wins.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::db::schemas::{ConnectionRequestDoc, RequestStatus};

/// How a candidate relates to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Viewer sent a request that is awaiting the candidate
    Pending,
    /// Candidate sent a request that is awaiting the viewer
    Received,
    /// The latest request between the two was rejected
    Rejected,
    #[default]
    NotConnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Pending => write!(f, "pending"),
            ConnectionStatus::Received => write!(f, "received"),
            ConnectionStatus::Rejected => write!(f, "rejected"),
            ConnectionStatus::NotConnected => write!(f, "not_connected"),
        }
    }
}

/// Label a single request from the viewer's point of view.
///
/// Accepted requests carry no label; accepted pairs are expected to be
/// excluded upstream through the connections set.
pub fn label_for(viewer: &ObjectId, request: &ConnectionRequestDoc) -> Option<ConnectionStatus> {
    match request.status {
        RequestStatus::Pending if &request.sender == viewer => Some(ConnectionStatus::Pending),
        RequestStatus::Pending => Some(ConnectionStatus::Received),
        RequestStatus::Rejected => Some(ConnectionStatus::Rejected),
        RequestStatus::Accepted => None,
    }
}

/// Pick the most recent request per other party
fn latest_per_party<'a>(
    viewer: &ObjectId,
    requests: &'a [ConnectionRequestDoc],
) -> HashMap<ObjectId, &'a ConnectionRequestDoc> {
    let mut latest: HashMap<ObjectId, &ConnectionRequestDoc> = HashMap::new();

    for request in requests {
        if &request.sender != viewer && &request.recipient != viewer {
            continue;
        }
        let other = request.other_party(viewer);

        match latest.get(&other) {
            Some(current) if current.created_millis() > request.created_millis() => {}
            _ => {
                latest.insert(other, request);
            }
        }
    }

    latest
}

/// Resolve a label for every candidate.
///
/// Candidates without any labelled request default to `NotConnected`.
pub fn resolve_statuses(
    viewer: &ObjectId,
    candidates: &[ObjectId],
    requests: &[ConnectionRequestDoc],
) -> HashMap<ObjectId, ConnectionStatus> {
    let latest = latest_per_party(viewer, requests);

    debug!(
        "Resolving {} candidates against {} requests ({} counterparties)",
        candidates.len(),
        requests.len(),
        latest.len()
    );

    candidates
        .iter()
        .map(|candidate| {
            let status = latest
                .get(candidate)
                .and_then(|request| label_for(viewer, request))
                .unwrap_or_default();
            (*candidate, status)
        })
        .collect()
}
