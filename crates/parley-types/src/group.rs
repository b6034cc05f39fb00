//! Group directory entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::GroupId;

/// The slice of a group the gateway needs: its id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: String,
}

/// A group row in the directory, with its member count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
}
