//! Capabilities the reconciler consumes from the directory service.
//!
//! The HTTP client, token handling and request marshaling live behind these
//! traits. Implementations must be safe to call repeatedly: a write may be
//! retried after the service already applied it, and the service is expected
//! to treat a duplicate add as a no-op.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DirectoryResult;
use crate::ids::GroupRelationId;
use crate::object::{DirectoryGroup, DirectoryObject};
use crate::poller::Presence;

/// Relationship between a directory object and a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The object is a member of the group.
    Member,
    /// The object owns the group.
    Owner,
}

impl Relation {
    /// Path segment used in relationship IDs and Graph URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Owner => "owner",
        }
    }

    /// Name of the fact confirmed for this relation.
    #[must_use]
    pub fn fact_name(&self) -> &'static str {
        match self {
            Self::Member => "group membership",
            Self::Owner => "group ownership",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a membership write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Add,
    Remove,
}

impl WriteAction {
    /// Presence of the object in the listing once the write has converged.
    #[must_use]
    pub fn expected_presence(&self) -> Presence {
        match self {
            Self::Add => Presence::Present,
            Self::Remove => Presence::Absent,
        }
    }
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "adding",
            Self::Remove => "removing",
        })
    }
}

/// A single membership or ownership write handed to a [`DirectoryMutator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipWrite {
    pub action: WriteAction,
    pub relation: Relation,
    pub group_id: String,
    pub object_id: String,
}

impl MembershipWrite {
    /// Write that adds `object_id` to the group.
    pub fn add(
        relation: Relation,
        group_id: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            action: WriteAction::Add,
            relation,
            group_id: group_id.into(),
            object_id: object_id.into(),
        }
    }

    /// Write that removes `object_id` from the group.
    pub fn remove(
        relation: Relation,
        group_id: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            action: WriteAction::Remove,
            relation,
            group_id: group_id.into(),
            object_id: object_id.into(),
        }
    }

    /// Composite ID of the relationship this write affects.
    #[must_use]
    pub fn relation_id(&self) -> GroupRelationId {
        GroupRelationId::new(&self.group_id, self.relation, &self.object_id)
    }

    /// Description of the awaited fact, e.g. `group membership`.
    #[must_use]
    pub fn fact_description(&self) -> String {
        match self.action {
            WriteAction::Add => self.relation.fact_name().to_string(),
            WriteAction::Remove => format!("removal of {}", self.relation.fact_name()),
        }
    }

    /// `$ref` body pointing at the directory object, as the Graph API expects
    /// it for `POST /groups/{id}/members/$ref`.
    #[must_use]
    pub fn reference_body(&self, base_url: &str) -> serde_json::Value {
        serde_json::json!({
            "@odata.id": format!(
                "{}/directoryObjects/{}",
                base_url.trim_end_matches('/'),
                self.object_id
            )
        })
    }
}

impl fmt::Display for MembershipWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preposition = match self.action {
            WriteAction::Add => "to",
            WriteAction::Remove => "from",
        };
        write!(
            f,
            "{} {} {} {} group {}",
            self.action, self.relation, self.object_id, preposition, self.group_id
        )
    }
}

/// Performs membership writes against the directory.
#[async_trait]
pub trait DirectoryMutator: Send + Sync {
    /// Apply a single write.
    ///
    /// Transient failures are reported with an error whose
    /// [`is_transient`](crate::DirectoryError::is_transient) returns true.
    async fn apply(&self, write: &MembershipWrite) -> DirectoryResult<()>;
}

/// A lazily fetched, paginated listing of directory objects.
#[async_trait]
pub trait ObjectPager: Send {
    /// Fetch the next page, or `None` once the listing is exhausted.
    async fn next_page(&mut self) -> DirectoryResult<Option<Vec<DirectoryObject>>>;
}

/// Read path of the directory.
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    /// Open a listing of the group's members or owners.
    async fn list(&self, group_id: &str, relation: Relation)
        -> DirectoryResult<Box<dyn ObjectPager>>;
}

/// Group search by display name.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// List groups whose display name equals `display_name`.
    async fn groups_by_display_name(&self, display_name: &str)
        -> DirectoryResult<Vec<DirectoryGroup>>;
}
