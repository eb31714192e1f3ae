//! Composite IDs for group relationships.
//!
//! A membership or ownership has no object ID of its own in the directory.
//! Callers that track relationships as resources address them as
//! `{group_id}/{member|owner}/{object_id}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::directory::Relation;
use crate::error::{ReconcileError, ReconcileResult};

/// ID of a single member or owner relationship of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupRelationId {
    group_id: String,
    relation: Relation,
    object_id: String,
}

impl GroupRelationId {
    pub fn new(
        group_id: impl Into<String>,
        relation: Relation,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            relation,
            object_id: object_id.into(),
        }
    }

    /// Membership of `member_id` in `group_id`.
    pub fn member(group_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self::new(group_id, Relation::Member, member_id)
    }

    /// Ownership of `group_id` by `owner_id`.
    pub fn owner(group_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self::new(group_id, Relation::Owner, owner_id)
    }

    /// Parses an ID and checks it names the expected relation.
    pub fn parse_as(id: &str, relation: Relation) -> ReconcileResult<Self> {
        let parsed: Self = id.parse()?;
        if parsed.relation != relation {
            return Err(ReconcileError::InvalidId {
                id: id.to_string(),
                expected: relation.as_str(),
                reason: format!("expected a {relation} ID, found a {} ID", parsed.relation),
            });
        }
        Ok(parsed)
    }

    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    #[must_use]
    pub fn relation(&self) -> Relation {
        self.relation
    }

    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl fmt::Display for GroupRelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group_id, self.relation, self.object_id)
    }
}

impl FromStr for GroupRelationId {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ReconcileError::InvalidId {
            id: s.to_string(),
            expected: "group relationship",
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split('/').collect();
        let [group_id, relation, object_id] = parts.as_slice() else {
            return Err(invalid("expected {groupId}/{type}/{objectId}"));
        };

        if group_id.is_empty() {
            return Err(invalid("group ID is empty"));
        }
        if object_id.is_empty() {
            return Err(invalid("object ID is empty"));
        }

        let relation = match *relation {
            "member" => Relation::Member,
            "owner" => Relation::Owner,
            other => return Err(invalid(&format!("unknown relationship type {other:?}"))),
        };

        Ok(Self::new(*group_id, relation, *object_id))
    }
}

impl TryFrom<String> for GroupRelationId {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupRelationId> for String {
    fn from(id: GroupRelationId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_format() {
        let id = GroupRelationId::member("group-1", "user-42");
        assert_eq!(id.to_string(), "group-1/member/user-42");
    }

    #[test]
    fn test_parse_owner_id() {
        let id: GroupRelationId = "group-1/owner/sp-7".parse().unwrap();
        assert_eq!(id.group_id(), "group-1");
        assert_eq!(id.relation(), Relation::Owner);
        assert_eq!(id.object_id(), "sp-7");
    }

    #[test]
    fn test_parse_as_wrong_relation() {
        let err = GroupRelationId::parse_as("group-1/owner/sp-7", Relation::Member).unwrap_err();
        assert!(err.to_string().contains("expected a member ID"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("group-1/member".parse::<GroupRelationId>().is_err());
        assert!("group-1/member/a/b".parse::<GroupRelationId>().is_err());
        assert!("/member/user-1".parse::<GroupRelationId>().is_err());
        assert!("group-1/member/".parse::<GroupRelationId>().is_err());
        assert!("group-1/admin/user-1".parse::<GroupRelationId>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id = GroupRelationId::owner("g", "u");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, "g/owner/u");

        let back: GroupRelationId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<GroupRelationId>(serde_json::json!("nope")).is_err());
    }
}
