//! Directory objects as they appear in Graph listings.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::directory::ObjectPager;
use crate::error::{DirectoryError, DirectoryResult};

/// An entry of a member or owner listing.
///
/// Graph marks each entry with an `@odata.type` discriminant. Kinds this
/// crate does not know deserialize to `Unknown` so that new directory object
/// types do not break existing listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@odata.type")]
pub enum DirectoryObject {
    #[serde(rename = "#microsoft.graph.user")]
    User {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "#microsoft.graph.group")]
    Group {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(rename = "#microsoft.graph.servicePrincipal")]
    ServicePrincipal {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl DirectoryObject {
    /// A user with the given object ID.
    pub fn user(id: impl Into<String>) -> Self {
        Self::User { id: Some(id.into()) }
    }

    /// A group with the given object ID.
    pub fn group(id: impl Into<String>) -> Self {
        Self::Group { id: Some(id.into()) }
    }

    /// A service principal with the given object ID.
    pub fn service_principal(id: impl Into<String>) -> Self {
        Self::ServicePrincipal { id: Some(id.into()) }
    }

    /// Returns the kind, or `None` for unknown kinds.
    #[must_use]
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            Self::User { .. } => Some(ObjectKind::User),
            Self::Group { .. } => Some(ObjectKind::Group),
            Self::ServicePrincipal { .. } => Some(ObjectKind::ServicePrincipal),
            Self::Unknown => None,
        }
    }

    /// Returns the object ID if present.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::User { id } | Self::Group { id } | Self::ServicePrincipal { id } => id.as_deref(),
            Self::Unknown => None,
        }
    }
}

/// Known directory object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    User,
    Group,
    ServicePrincipal,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Group => "group",
            Self::ServicePrincipal => "service principal",
        })
    }
}

/// Minimal projection of a group returned by display name lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryGroup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl DirectoryGroup {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            display_name: Some(display_name.into()),
        }
    }
}

/// One page of a paginated Graph response.
#[derive(Debug, Deserialize)]
pub struct ODataPage<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl<T: DeserializeOwned> ODataPage<T> {
    /// Decodes a raw page body.
    pub fn from_json(body: serde_json::Value) -> DirectoryResult<Self> {
        serde_json::from_value(body)
            .map_err(|e| DirectoryError::Permanent(format!("malformed listing page: {e}")))
    }
}

#[derive(Debug)]
enum PageSource {
    Decoded(Vec<DirectoryObject>),
    Raw(serde_json::Value),
    Failed(DirectoryError),
}

/// An [`ObjectPager`] over pages that are already in hand.
///
/// Raw Graph page bodies are decoded only when their page is reached, so a
/// malformed page surfaces as a pagination failure at that point. Adapters
/// that prefetch listings and tests both build on this.
#[derive(Debug, Default)]
pub struct PagedListing {
    pages: VecDeque<PageSource>,
}

impl PagedListing {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing with a single page.
    #[must_use]
    pub fn single(objects: Vec<DirectoryObject>) -> Self {
        Self::new().page(objects)
    }

    /// Appends a page of decoded objects.
    #[must_use]
    pub fn page(mut self, objects: Vec<DirectoryObject>) -> Self {
        self.pages.push_back(PageSource::Decoded(objects));
        self
    }

    /// Appends a raw `OData` page body.
    #[must_use]
    pub fn raw_page(mut self, body: serde_json::Value) -> Self {
        self.pages.push_back(PageSource::Raw(body));
        self
    }

    /// Appends a page whose fetch fails.
    #[must_use]
    pub fn failing_page(mut self, error: DirectoryError) -> Self {
        self.pages.push_back(PageSource::Failed(error));
        self
    }

    /// Number of pages not yet fetched.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pages.len()
    }
}

#[async_trait]
impl ObjectPager for PagedListing {
    async fn next_page(&mut self) -> DirectoryResult<Option<Vec<DirectoryObject>>> {
        match self.pages.pop_front() {
            None => Ok(None),
            Some(PageSource::Decoded(objects)) => Ok(Some(objects)),
            Some(PageSource::Raw(body)) => {
                ODataPage::<DirectoryObject>::from_json(body).map(|page| Some(page.value))
            }
            Some(PageSource::Failed(error)) => Err(error),
        }
    }
}
