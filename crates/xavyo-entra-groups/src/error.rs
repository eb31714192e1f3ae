//! Error types for group membership reconciliation.

use std::time::Duration;
use thiserror::Error;

use crate::directory::{MembershipWrite, Relation, WriteAction};
use crate::object::ObjectKind;
use crate::reconciler::ReconcilePhase;

/// Result type alias for directory capability calls.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Result type alias using `ReconcileError`.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors reported by the directory capabilities (writes, listings, lookups).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Throttling, a momentary network failure or a 5xx from the service.
    #[error("transient directory error: {0}")]
    Transient(String),

    /// The service rejected the request and retrying cannot change that.
    #[error("directory rejected request: {0}")]
    Permanent(String),

    /// The addressed object is not (yet) visible to the service.
    #[error("directory object not found: {0}")]
    NotFound(String),
}

impl DirectoryError {
    /// Check if this error is worth retrying.
    ///
    /// `NotFound` counts as transient: an object created moments ago may not
    /// have replicated to the replica serving the write.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::NotFound(_))
    }
}

/// Errors that can occur while reconciling group membership or ownership.
#[derive(Debug, Error)]
pub enum ReconcileError {
    // Configuration errors
    /// Configuration value is invalid.
    #[error("Configuration invalid for {var}: {reason}")]
    Config { var: String, reason: String },

    // Write path
    /// Every attempt of a write failed transiently.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    TransientWrite {
        operation: String,
        attempts: u32,
        #[source]
        source: DirectoryError,
    },

    /// The service rejected a write permanently.
    #[error("{operation} rejected on attempt {attempt}: {source}")]
    PermanentWrite {
        operation: String,
        attempt: u32,
        #[source]
        source: DirectoryError,
    },

    // Read path
    /// A directory object of a known kind came back without an object ID.
    #[error("{kind} with null object ID encountered during {context}")]
    DataIntegrity { kind: ObjectKind, context: String },

    /// Opening or advancing a paginated listing failed.
    #[error("during {context}: {source}")]
    Pagination {
        context: String,
        #[source]
        source: DirectoryError,
    },

    /// The awaited fact never became observable within the poll budget.
    ///
    /// `last_read_error` keeps the most recent failed read, if the final poll
    /// failed, without making it part of the message.
    #[error("timed out after {elapsed:?} waiting for {operation} of {target} ({polls} polls)")]
    ConvergenceTimeout {
        target: String,
        operation: String,
        elapsed: Duration,
        polls: u32,
        last_read_error: Option<Box<ReconcileError>>,
    },

    /// The operation was aborted through its cancellation token.
    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    // Context wrappers
    /// A single reconciliation failed in the given phase.
    #[error("{fact} failed while {phase}: {source}")]
    Phase {
        fact: MembershipWrite,
        phase: ReconcilePhase,
        #[source]
        source: Box<ReconcileError>,
    },

    /// A batch stopped at `object_id`; the first `completed` entries stay applied.
    #[error("while {action} {relation}s of group {group_id:?} ({completed} applied, stopped at {object_id:?}): {source}")]
    Batch {
        action: WriteAction,
        relation: Relation,
        group_id: String,
        object_id: String,
        completed: usize,
        #[source]
        source: Box<ReconcileError>,
    },

    // Group lookup
    /// Listing groups by display name failed.
    #[error("listing groups with display name {display_name:?}: {source}")]
    Lookup {
        display_name: String,
        #[source]
        source: DirectoryError,
    },

    /// No group carries the display name.
    #[error("found no groups with display name {0:?}")]
    GroupNotFound(String),

    /// More than one group carries the display name.
    #[error("found {count} groups with display name {display_name:?}")]
    AmbiguousGroup { display_name: String, count: usize },

    /// A lookup result is missing an attribute the caller relies on.
    #[error("group matching {display_name:?} has no {attribute}")]
    MissingAttribute {
        display_name: String,
        attribute: &'static str,
    },

    /// The service matched a group whose display name differs from the query.
    #[error("display name of group does not match ({found:?} != {expected:?})")]
    DisplayNameMismatch { expected: String, found: String },

    /// A group with the name already exists and duplicates are not allowed.
    #[error("existing group with name {name:?} (ID: {id:?}) was found and duplicate names are not allowed")]
    DuplicateGroupName { name: String, id: String },

    // Identifiers
    /// A relationship resource ID could not be parsed.
    #[error("unable to parse {expected} ID {id:?}: {reason}")]
    InvalidId {
        id: String,
        expected: &'static str,
        reason: String,
    },
}

impl ReconcileError {
    /// Returns the innermost error, looking through `Phase` and `Batch` context.
    #[must_use]
    pub fn root_cause(&self) -> &ReconcileError {
        match self {
            Self::Phase { source, .. } | Self::Batch { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if the root cause is a convergence timeout.
    #[must_use]
    pub fn is_convergence_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::ConvergenceTimeout { .. })
    }

    /// Check if the root cause is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled { .. })
    }

    /// Check if re-invoking the whole operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self.root_cause() {
            Self::TransientWrite { .. } | Self::ConvergenceTimeout { .. } => true,
            Self::Pagination { source, .. } | Self::Lookup { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Returns the phase the reconciliation failed in, if known.
    #[must_use]
    pub fn phase(&self) -> Option<ReconcilePhase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            Self::Batch { source, .. } => source.phase(),
            _ => None,
        }
    }
}
