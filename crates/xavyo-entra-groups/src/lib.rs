//! Group membership reconciliation for Microsoft Entra ID
//!
//! Entra ID acknowledges membership writes before they are visible to
//! subsequent reads. This crate adds members and owners to groups and only
//! reports success once the directory's own listings reflect the change.
//!
//! # Features
//!
//! - Flattening of paginated, polymorphic member/owner listings into object IDs
//! - Fixed-delay bounded retry of writes
//! - Convergence polling with a mandatory timeout
//! - Cancellation of every wait through a `CancellationToken`
//! - Group lookup by display name
//!
//! The HTTP client is not part of this crate: callers provide a
//! [`DirectoryMutator`] and a [`DirectoryReader`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use xavyo_entra_groups::{
//!     DirectoryMutator, DirectoryReader, GroupReconciler, ReconcileConfig,
//! };
//!
//! # async fn example<M: DirectoryMutator, R: DirectoryReader>(
//! #     mutator: Arc<M>,
//! #     reader: Arc<R>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let reconciler = GroupReconciler::new(mutator, reader, ReconcileConfig::from_env()?)?;
//! let cancel = CancellationToken::new();
//!
//! reconciler.add_member("group-id", "user-id", &cancel).await?;
//! reconciler.add_owners("group-id", &["owner-1", "owner-2"], &cancel).await?;
//! # Ok(())
//! # }
//! ```

mod clock;
mod config;
mod directory;
mod error;
mod ids;
mod lookup;
mod object;
mod poller;
mod reconciler;
mod resolver;
mod retry;

// Re-exports
pub use config::{
    ReconcileConfig, ReconcileConfigBuilder, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT,
};
pub use directory::{
    DirectoryMutator, DirectoryReader, GroupDirectory, MembershipWrite, ObjectPager, Relation,
    WriteAction,
};
pub use error::{DirectoryError, DirectoryResult, ReconcileError, ReconcileResult};
pub use ids::GroupRelationId;
pub use lookup::{check_name_availability, find_group_by_name, group_by_display_name};
pub use object::{DirectoryGroup, DirectoryObject, ODataPage, ObjectKind, PagedListing};
pub use poller::{ConvergencePoller, PollOptions, Presence};
pub use reconciler::{GroupReconciler, ReconcilePhase};
pub use resolver::resolve_ids;
pub use retry::{BoundedRetrier, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
