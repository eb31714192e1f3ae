//! Write-then-confirm reconciliation of group members and owners.
//!
//! Each operation runs `Writing -> Confirming -> Done`: the write goes through
//! the [`BoundedRetrier`](crate::BoundedRetrier), and only once it returned
//! success does the [`ConvergencePoller`] re-read the group's listing until
//! the change is observable. Any failure ends in `Failed` and is surfaced with
//! the write and phase attached.
//!
//! Batches are processed strictly in order and stop at the first failure.
//! Entries reconciled before the failure stay applied.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ReconcileConfig;
use crate::directory::{DirectoryMutator, DirectoryReader, MembershipWrite, Relation, WriteAction};
use crate::error::{ReconcileError, ReconcileResult};
use crate::poller::ConvergencePoller;
use crate::resolver::resolve_ids;

/// Phase of a single reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Writing,
    Confirming,
    Done,
    Failed,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Writing => "writing",
            Self::Confirming => "confirming",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Reconciles group membership and ownership against an eventually
/// consistent directory.
///
/// Holds no mutable state; calls on different groups are independent and may
/// run concurrently. Concurrent writers to the same group are not
/// coordinated, the directory decides between them.
#[derive(Debug)]
pub struct GroupReconciler<M, R> {
    mutator: Arc<M>,
    reader: Arc<R>,
    config: ReconcileConfig,
}

impl<M, R> Clone for GroupReconciler<M, R> {
    fn clone(&self) -> Self {
        Self {
            mutator: Arc::clone(&self.mutator),
            reader: Arc::clone(&self.reader),
            config: self.config.clone(),
        }
    }
}

impl<M, R> GroupReconciler<M, R>
where
    M: DirectoryMutator,
    R: DirectoryReader,
{
    /// Creates a reconciler over the given directory capabilities.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration does not validate.
    pub fn new(mutator: Arc<M>, reader: Arc<R>, config: ReconcileConfig) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self {
            mutator,
            reader,
            config,
        })
    }

    /// Returns a reconciler sharing the same capabilities with another configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration does not validate.
    pub fn with_config(&self, config: ReconcileConfig) -> ReconcileResult<Self> {
        Self::new(Arc::clone(&self.mutator), Arc::clone(&self.reader), config)
    }

    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Lists the object IDs of all members of the group.
    pub async fn list_members(&self, group_id: &str) -> ReconcileResult<Vec<String>> {
        self.list(group_id, Relation::Member).await
    }

    /// Lists the object IDs of all owners of the group.
    pub async fn list_owners(&self, group_id: &str) -> ReconcileResult<Vec<String>> {
        self.list(group_id, Relation::Owner).await
    }

    /// Lists the object IDs related to the group, resolving every page.
    ///
    /// # Errors
    ///
    /// `Pagination` if the listing cannot be opened or advanced,
    /// `DataIntegrity` if an entry lacks its object ID.
    pub async fn list(&self, group_id: &str, relation: Relation) -> ReconcileResult<Vec<String>> {
        let context = format!("listing {relation}s of group {group_id:?}");
        let mut pager = self
            .reader
            .list(group_id, relation)
            .await
            .map_err(|source| ReconcileError::Pagination {
                context: context.clone(),
                source,
            })?;
        resolve_ids(pager.as_mut(), &context).await
    }

    /// Adds a member and waits until the membership is observable.
    pub async fn add_member(
        &self,
        group_id: &str,
        member_id: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let write = MembershipWrite::add(Relation::Member, group_id, member_id);
        self.reconcile(&write, cancel).await.map(|_| ())
    }

    /// Adds an owner and waits until the ownership is observable.
    pub async fn add_owner(
        &self,
        group_id: &str,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let write = MembershipWrite::add(Relation::Owner, group_id, owner_id);
        self.reconcile(&write, cancel).await.map(|_| ())
    }

    /// Removes a member and waits until it no longer shows in the listing.
    pub async fn remove_member(
        &self,
        group_id: &str,
        member_id: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let write = MembershipWrite::remove(Relation::Member, group_id, member_id);
        self.reconcile(&write, cancel).await.map(|_| ())
    }

    /// Removes an owner and waits until it no longer shows in the listing.
    pub async fn remove_owner(
        &self,
        group_id: &str,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        let write = MembershipWrite::remove(Relation::Owner, group_id, owner_id);
        self.reconcile(&write, cancel).await.map(|_| ())
    }

    /// Adds members one at a time, stopping at the first failure.
    pub async fn add_members<S>(
        &self,
        group_id: &str,
        member_ids: &[S],
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>
    where
        S: AsRef<str> + Sync,
    {
        self.reconcile_batch(WriteAction::Add, Relation::Member, group_id, member_ids, cancel)
            .await
    }

    /// Adds owners one at a time, stopping at the first failure.
    pub async fn add_owners<S>(
        &self,
        group_id: &str,
        owner_ids: &[S],
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>
    where
        S: AsRef<str> + Sync,
    {
        self.reconcile_batch(WriteAction::Add, Relation::Owner, group_id, owner_ids, cancel)
            .await
    }

    /// Removes members one at a time, stopping at the first failure.
    pub async fn remove_members<S>(
        &self,
        group_id: &str,
        member_ids: &[S],
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>
    where
        S: AsRef<str> + Sync,
    {
        self.reconcile_batch(WriteAction::Remove, Relation::Member, group_id, member_ids, cancel)
            .await
    }

    /// Removes owners one at a time, stopping at the first failure.
    pub async fn remove_owners<S>(
        &self,
        group_id: &str,
        owner_ids: &[S],
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>
    where
        S: AsRef<str> + Sync,
    {
        self.reconcile_batch(WriteAction::Remove, Relation::Owner, group_id, owner_ids, cancel)
            .await
    }

    /// Applies `write` and waits for it to converge.
    ///
    /// Returns the listing observed at convergence.
    ///
    /// # Errors
    ///
    /// `Phase` wrapping the retrier's or poller's error, tagged with the phase
    /// it failed in.
    #[instrument(
        skip(self, write, cancel),
        fields(write = %write, relation_id = %write.relation_id())
    )]
    pub async fn reconcile(
        &self,
        write: &MembershipWrite,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Vec<String>> {
        info!(phase = %ReconcilePhase::Writing, "Applying write");
        let operation = write.to_string();
        let mutator = &self.mutator;
        self.config
            .retrier()
            .run(&operation, cancel, move || mutator.apply(write))
            .await
            .map_err(|e| failed(write, ReconcilePhase::Writing, e))?;

        info!(phase = %ReconcilePhase::Confirming, "Write accepted, waiting for convergence");
        let presence = write.action.expected_presence();
        let poller = ConvergencePoller::new(self.config.poll_options(presence));
        let group_id = write.group_id.as_str();
        let relation = write.relation;
        let observed = poller
            .wait(&write.object_id, &write.fact_description(), cancel, move || {
                self.list(group_id, relation)
            })
            .await
            .map_err(|e| failed(write, ReconcilePhase::Confirming, e))?;

        info!(phase = %ReconcilePhase::Done, observed = observed.len(), "Write converged");
        Ok(observed)
    }

    #[instrument(skip(self, object_ids, cancel), fields(count = object_ids.len()))]
    async fn reconcile_batch<S>(
        &self,
        action: WriteAction,
        relation: Relation,
        group_id: &str,
        object_ids: &[S],
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>
    where
        S: AsRef<str> + Sync,
    {
        for (completed, object_id) in object_ids.iter().enumerate() {
            let object_id = object_id.as_ref();
            let write = match action {
                WriteAction::Add => MembershipWrite::add(relation, group_id, object_id),
                WriteAction::Remove => MembershipWrite::remove(relation, group_id, object_id),
            };

            if let Err(e) = self.reconcile(&write, cancel).await {
                warn!(completed, object_id, error = %e, "Batch stopped");
                return Err(ReconcileError::Batch {
                    action,
                    relation,
                    group_id: group_id.to_string(),
                    object_id: object_id.to_string(),
                    completed,
                    source: Box::new(e),
                });
            }
        }

        info!(count = object_ids.len(), "Batch reconciled");
        Ok(())
    }
}

fn failed(
    write: &MembershipWrite,
    phase: ReconcilePhase,
    source: ReconcileError,
) -> ReconcileError {
    warn!(
        phase = %ReconcilePhase::Failed,
        failed_while = %phase,
        error = %source,
        "Reconciliation failed"
    );
    ReconcileError::Phase {
        fact: write.clone(),
        phase,
        source: Box::new(source),
    }
}
