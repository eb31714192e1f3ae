//! Common test utilities for xavyo-entra-groups integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use xavyo_entra_groups::{
    DirectoryError, DirectoryMutator, DirectoryObject, DirectoryReader, DirectoryResult,
    GroupReconciler, MembershipWrite, ObjectPager, PagedListing, ReconcileConfig, Relation,
    WriteAction,
};

static INIT: Once = Once::new();

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Config with the given poll cadence and a 2s flat retry delay.
pub fn config(poll_interval_secs: u64, poll_timeout_secs: u64) -> ReconcileConfig {
    ReconcileConfig::builder()
        .retry_attempts(10)
        .retry_delay(Duration::from_secs(2))
        .poll_interval(Duration::from_secs(poll_interval_secs))
        .poll_timeout(Duration::from_secs(poll_timeout_secs))
        .build()
        .unwrap()
}

/// Builds a directory object from an ID, using its prefix to pick the kind.
pub fn object_for(id: &str) -> DirectoryObject {
    if id.starts_with("sp-") {
        DirectoryObject::service_principal(id)
    } else if id.starts_with("group-") {
        DirectoryObject::group(id)
    } else {
        DirectoryObject::user(id)
    }
}

#[derive(Debug)]
struct PendingFact {
    write: MembershipWrite,
    reads_left: u32,
}

#[derive(Debug, Default)]
struct State {
    visible: HashMap<(String, Relation), Vec<String>>,
    pending: Vec<PendingFact>,
    never_visible: HashSet<String>,
    write_failures: u32,
    write_error: Option<DirectoryError>,
    read_failures: u32,
    writes: Vec<MembershipWrite>,
    reference_bodies: Vec<Value>,
    reads: u32,
}

/// In-memory eventually consistent directory.
///
/// Accepted writes become visible to listings of the affected group after
/// `lag` further reads of that listing. Listings are served two objects per
/// page, with an unknown-kind entry appended to the last page.
#[derive(Debug)]
pub struct FakeDirectory {
    lag: u32,
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new(lag: u32) -> Arc<Self> {
        Arc::new(Self {
            lag,
            state: Mutex::new(State::default()),
        })
    }

    /// Makes `object_id` visible in the group's listing right away.
    pub fn seed(&self, group_id: &str, relation: Relation, object_id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .visible
            .entry((group_id.to_string(), relation))
            .or_default()
            .push(object_id.to_string());
    }

    /// Writes for `object_id` are accepted but never show up in listings.
    pub fn never_converge(&self, object_id: &str) {
        self.state
            .lock()
            .unwrap()
            .never_visible
            .insert(object_id.to_string());
    }

    /// The next `count` writes fail with `error`.
    pub fn fail_writes(&self, count: u32, error: DirectoryError) {
        let mut state = self.state.lock().unwrap();
        state.write_failures = count;
        state.write_error = Some(error);
    }

    /// The next `count` listings fail on their second page.
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().unwrap().read_failures = count;
    }

    /// Every write attempt seen, including failed ones.
    pub fn writes(&self) -> Vec<MembershipWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    /// `$ref` bodies of every add attempt, as they would be posted to Graph.
    pub fn reference_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().reference_bodies.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn read_count(&self) -> u32 {
        self.state.lock().unwrap().reads
    }

    /// IDs currently visible in the group's listing.
    pub fn visible(&self, group_id: &str, relation: Relation) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .visible
            .get(&(group_id.to_string(), relation))
            .cloned()
            .unwrap_or_default()
    }
}

fn apply_visible(state: &mut State, write: &MembershipWrite) {
    let ids = state
        .visible
        .entry((write.group_id.clone(), write.relation))
        .or_default();
    match write.action {
        WriteAction::Add => {
            if !ids.contains(&write.object_id) {
                ids.push(write.object_id.clone());
            }
        }
        WriteAction::Remove => ids.retain(|id| id != &write.object_id),
    }
}

#[async_trait]
impl DirectoryMutator for FakeDirectory {
    async fn apply(&self, write: &MembershipWrite) -> DirectoryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(write.clone());
        if write.action == WriteAction::Add {
            state.reference_bodies.push(write.reference_body(GRAPH_BASE_URL));
        }

        if state.write_failures > 0 {
            state.write_failures -= 1;
            return Err(state
                .write_error
                .clone()
                .unwrap_or_else(|| DirectoryError::Transient("throttled".into())));
        }

        if state.never_visible.contains(&write.object_id) {
            return Ok(());
        }
        if self.lag == 0 {
            apply_visible(&mut state, write);
        } else {
            state.pending.push(PendingFact {
                write: write.clone(),
                reads_left: self.lag,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryReader for FakeDirectory {
    async fn list(
        &self,
        group_id: &str,
        relation: Relation,
    ) -> DirectoryResult<Box<dyn ObjectPager>> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;

        // replicate facts whose lag has passed, age the rest
        let pending = std::mem::take(&mut state.pending);
        for mut fact in pending {
            let affected = fact.write.group_id == group_id && fact.write.relation == relation;
            if affected && fact.reads_left == 0 {
                apply_visible(&mut state, &fact.write);
                continue;
            }
            if affected {
                fact.reads_left -= 1;
            }
            state.pending.push(fact);
        }

        let ids = state
            .visible
            .get(&(group_id.to_string(), relation))
            .cloned()
            .unwrap_or_default();
        let mut objects: Vec<DirectoryObject> = ids.iter().map(|id| object_for(id)).collect();
        objects.push(DirectoryObject::Unknown);

        let mut listing = PagedListing::new();
        let mut chunks = objects.chunks(2);
        if let Some(first) = chunks.next() {
            listing = listing.page(first.to_vec());
        }
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Ok(Box::new(
                listing.failing_page(DirectoryError::Transient("503 Service Unavailable".into())),
            ));
        }
        for chunk in chunks {
            listing = listing.page(chunk.to_vec());
        }
        Ok(Box::new(listing))
    }
}

/// Reconciler over a single fake directory acting as both mutator and reader.
pub fn reconciler(
    directory: &Arc<FakeDirectory>,
    config: ReconcileConfig,
) -> GroupReconciler<FakeDirectory, FakeDirectory> {
    GroupReconciler::new(Arc::clone(directory), Arc::clone(directory), config).unwrap()
}

/// Mutator that accepts every write.
#[derive(Debug, Default)]
pub struct AcceptAll;

#[async_trait]
impl DirectoryMutator for AcceptAll {
    async fn apply(&self, _write: &MembershipWrite) -> DirectoryResult<()> {
        Ok(())
    }
}

/// Reader serving raw Graph listing pages per group and relation.
#[derive(Debug, Default)]
pub struct GraphPagesReader {
    pages: Mutex<HashMap<(String, Relation), Vec<Value>>>,
    open_error: Mutex<Option<DirectoryError>>,
}

impl GraphPagesReader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_pages(&self, group_id: &str, relation: Relation, pages: Vec<Value>) {
        self.pages
            .lock()
            .unwrap()
            .insert((group_id.to_string(), relation), pages);
    }

    pub fn fail_open(&self, error: DirectoryError) {
        *self.open_error.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl DirectoryReader for GraphPagesReader {
    async fn list(
        &self,
        group_id: &str,
        relation: Relation,
    ) -> DirectoryResult<Box<dyn ObjectPager>> {
        if let Some(error) = self.open_error.lock().unwrap().clone() {
            return Err(error);
        }
        let pages = self
            .pages
            .lock()
            .unwrap()
            .get(&(group_id.to_string(), relation))
            .cloned()
            .unwrap_or_default();
        let listing = pages
            .into_iter()
            .fold(PagedListing::new(), |listing, page| listing.raw_page(page));
        Ok(Box::new(listing))
    }
}

/// Graph JSON for a user entry of a member listing.
pub fn graph_user(id: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.user",
        "id": id,
        "userPrincipalName": format!("{id}@test.onmicrosoft.com"),
        "displayName": format!("Test User {id}")
    })
}

/// Graph JSON for a nested group entry.
pub fn graph_group(id: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.group",
        "id": id,
        "displayName": format!("Test Group {id}"),
        "securityEnabled": true,
        "mailEnabled": false,
        "groupTypes": []
    })
}

/// Graph JSON for a service principal entry.
pub fn graph_service_principal(id: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.servicePrincipal",
        "id": id,
        "appId": format!("app-{id}"),
        "displayName": format!("Test App {id}")
    })
}

/// Graph JSON for a device, a kind the resolver does not know.
pub fn graph_device(id: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.device",
        "id": id,
        "displayName": format!("Device {id}")
    })
}

/// Wraps items in an `OData` page.
pub fn odata_page(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut page = json!({ "value": items });
    if let Some(link) = next_link {
        page["@odata.nextLink"] = json!(link);
    }
    page
}
