//! Flattening of polymorphic directory listings into object IDs.

use tracing::{debug, instrument};

use crate::directory::ObjectPager;
use crate::error::{ReconcileError, ReconcileResult};
use crate::object::{DirectoryObject, ObjectKind};

/// Drains `pager` and returns the object IDs of every user, group and
/// service principal, in listing order.
///
/// Entries of unknown kinds are skipped. Duplicates are kept. `context` names
/// the listing in errors, e.g. `listing members of group "abc"`.
///
/// # Errors
///
/// - `DataIntegrity` if an entry of a known kind has no object ID.
/// - `Pagination` if fetching a page fails. IDs collected so far are dropped.
#[instrument(skip(pager))]
pub async fn resolve_ids(
    pager: &mut dyn ObjectPager,
    context: &str,
) -> ReconcileResult<Vec<String>> {
    let mut ids = Vec::new();
    let mut pages = 0usize;
    let mut skipped = 0usize;

    loop {
        let page = pager
            .next_page()
            .await
            .map_err(|source| ReconcileError::Pagination {
                context: context.to_string(),
                source,
            })?;
        let Some(page) = page else {
            break;
        };
        pages += 1;

        for object in page {
            match object {
                DirectoryObject::User { id: Some(id) }
                | DirectoryObject::Group { id: Some(id) }
                | DirectoryObject::ServicePrincipal { id: Some(id) } => ids.push(id),
                DirectoryObject::User { id: None } => {
                    return Err(missing_id(ObjectKind::User, context))
                }
                DirectoryObject::Group { id: None } => {
                    return Err(missing_id(ObjectKind::Group, context))
                }
                DirectoryObject::ServicePrincipal { id: None } => {
                    return Err(missing_id(ObjectKind::ServicePrincipal, context))
                }
                DirectoryObject::Unknown => skipped += 1,
            }
        }
    }

    debug!(pages, resolved = ids.len(), skipped, "Resolved directory object IDs");
    Ok(ids)
}

fn missing_id(kind: ObjectKind, context: &str) -> ReconcileError {
    ReconcileError::DataIntegrity {
        kind,
        context: context.to_string(),
    }
}
