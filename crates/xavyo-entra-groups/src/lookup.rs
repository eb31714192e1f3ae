//! Group lookup by display name.

use tracing::{debug, instrument};

use crate::directory::GroupDirectory;
use crate::error::{ReconcileError, ReconcileResult};
use crate::object::DirectoryGroup;

/// Returns the single group whose display name matches, ignoring case.
///
/// # Errors
///
/// `GroupNotFound` or `AmbiguousGroup` unless exactly one group matches,
/// `MissingAttribute` if the match has no display name, and
/// `DisplayNameMismatch` if the service returned a group under another name.
#[instrument(skip(directory))]
pub async fn group_by_display_name<G>(
    directory: &G,
    display_name: &str,
) -> ReconcileResult<DirectoryGroup>
where
    G: GroupDirectory + ?Sized,
{
    let mut groups = list_groups(directory, display_name).await?;

    match groups.len() {
        0 => return Err(ReconcileError::GroupNotFound(display_name.to_string())),
        1 => {}
        count => {
            return Err(ReconcileError::AmbiguousGroup {
                display_name: display_name.to_string(),
                count,
            })
        }
    }

    let group = groups.remove(0);
    let found = group
        .display_name
        .as_deref()
        .ok_or_else(|| ReconcileError::MissingAttribute {
            display_name: display_name.to_string(),
            attribute: "display name",
        })?;
    if !found.eq_ignore_ascii_case(display_name) {
        return Err(ReconcileError::DisplayNameMismatch {
            expected: display_name.to_string(),
            found: found.to_string(),
        });
    }

    Ok(group)
}

/// Returns the first group whose display name equals `name` exactly.
#[instrument(skip(directory))]
pub async fn find_group_by_name<G>(
    directory: &G,
    name: &str,
) -> ReconcileResult<Option<DirectoryGroup>>
where
    G: GroupDirectory + ?Sized,
{
    let groups = list_groups(directory, name).await?;
    Ok(groups
        .into_iter()
        .find(|group| group.display_name.as_deref() == Some(name)))
}

/// Fails if a group named `name` already exists.
///
/// # Errors
///
/// `DuplicateGroupName` carrying the existing group's ID.
pub async fn check_name_availability<G>(directory: &G, name: &str) -> ReconcileResult<()>
where
    G: GroupDirectory + ?Sized,
{
    match find_group_by_name(directory, name).await? {
        Some(existing) => Err(ReconcileError::DuplicateGroupName {
            name: name.to_string(),
            id: existing.id.unwrap_or_default(),
        }),
        None => Ok(()),
    }
}

async fn list_groups<G>(directory: &G, display_name: &str) -> ReconcileResult<Vec<DirectoryGroup>>
where
    G: GroupDirectory + ?Sized,
{
    let groups = directory
        .groups_by_display_name(display_name)
        .await
        .map_err(|source| ReconcileError::Lookup {
            display_name: display_name.to_string(),
            source,
        })?;
    debug!(display_name, matches = groups.len(), "Listed groups by display name");
    Ok(groups)
}
