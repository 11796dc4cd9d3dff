//! Latest-version determination on insert

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::catalog::error::{CatalogError, StoreError};
use crate::catalog::semver::compare_versions;
use crate::catalog::store::VersionWriter;
use crate::catalog::types::{NewPolicyVersion, PolicyVersion};

const OPERATION: &str = "creating policy version";

/// Persist a new version, deciding inside one transaction whether it becomes the
/// policy's latest version.
///
/// The store rejects a second latest row for the same policy. When that happens, or
/// when the database is busy, the whole determination is run again from a fresh
/// transaction, up to `max_attempts` times.
pub fn create_policy_version<S: VersionWriter + ?Sized>(
    store: &S,
    candidate: &NewPolicyVersion,
    max_attempts: u32,
) -> Result<PolicyVersion, CatalogError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match try_create(store, candidate) {
            Ok(created) => {
                info!(
                    "Created {}@{} (latest: {})",
                    created.policy_name(),
                    created.version(),
                    created.is_latest
                );
                return Ok(created);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    "Attempt {}/{} to create {}@{} failed: {}, retrying",
                    attempt, max_attempts, candidate.policy_name, candidate.version, e
                );
                attempt += 1;
            }
            Err(e) => return Err(CatalogError::from_store(OPERATION, e)),
        }
    }
}

fn try_create<S: VersionWriter + ?Sized>(
    store: &S,
    candidate: &NewPolicyVersion,
) -> Result<PolicyVersion, StoreError> {
    let mut tx = store.begin()?;

    if tx.version_exists(&candidate.policy_name, &candidate.version)? {
        return Err(StoreError::DuplicateVersion {
            policy_name: candidate.policy_name.clone(),
            version: candidate.version.clone(),
        });
    }

    let holder = tx.current_latest(&candidate.policy_name)?;
    let is_latest = match &holder {
        None => true,
        Some(current) => compare_versions(&candidate.version, current) == Ordering::Greater,
    };

    debug!(
        "Determined latest for {}@{}: holder={:?}, is_latest={}",
        candidate.policy_name, candidate.version, holder, is_latest
    );

    if is_latest {
        tx.demote_others(&candidate.policy_name)?;
    }

    let created = tx.insert_version(candidate, is_latest)?;
    tx.commit()?;

    Ok(created)
}
