//! Single-request version resolution

use tracing::debug;

use crate::catalog::error::{CatalogError, NotFound};
use crate::catalog::semver::{parse_major, parse_major_minor};
use crate::catalog::store::VersionQuery;
use crate::catalog::types::{PolicyVersion, Strategy};

const OPERATION: &str = "resolving policy version";

/// Label used in not-found errors for strategies without a base version
const LATEST_LABEL: &str = "latest";

/// Resolve one policy version under the named strategy.
///
/// Strategy preconditions are checked before the store is queried:
/// - `exact` needs a base version
/// - `latest_patch` needs `<major>.<minor>`
/// - `latest_minor` needs `<major>`
/// - `latest_major` ignores the base version
pub fn resolve<S: VersionQuery + ?Sized>(
    store: &S,
    policy_name: &str,
    strategy: &str,
    base_version: Option<&str>,
) -> Result<PolicyVersion, CatalogError> {
    let parsed = parse_strategy(strategy)?;
    let base_version = base_version.filter(|v| !v.is_empty());
    debug!(
        "Resolving {} with strategy {} (base: {:?})",
        policy_name, strategy, base_version
    );

    let (found, label) = match parsed {
        Strategy::Exact => {
            let version = require_base_version(parsed, base_version)?;
            (store.get_exact(policy_name, version), version)
        }
        Strategy::LatestPatch => {
            let version = require_base_version(parsed, base_version)?;
            let (major, minor) =
                parse_major_minor(version).map_err(|msg| invalid_base(parsed, version, &msg))?;
            (store.get_latest_patch(policy_name, major, minor), version)
        }
        Strategy::LatestMinor => {
            let version = require_base_version(parsed, base_version)?;
            let major = parse_major(version).map_err(|msg| invalid_base(parsed, version, &msg))?;
            (store.get_latest_minor(policy_name, major), version)
        }
        Strategy::LatestMajor => (store.get_latest_major(policy_name), LATEST_LABEL),
    };

    found
        .map_err(|e| CatalogError::from_store(OPERATION, e))?
        .ok_or_else(|| CatalogError::version_not_found(policy_name, label))
}

/// Resolve a single `(name, version, use_latest)` reference.
///
/// The latest version is selected when `use_latest` is set or no version is given.
pub fn resolve_reference<S: VersionQuery + ?Sized>(
    store: &S,
    policy_name: &str,
    version: Option<&str>,
    use_latest: bool,
) -> Result<PolicyVersion, CatalogError> {
    match version.filter(|v| !v.is_empty() && !use_latest) {
        Some(version) => store
            .get_exact(policy_name, version)
            .map_err(|e| CatalogError::from_store(OPERATION, e))?
            .ok_or_else(|| CatalogError::version_not_found(policy_name, version)),
        None => store
            .get_latest(policy_name)
            .map_err(|e| CatalogError::from_store(OPERATION, e))?
            .ok_or_else(|| {
                CatalogError::NotFound(NotFound::Policy {
                    policy_name: policy_name.to_string(),
                })
            }),
    }
}

pub(crate) fn parse_strategy(strategy: &str) -> Result<Strategy, CatalogError> {
    strategy.parse::<Strategy>().map_err(|_| {
        CatalogError::validation(format!(
            "unknown retrieval strategy '{}', expected one of: exact, latest_patch, latest_minor, latest_major",
            strategy
        ))
    })
}

pub(crate) fn require_base_version(
    strategy: Strategy,
    base_version: Option<&str>,
) -> Result<&str, CatalogError> {
    base_version.ok_or_else(|| {
        CatalogError::validation(format!(
            "base version is required for strategy '{}'",
            strategy.as_str()
        ))
    })
}

pub(crate) fn invalid_base(strategy: Strategy, version: &str, reason: &str) -> CatalogError {
    CatalogError::validation(format!(
        "invalid base version '{}' for strategy '{}': {}",
        version,
        strategy.as_str(),
        reason
    ))
}
