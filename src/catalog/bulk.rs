//! Batch resolution across strategy groups
//!
//! A batch is partitioned by strategy. Each non-empty group is resolved on its own
//! blocking task with a single bulk store query, and the groups are joined before
//! their items and errors are merged. A failing group never affects the others.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexSet;
use tracing::{debug, error, info, warn};

use crate::catalog::error::{CatalogError, StoreError};
use crate::catalog::resolver::{invalid_base, parse_strategy, require_base_version};
use crate::catalog::semver::{parse_major, parse_major_minor, version_triple};
use crate::catalog::store::{QueryScope, VersionQuery};
use crate::catalog::types::{
    BatchResolution, ExactVersionRequest, MinorVersionRequest, PatchVersionRequest,
    PolicyVersion, ResolutionError, ResolutionErrorKind, ResolveRequest, ResolvedPolicy, Strategy,
};

const OPERATION: &str = "resolving policy versions";

/// Lookup key shared by a request and the row that satisfies it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Exact { name: String, version: String },
    Patch { name: String, major: u32, minor: u32 },
    Minor { name: String, major: u32 },
    Major { name: String },
}

impl GroupKey {
    fn for_request(strategy: Strategy, request: &ResolveRequest) -> Result<Self, CatalogError> {
        let name = request.name.clone();
        let base_version = request.base_version.as_deref().filter(|v| !v.is_empty());

        match strategy {
            Strategy::Exact => {
                let version = require_base_version(strategy, base_version)?;
                Ok(GroupKey::Exact {
                    name,
                    version: version.to_string(),
                })
            }
            Strategy::LatestPatch => {
                let version = require_base_version(strategy, base_version)?;
                let (major, minor) = parse_major_minor(version)
                    .map_err(|msg| invalid_base(strategy, version, &msg))?;
                Ok(GroupKey::Patch { name, major, minor })
            }
            Strategy::LatestMinor => {
                let version = require_base_version(strategy, base_version)?;
                let major =
                    parse_major(version).map_err(|msg| invalid_base(strategy, version, &msg))?;
                Ok(GroupKey::Minor { name, major })
            }
            Strategy::LatestMajor => Ok(GroupKey::Major { name }),
        }
    }

    fn for_row(strategy: Strategy, row: &PolicyVersion) -> Option<Self> {
        let name = row.policy_name().to_string();
        if strategy == Strategy::Exact {
            return Some(GroupKey::Exact {
                name,
                version: row.version().to_string(),
            });
        }

        let (major, minor, _) = version_triple(row.version())?;
        Some(match strategy {
            Strategy::LatestPatch => GroupKey::Patch { name, major, minor },
            Strategy::LatestMinor => GroupKey::Minor { name, major },
            _ => GroupKey::Major { name },
        })
    }

    /// Version label used in not-found messages
    fn label(&self, request: &ResolveRequest) -> String {
        match self {
            GroupKey::Major { .. } => "latest".to_string(),
            _ => request.base_version_str().to_string(),
        }
    }
}

/// Run the one bulk query that covers every distinct key of a group
fn query_group<S: VersionQuery + ?Sized>(
    store: &S,
    strategy: Strategy,
    keys: &IndexSet<GroupKey>,
    scope: &QueryScope,
) -> Result<Vec<PolicyVersion>, StoreError> {
    match strategy {
        Strategy::Exact => {
            let requests: Vec<_> = keys
                .iter()
                .filter_map(|key| match key {
                    GroupKey::Exact { name, version } => Some(ExactVersionRequest {
                        name: name.clone(),
                        version: version.clone(),
                    }),
                    _ => None,
                })
                .collect();
            store.bulk_get_exact(&requests, scope)
        }
        Strategy::LatestPatch => {
            let requests: Vec<_> = keys
                .iter()
                .filter_map(|key| match key {
                    GroupKey::Patch { name, major, minor } => Some(PatchVersionRequest {
                        name: name.clone(),
                        major: *major,
                        minor: *minor,
                    }),
                    _ => None,
                })
                .collect();
            store.bulk_get_latest_patch(&requests, scope)
        }
        Strategy::LatestMinor => {
            let requests: Vec<_> = keys
                .iter()
                .filter_map(|key| match key {
                    GroupKey::Minor { name, major } => Some(MinorVersionRequest {
                        name: name.clone(),
                        major: *major,
                    }),
                    _ => None,
                })
                .collect();
            store.bulk_get_latest_minor(&requests, scope)
        }
        Strategy::LatestMajor => {
            let names: Vec<_> = keys
                .iter()
                .filter_map(|key| match key {
                    GroupKey::Major { name } => Some(name.clone()),
                    _ => None,
                })
                .collect();
            store.bulk_get_latest_major(&names, scope)
        }
    }
}

/// Resolve every request of one strategy group.
///
/// Each request yields exactly one item or one error entry. Requests with a malformed
/// base version are rejected without a store round-trip; a store failure becomes one
/// database error per remaining request, or one cancelled error if `scope` was cancelled.
pub fn resolve_group<S: VersionQuery + ?Sized>(
    store: &S,
    strategy: Strategy,
    requests: &[ResolveRequest],
    scope: &QueryScope,
) -> BatchResolution {
    let mut result = BatchResolution::default();
    let mut valid = Vec::with_capacity(requests.len());

    for request in requests {
        match GroupKey::for_request(strategy, request) {
            Ok(key) => valid.push((request, key)),
            Err(e) => result.errors.push(ResolutionError::new(
                request,
                ResolutionErrorKind::Validation,
                e.to_string(),
            )),
        }
    }

    if valid.is_empty() {
        return result;
    }

    let keys: IndexSet<GroupKey> = valid.iter().map(|(_, key)| key.clone()).collect();
    debug!(
        "Querying {} distinct keys for {} group",
        keys.len(),
        strategy.as_str()
    );

    let rows = match query_group(store, strategy, &keys, scope) {
        Ok(rows) => rows,
        Err(e) => {
            let err = CatalogError::from_store(OPERATION, e);
            let kind = match err {
                CatalogError::Cancelled => ResolutionErrorKind::Cancelled,
                _ => ResolutionErrorKind::Database,
            };
            let message = err.to_string();
            result.errors.extend(
                valid
                    .iter()
                    .map(|(request, _)| ResolutionError::new(request, kind, message.clone())),
            );
            return result;
        }
    };

    let by_key: HashMap<GroupKey, PolicyVersion> = rows
        .into_iter()
        .filter_map(|row| GroupKey::for_row(strategy, &row).map(|key| (key, row)))
        .collect();

    for (request, key) in valid {
        match by_key.get(&key) {
            Some(row) => result.items.push(ResolvedPolicy::from(row.clone())),
            None => result.errors.push(ResolutionError::new(
                request,
                ResolutionErrorKind::NotFound,
                CatalogError::version_not_found(&request.name, &key.label(request)).to_string(),
            )),
        }
    }

    result
}

/// Split requests into strategy groups; unknown strategies become validation errors
fn partition(
    requests: Vec<ResolveRequest>,
) -> (BTreeMap<Strategy, Vec<ResolveRequest>>, BatchResolution) {
    let mut groups: BTreeMap<Strategy, Vec<ResolveRequest>> = BTreeMap::new();
    let mut rejected = BatchResolution::default();

    for request in requests {
        match parse_strategy(&request.strategy) {
            Ok(strategy) => groups.entry(strategy).or_default().push(request),
            Err(e) => rejected.errors.push(ResolutionError::new(
                &request,
                ResolutionErrorKind::Validation,
                e.to_string(),
            )),
        }
    }

    (groups, rejected)
}

/// Resolve a batch of requests, one concurrent task per strategy group.
///
/// If `cancel` completes first, the batch's in-flight store queries are interrupted and
/// the whole batch fails with [`CatalogError::Cancelled`]; results of groups that
/// already finished are discarded. Queries run for other callers are not affected.
pub async fn resolve_batch<S, C>(
    store: Arc<S>,
    requests: Vec<ResolveRequest>,
    cancel: C,
) -> Result<BatchResolution, CatalogError>
where
    S: VersionQuery,
    C: Future<Output = ()>,
{
    let total = requests.len();
    let (groups, mut result) = partition(requests);
    let scope = Arc::new(QueryScope::new());
    info!(
        "Resolving batch of {} requests in {} strategy groups",
        total,
        groups.len()
    );

    let tasks: Vec<_> = groups
        .into_iter()
        .map(|(strategy, requests)| {
            let store = Arc::clone(&store);
            let scope = Arc::clone(&scope);
            let requests: Arc<[ResolveRequest]> = requests.into();
            async move {
                let handle = tokio::task::spawn_blocking({
                    let requests = Arc::clone(&requests);
                    move || resolve_group(store.as_ref(), strategy, &requests, &scope)
                });
                match handle.await {
                    Ok(group) => group,
                    Err(e) => {
                        error!("Resolution task for {} group failed: {}", strategy.as_str(), e);
                        group_failure(&requests)
                    }
                }
            }
        })
        .collect();

    tokio::select! {
        groups = join_all(tasks) => {
            for group in groups {
                result.extend(group);
            }
            debug!(
                "Batch resolved: {} items, {} errors",
                result.items.len(),
                result.errors.len()
            );
            Ok(result)
        }
        _ = cancel => {
            warn!("Batch resolution cancelled, interrupting its store queries");
            scope.cancel();
            Err(CatalogError::Cancelled)
        }
    }
}

fn group_failure(requests: &[ResolveRequest]) -> BatchResolution {
    let message = CatalogError::Database {
        operation: OPERATION,
    }
    .to_string();
    BatchResolution {
        items: Vec::new(),
        errors: requests
            .iter()
            .map(|request| {
                ResolutionError::new(request, ResolutionErrorKind::Database, message.clone())
            })
            .collect(),
    }
}
