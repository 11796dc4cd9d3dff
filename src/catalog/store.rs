//! Storage contract the catalog engine depends on

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

#[cfg(test)]
use mockall::automock;

use crate::catalog::error::StoreError;
use crate::catalog::types::{
    ExactVersionRequest, Facet, MinorVersionRequest, NewPolicyVersion, PatchVersionRequest,
    PolicyDoc, PolicyFilters, PolicyVersion,
};

/// Read queries over stored policy versions.
///
/// Bulk lookups run inside a [`QueryScope`]; cancelling the scope aborts only those lookups.
#[cfg_attr(test, automock)]
pub trait VersionQuery: Send + Sync + 'static {
    /// Exact `(policy_name, version)` lookup
    fn get_exact(
        &self,
        policy_name: &str,
        version: &str,
    ) -> Result<Option<PolicyVersion>, StoreError>;

    /// The version currently flagged latest
    fn get_latest(&self, policy_name: &str) -> Result<Option<PolicyVersion>, StoreError>;

    /// Highest version with matching `major.minor`
    fn get_latest_patch(
        &self,
        policy_name: &str,
        major: u32,
        minor: u32,
    ) -> Result<Option<PolicyVersion>, StoreError>;

    /// Highest version with matching `major`
    fn get_latest_minor(
        &self,
        policy_name: &str,
        major: u32,
    ) -> Result<Option<PolicyVersion>, StoreError>;

    /// Highest version overall
    fn get_latest_major(&self, policy_name: &str) -> Result<Option<PolicyVersion>, StoreError>;

    /// Bulk exact lookups; rows come back in no particular order
    fn bulk_get_exact(
        &self,
        requests: &[ExactVersionRequest],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError>;

    /// Bulk latest-patch lookups, at most one row per distinct request key
    fn bulk_get_latest_patch(
        &self,
        requests: &[PatchVersionRequest],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError>;

    /// Bulk latest-minor lookups, at most one row per distinct request key
    fn bulk_get_latest_minor(
        &self,
        requests: &[MinorVersionRequest],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError>;

    /// Bulk latest-major lookups, at most one row per policy name
    fn bulk_get_latest_major(
        &self,
        policy_names: &[String],
        scope: &QueryScope,
    ) -> Result<Vec<PolicyVersion>, StoreError>;

    /// Versions of a policy, highest first
    fn list_versions(
        &self,
        policy_name: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<PolicyVersion>, StoreError>;

    fn count_versions(&self, policy_name: &str) -> Result<u64, StoreError>;

    /// Latest versions of all policies matching the filters
    fn list_policies(&self, filters: &PolicyFilters) -> Result<Vec<PolicyVersion>, StoreError>;

    fn count_policies(&self, filters: &PolicyFilters) -> Result<u64, StoreError>;

    /// Distinct values of a facet over latest versions, sorted
    fn distinct_values(&self, facet: Facet) -> Result<Vec<String>, StoreError>;
}

/// Documentation page storage
pub trait DocStore: Send + Sync + 'static {
    fn get_doc(&self, version_id: i64, page: &str) -> Result<Option<PolicyDoc>, StoreError>;

    fn list_docs(&self, version_id: i64) -> Result<Vec<PolicyDoc>, StoreError>;

    /// Create or replace the page for a version
    fn upsert_doc(
        &self,
        version_id: i64,
        page: &str,
        content_md: &str,
    ) -> Result<PolicyDoc, StoreError>;
}

/// Source of write transactions
pub trait VersionWriter: Send + Sync + 'static {
    fn begin(&self) -> Result<Box<dyn VersionTx + '_>, StoreError>;
}

/// Full store: queries, docs and transactional version creation
pub trait VersionStore: VersionQuery + DocStore + VersionWriter {}

impl<T: VersionQuery + DocStore + VersionWriter> VersionStore for T {}

/// Write transaction used by the latest-version determination.
///
/// Dropping a transaction without calling [`VersionTx::commit`] rolls it back.
pub trait VersionTx {
    fn version_exists(&mut self, policy_name: &str, version: &str) -> Result<bool, StoreError>;

    /// Version string of the current latest holder, if any
    fn current_latest(&mut self, policy_name: &str) -> Result<Option<String>, StoreError>;

    /// Clear the latest flag on every version of the policy
    fn demote_others(&mut self, policy_name: &str) -> Result<(), StoreError>;

    fn insert_version(
        &mut self,
        candidate: &NewPolicyVersion,
        is_latest: bool,
    ) -> Result<PolicyVersion, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

type Interrupter = Box<dyn Fn() + Send + Sync>;

/// Cancellation scope shared by the bulk lookups of one batch.
///
/// A store registers an interrupter for the connection a lookup runs on, for as long as
/// the lookup runs. [`QueryScope::cancel`] fires only the interrupters registered here,
/// so work done for other callers keeps running.
#[derive(Default)]
pub struct QueryScope {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    interrupters: Mutex<Vec<(u64, Interrupter)>>,
}

impl QueryScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the scope cancelled and interrupt every lookup currently registered
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let interrupters = self
            .interrupters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, interrupt) in interrupters.iter() {
            interrupt();
        }
    }

    /// Register `interrupt` until the returned registration is dropped.
    ///
    /// Fails with [`StoreError::Interrupted`] once the scope is cancelled.
    pub fn register(&self, interrupt: Interrupter) -> Result<ScopeRegistration<'_>, StoreError> {
        let mut interrupters = self
            .interrupters
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        if self.is_cancelled() {
            return Err(StoreError::Interrupted);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        interrupters.push((id, interrupt));
        Ok(ScopeRegistration { scope: self, id })
    }

    fn unregister(&self, id: u64) {
        self.interrupters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(registered, _)| *registered != id);
    }
}

/// Interrupter registration held for the duration of one lookup
pub struct ScopeRegistration<'a> {
    scope: &'a QueryScope,
    id: u64,
}

impl Drop for ScopeRegistration<'_> {
    fn drop(&mut self) {
        self.scope.unregister(self.id);
    }
}
