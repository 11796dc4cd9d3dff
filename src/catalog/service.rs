use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::catalog::bulk;
use crate::catalog::error::{CatalogError, NotFound};
use crate::catalog::latest;
use crate::catalog::resolver;
use crate::catalog::store::VersionStore;
use crate::catalog::types::{
    BatchResolution, DocPage, Facet, NewPolicyVersion, Page, Pagination, PolicyDoc, PolicyFilters,
    PolicyVersion, ResolveRequest, normalize_paging,
};
use crate::catalog::validation::{Validator, validate_doc_page};
use crate::config::ResolutionConfig;

/// Async facade over a version store.
///
/// Store calls are synchronous and run on the blocking thread pool. Nothing is cached:
/// every read of the latest version goes to the store.
pub struct PolicyService<S> {
    store: Arc<S>,
    validator: Validator,
    config: ResolutionConfig,
}

impl<S: VersionStore> PolicyService<S> {
    pub fn new(store: Arc<S>, config: ResolutionConfig) -> Self {
        Self {
            store,
            validator: Validator::new(),
            config,
        }
    }

    /// Run `f` against the store on the blocking pool
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T, CatalogError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, CatalogError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .unwrap_or_else(|e| {
                error!("Blocking task failed while {}: {}", operation, e);
                Err(CatalogError::Database { operation })
            })
    }

    /// Validate and persist a new version, updating the policy's latest flag
    pub async fn create_policy_version(
        &self,
        candidate: NewPolicyVersion,
    ) -> Result<PolicyVersion, CatalogError> {
        self.validator.validate_candidate(&candidate)?;
        let max_attempts = self.config.latest_retry_attempts;

        self.blocking("creating policy version", move |store| {
            latest::create_policy_version(store, &candidate, max_attempts)
        })
        .await
    }

    pub async fn resolve(
        &self,
        policy_name: &str,
        strategy: &str,
        base_version: Option<&str>,
    ) -> Result<PolicyVersion, CatalogError> {
        let policy_name = policy_name.to_string();
        let strategy = strategy.to_string();
        let base_version = base_version.map(str::to_string);

        self.blocking("resolving policy version", move |store| {
            resolver::resolve(store, &policy_name, &strategy, base_version.as_deref())
        })
        .await
    }

    pub async fn resolve_reference(
        &self,
        policy_name: &str,
        version: Option<&str>,
        use_latest: bool,
    ) -> Result<PolicyVersion, CatalogError> {
        let policy_name = policy_name.to_string();
        let version = version.map(str::to_string);

        self.blocking("resolving policy version", move |store| {
            resolver::resolve_reference(store, &policy_name, version.as_deref(), use_latest)
        })
        .await
    }

    /// Resolve a batch under the configured deadline
    pub async fn resolve_batch(
        &self,
        requests: Vec<ResolveRequest>,
    ) -> Result<BatchResolution, CatalogError> {
        let deadline = Duration::from_millis(self.config.batch_timeout);
        self.resolve_batch_with_cancel(requests, tokio::time::sleep(deadline))
            .await
    }

    /// Resolve a batch, aborting when `cancel` completes
    pub async fn resolve_batch_with_cancel<C>(
        &self,
        requests: Vec<ResolveRequest>,
        cancel: C,
    ) -> Result<BatchResolution, CatalogError>
    where
        C: Future<Output = ()>,
    {
        bulk::resolve_batch(Arc::clone(&self.store), requests, cancel).await
    }

    pub async fn get_policy_version(
        &self,
        policy_name: &str,
        version: &str,
    ) -> Result<PolicyVersion, CatalogError> {
        self.resolve_reference(policy_name, Some(version), false)
            .await
    }

    pub async fn get_latest_policy_version(
        &self,
        policy_name: &str,
    ) -> Result<PolicyVersion, CatalogError> {
        self.resolve_reference(policy_name, None, true).await
    }

    /// Raw YAML definition of a version
    pub async fn get_definition(
        &self,
        policy_name: &str,
        version: &str,
    ) -> Result<String, CatalogError> {
        let found = self.get_policy_version(policy_name, version).await?;
        Ok(found.data.definition_yaml)
    }

    /// Versions of one policy, highest first
    pub async fn list_policy_versions(
        &self,
        policy_name: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PolicyVersion>, CatalogError> {
        let (page, page_size) = normalize_paging(page, page_size);
        let policy_name = policy_name.to_string();

        self.blocking("listing policy versions", move |store| {
            let total = store
                .count_versions(&policy_name)
                .map_err(|e| CatalogError::from_store("listing policy versions", e))?;
            if total == 0 {
                return Err(CatalogError::NotFound(NotFound::Policy { policy_name }));
            }

            let items = store
                .list_versions(&policy_name, page, page_size)
                .map_err(|e| CatalogError::from_store("listing policy versions", e))?;

            Ok(Page {
                items,
                pagination: Pagination::new(page, page_size, total),
            })
        })
        .await
    }

    /// Latest versions of all policies matching the filters
    pub async fn list_policies(
        &self,
        filters: PolicyFilters,
    ) -> Result<Page<PolicyVersion>, CatalogError> {
        let (page, page_size) = normalize_paging(filters.page, filters.page_size);
        let filters = PolicyFilters {
            page,
            page_size,
            ..filters
        };
        debug!("Listing policies with filters: {:?}", filters);

        self.blocking("listing policies", move |store| {
            let total = store
                .count_policies(&filters)
                .map_err(|e| CatalogError::from_store("listing policies", e))?;
            let items = store
                .list_policies(&filters)
                .map_err(|e| CatalogError::from_store("listing policies", e))?;

            Ok(Page {
                items,
                pagination: Pagination::new(page, page_size, total),
            })
        })
        .await
    }

    pub async fn distinct_values(&self, facet: Facet) -> Result<Vec<String>, CatalogError> {
        self.blocking("listing filter values", move |store| {
            store
                .distinct_values(facet)
                .map_err(|e| CatalogError::from_store("listing filter values", e))
        })
        .await
    }

    /// Create or replace a documentation page of an existing version
    pub async fn upsert_doc(
        &self,
        policy_name: &str,
        version: &str,
        page: &str,
        content_md: String,
    ) -> Result<PolicyDoc, CatalogError> {
        let page = validate_doc_page(page)?;
        let owner = self.get_policy_version(policy_name, version).await?;

        self.blocking("saving documentation", move |store| {
            store
                .upsert_doc(owner.id, page.as_str(), &content_md)
                .map_err(|e| CatalogError::from_store("saving documentation", e))
        })
        .await
    }

    pub async fn get_doc(
        &self,
        policy_name: &str,
        version: &str,
        page: &str,
    ) -> Result<PolicyDoc, CatalogError> {
        let page = validate_doc_page(page)?;
        let owner = self.get_policy_version(policy_name, version).await?;

        self.blocking("loading documentation", move |store| {
            store
                .get_doc(owner.id, page.as_str())
                .map_err(|e| CatalogError::from_store("loading documentation", e))?
                .ok_or_else(|| {
                    CatalogError::NotFound(NotFound::Doc {
                        policy_name: owner.data.policy_name.clone(),
                        version: owner.data.version.clone(),
                        page: page.as_str().to_string(),
                    })
                })
        })
        .await
    }

    /// All documentation pages of a version as `page -> markdown`, in page order
    pub async fn get_all_docs(
        &self,
        policy_name: &str,
        version: &str,
    ) -> Result<IndexMap<String, String>, CatalogError> {
        let owner = self.get_policy_version(policy_name, version).await?;

        let mut stored: HashMap<String, String> = self
            .blocking("loading documentation", move |store| {
                store
                    .list_docs(owner.id)
                    .map_err(|e| CatalogError::from_store("loading documentation", e))
            })
            .await?
            .into_iter()
            .map(|doc| (doc.page, doc.content_md))
            .collect();

        let docs = DocPage::ALL
            .iter()
            .filter_map(|page| {
                stored
                    .remove(page.as_str())
                    .map(|content| (page.as_str().to_string(), content))
            })
            .collect();

        Ok(docs)
    }
}
