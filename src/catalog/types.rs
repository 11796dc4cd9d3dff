//! Common types shared by the store, the resolvers and the service layer

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Smallest accepted page size
pub const MIN_PAGE_SIZE: u32 = 1;
/// Largest accepted page size
pub const MAX_PAGE_SIZE: u32 = 100;

/// Source type reported when a version carries none
pub const DEFAULT_SOURCE_TYPE: &str = "filesystem";

/// Candidate policy version as handed over by the sync/creation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicyVersion {
    pub policy_name: String,
    pub version: String,
    pub display_name: String,
    pub provider: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub banner_path: Option<String>,
    #[serde(default)]
    pub supported_platforms: Vec<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub definition_yaml: String,
    #[serde(default)]
    pub icon_path: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Stored policy version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyVersion {
    pub id: i64,
    pub is_latest: bool,
    #[serde(flatten)]
    pub data: NewPolicyVersion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyVersion {
    pub fn policy_name(&self) -> &str {
        &self.data.policy_name
    }

    pub fn version(&self) -> &str {
        &self.data.version
    }
}

/// Documentation page attached to a policy version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDoc {
    pub id: i64,
    pub policy_version_id: i64,
    pub page: String,
    pub content_md: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Known documentation pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocPage {
    Overview,
    Configuration,
    Examples,
    Faq,
}

impl DocPage {
    pub const ALL: [DocPage; 4] = [
        DocPage::Overview,
        DocPage::Configuration,
        DocPage::Examples,
        DocPage::Faq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocPage::Overview => "overview",
            DocPage::Configuration => "configuration",
            DocPage::Examples => "examples",
            DocPage::Faq => "faq",
        }
    }
}

impl std::str::FromStr for DocPage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(DocPage::Overview),
            "configuration" => Ok(DocPage::Configuration),
            "examples" => Ok(DocPage::Examples),
            "faq" => Ok(DocPage::Faq),
            _ => Err(()),
        }
    }
}

/// Version selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// Exact `(name, baseVersion)` match
    Exact,
    /// Highest version sharing `major.minor` with the base version
    LatestPatch,
    /// Highest version sharing `major` with the base version
    LatestMinor,
    /// Highest version overall
    LatestMajor,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Exact,
        Strategy::LatestPatch,
        Strategy::LatestMinor,
        Strategy::LatestMajor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::LatestPatch => "latest_patch",
            Strategy::LatestMinor => "latest_minor",
            Strategy::LatestMajor => "latest_major",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Strategy::Exact),
            "latest_patch" => Ok(Strategy::LatestPatch),
            "latest_minor" => Ok(Strategy::LatestMinor),
            "latest_major" => Ok(Strategy::LatestMajor),
            _ => Err(()),
        }
    }
}

/// One entry of a batch resolution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub name: String,
    /// Raw strategy name; unknown values are reported, not rejected up front
    #[serde(alias = "retrievalStrategy")]
    pub strategy: String,
    #[serde(default)]
    pub base_version: Option<String>,
}

impl ResolveRequest {
    pub fn new(name: &str, strategy: &str, base_version: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            strategy: strategy.to_string(),
            base_version: base_version.map(|v| v.to_string()),
        }
    }

    pub(crate) fn base_version_str(&self) -> &str {
        self.base_version.as_deref().unwrap_or("")
    }
}

/// A successfully resolved policy version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPolicy {
    pub name: String,
    pub version: String,
    pub source_type: String,
    pub source_url: String,
    /// Raw YAML definition
    pub definition: String,
    pub metadata: PolicyVersion,
}

impl From<PolicyVersion> for ResolvedPolicy {
    fn from(pv: PolicyVersion) -> Self {
        Self {
            name: pv.data.policy_name.clone(),
            version: pv.data.version.clone(),
            source_type: pv
                .data
                .source_type
                .clone()
                .unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string()),
            source_url: pv.data.source_url.clone().unwrap_or_default(),
            definition: pv.data.definition_yaml.clone(),
            metadata: pv,
        }
    }
}

/// Category of a per-item batch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionErrorKind {
    Validation,
    NotFound,
    Database,
    /// The lookup was interrupted because its batch was cancelled
    Cancelled,
}

/// Per-item failure of a batch resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionError {
    pub name: String,
    /// Base version as requested (empty when none was given)
    pub version: String,
    pub strategy: String,
    pub kind: ResolutionErrorKind,
    pub message: String,
}

impl ResolutionError {
    pub fn new(request: &ResolveRequest, kind: ResolutionErrorKind, message: String) -> Self {
        Self {
            name: request.name.clone(),
            version: request.base_version_str().to_string(),
            strategy: request.strategy.clone(),
            kind,
            message,
        }
    }
}

/// Outcome of a batch resolution: successes and per-item failures, unordered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResolution {
    pub items: Vec<ResolvedPolicy>,
    pub errors: Vec<ResolutionError>,
}

impl BatchResolution {
    pub fn extend(&mut self, other: BatchResolution) {
        self.items.extend(other.items);
        self.errors.extend(other.errors);
    }
}

/// Bulk exact lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExactVersionRequest {
    pub name: String,
    pub version: String,
}

/// Bulk latest-patch lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchVersionRequest {
    pub name: String,
    pub major: u32,
    pub minor: u32,
}

/// Bulk latest-minor lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MinorVersionRequest {
    pub name: String,
    pub major: u32,
}

/// Filter criteria for listing policies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFilters {
    pub search: Option<String>,
    pub categories: Vec<String>,
    pub providers: Vec<String>,
    pub platforms: Vec<String>,
    pub page: u32,
    pub page_size: u32,
}

/// Attribute over which distinct values can be listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Categories,
    Providers,
    Platforms,
}

impl std::str::FromStr for Facet {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categories" => Ok(Facet::Categories),
            "providers" => Ok(Facet::Providers),
            "platforms" => Ok(Facet::Platforms),
            _ => Err(()),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_items: u64) -> Self {
        Self {
            page,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Clamp page and page size into their accepted ranges
pub fn normalize_paging(page: u32, page_size: u32) -> (u32, u32) {
    let page = page.max(1);
    let page_size = if (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        page_size
    } else {
        DEFAULT_PAGE_SIZE
    };
    (page, page_size)
}

/// Number of pages needed for `total_items`
pub fn total_pages(total_items: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(page_size))
}
