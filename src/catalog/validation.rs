use regex::Regex;
use url::Url;

use crate::catalog::error::CatalogError;
use crate::catalog::semver::{parse_version, version_triple};
use crate::catalog::types::{DocPage, NewPolicyVersion};

pub const MAX_POLICY_NAME_LENGTH: usize = 100;
pub const MAX_VERSION_LENGTH: usize = 50;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_CATEGORY_LENGTH: usize = 50;
pub const MAX_PLATFORM_LENGTH: usize = 50;
pub const MAX_TAG_LENGTH: usize = 30;
pub const MAX_ASSET_PATH_LENGTH: usize = 2048;

/// Format checks for policy versions entering the catalog
pub struct Validator {
    /// Policy names: `cors`, `jwt_auth`, `rate-limit-v2`
    name_re: Regex,
    /// Strict versions without leading zeros: `v1.2.3`
    version_re: Regex,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            name_re: Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap(),
            version_re: Regex::new(r"^v(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)$").unwrap(),
        }
    }

    pub fn validate_policy_name(&self, name: &str) -> Result<(), CatalogError> {
        if name.is_empty() {
            return Err(CatalogError::validation("policy name cannot be empty"));
        }
        if name.len() > MAX_POLICY_NAME_LENGTH {
            return Err(CatalogError::validation(format!(
                "policy name too long (max {} characters)",
                MAX_POLICY_NAME_LENGTH
            )));
        }
        if !self.name_re.is_match(name) {
            return Err(CatalogError::validation(
                "policy name must contain only alphanumeric characters, hyphens, and underscores",
            ));
        }
        Ok(())
    }

    pub fn validate_version(&self, version: &str) -> Result<(), CatalogError> {
        if version.is_empty() {
            return Err(CatalogError::validation("version cannot be empty"));
        }
        if version.len() > MAX_VERSION_LENGTH {
            return Err(CatalogError::validation(format!(
                "version too long (max {} characters)",
                MAX_VERSION_LENGTH
            )));
        }
        // Stored ordering and comparison must agree on every accepted version
        if !self.version_re.is_match(version)
            || version_triple(version).is_none()
            || parse_version(version).is_none()
        {
            return Err(CatalogError::validation(
                "version must follow semantic versioning format (e.g., v1.2.3)",
            ));
        }
        Ok(())
    }

    /// Validate every field of a candidate version before it is persisted
    pub fn validate_candidate(&self, candidate: &NewPolicyVersion) -> Result<(), CatalogError> {
        self.validate_policy_name(&candidate.policy_name)?;
        self.validate_version(&candidate.version)?;

        if candidate.display_name.trim().is_empty() {
            return Err(CatalogError::validation("display name cannot be empty"));
        }
        if candidate.provider.trim().is_empty() {
            return Err(CatalogError::validation("provider cannot be empty"));
        }
        if candidate.definition_yaml.trim().is_empty() {
            return Err(CatalogError::validation("policy definition cannot be empty"));
        }
        if let Some(description) = &candidate.description {
            validate_description(description)?;
        }

        validate_labels("category", &candidate.categories, MAX_CATEGORY_LENGTH)?;
        validate_labels("platform", &candidate.supported_platforms, MAX_PLATFORM_LENGTH)?;
        validate_labels("tag", &candidate.tags, MAX_TAG_LENGTH)?;

        for (field, path) in [
            ("logo path", &candidate.logo_path),
            ("banner path", &candidate.banner_path),
            ("icon path", &candidate.icon_path),
        ] {
            if let Some(path) = path {
                validate_asset_path(field, path)?;
            }
        }

        if let Some(source_url) = &candidate.source_url {
            validate_url(source_url)?;
        }

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_description(description: &str) -> Result<(), CatalogError> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(CatalogError::validation(format!(
            "description too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}

/// Only absolute `http`/`https` URLs are accepted
pub fn validate_url(raw: &str) -> Result<(), CatalogError> {
    if raw.is_empty() {
        return Err(CatalogError::validation("URL cannot be empty"));
    }

    let parsed = Url::parse(raw)
        .map_err(|e| CatalogError::validation(format!("invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(CatalogError::validation(
            "URL must use HTTP or HTTPS protocol",
        )),
    }
}

pub fn validate_doc_page(page: &str) -> Result<DocPage, CatalogError> {
    page.parse::<DocPage>().map_err(|_| {
        let valid: Vec<&str> = DocPage::ALL.iter().map(|p| p.as_str()).collect();
        CatalogError::validation(format!(
            "invalid documentation page '{}', expected one of: {}",
            page,
            valid.join(", ")
        ))
    })
}

fn validate_labels(kind: &str, labels: &[String], max_len: usize) -> Result<(), CatalogError> {
    for label in labels {
        if label.trim().is_empty() {
            return Err(CatalogError::validation(format!(
                "{} names cannot be empty or whitespace",
                kind
            )));
        }
        if label.len() > max_len {
            return Err(CatalogError::validation(format!(
                "{} name too long (max {} characters)",
                kind, max_len
            )));
        }
    }
    Ok(())
}

fn validate_asset_path(field: &str, path: &str) -> Result<(), CatalogError> {
    if path.len() > MAX_ASSET_PATH_LENGTH {
        return Err(CatalogError::validation(format!(
            "{} too long (max {} characters)",
            field, MAX_ASSET_PATH_LENGTH
        )));
    }
    Ok(())
}
