//! Catalog test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use policy_catalog::catalog::service::PolicyService;
use policy_catalog::catalog::sqlite::SqliteStore;
use policy_catalog::catalog::store::VersionQuery;
use policy_catalog::catalog::types::{NewPolicyVersion, PolicyVersion};
use policy_catalog::config::ResolutionConfig;

/// Create a store backed by a fresh database in a temporary directory
pub fn create_test_store() -> (TempDir, Arc<SqliteStore>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let store = SqliteStore::open(&db_path, 4, Duration::from_secs(10)).unwrap();
    (temp_dir, Arc::new(store))
}

pub fn create_test_service() -> (TempDir, Arc<SqliteStore>, PolicyService<SqliteStore>) {
    let (temp_dir, store) = create_test_store();
    let service = PolicyService::new(
        Arc::clone(&store),
        ResolutionConfig {
            latest_retry_attempts: 10,
            ..Default::default()
        },
    );
    (temp_dir, store, service)
}

pub fn policy(name: &str, version: &str) -> NewPolicyVersion {
    NewPolicyVersion {
        policy_name: name.to_string(),
        version: version.to_string(),
        display_name: format!("{} policy", name),
        provider: "wso2".to_string(),
        description: Some(format!("The {} policy", name)),
        categories: vec!["traffic".to_string()],
        tags: vec!["gateway".to_string()],
        supported_platforms: vec!["kubernetes".to_string()],
        definition_yaml: format!("name: {}\nversion: {}\n", name, version),
        ..Default::default()
    }
}

/// Every stored version of a policy
pub fn all_versions(store: &SqliteStore, name: &str) -> Vec<PolicyVersion> {
    store.list_versions(name, 1, 1000).unwrap()
}

/// Versions currently flagged latest
pub fn latest_flags(store: &SqliteStore, name: &str) -> Vec<String> {
    all_versions(store, name)
        .into_iter()
        .filter(|v| v.is_latest)
        .map(|v| v.data.version)
        .collect()
}
