//! Builders shared by unit tests

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::catalog::sqlite::SqliteStore;
use crate::catalog::types::{NewPolicyVersion, PolicyVersion};

pub fn create_test_store() -> (TempDir, Arc<SqliteStore>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = SqliteStore::open(&db_path, 4, std::time::Duration::from_secs(5)).unwrap();
    (temp_dir, Arc::new(store))
}

pub fn candidate(policy_name: &str, version: &str) -> NewPolicyVersion {
    NewPolicyVersion {
        policy_name: policy_name.to_string(),
        version: version.to_string(),
        display_name: format!("{} policy", policy_name),
        provider: "wso2".to_string(),
        description: Some(format!("{} {}", policy_name, version)),
        categories: vec!["security".to_string()],
        tags: vec!["gateway".to_string()],
        supported_platforms: vec!["kubernetes".to_string()],
        definition_yaml: format!("name: {}\nversion: {}\n", policy_name, version),
        source_type: Some("github".to_string()),
        source_url: Some(format!("https://github.com/wso2/policies/{}", policy_name)),
        ..Default::default()
    }
}

/// A stored row, for tests that never touch a database
pub fn stored(id: i64, policy_name: &str, version: &str, is_latest: bool) -> PolicyVersion {
    let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    PolicyVersion {
        id,
        is_latest,
        data: candidate(policy_name, version),
        created_at: ts,
        updated_at: ts,
    }
}
