mod helper;

use std::sync::{Arc, Barrier};
use std::thread;

use futures::future::join_all;

use helper::{all_versions, create_test_service, create_test_store, latest_flags, policy};
use policy_catalog::catalog::latest::create_policy_version;
use policy_catalog::catalog::types::ResolveRequest;

const WRITERS: usize = 16;

fn version_for(i: usize) -> String {
    format!("v{}.{}.{}", i % 3, i, i % 5)
}

#[test]
fn concurrent_threads_leave_one_latest_version() {
    let (_temp_dir, store) = create_test_store();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                create_policy_version(store.as_ref(), &policy("rate-limit", &version_for(i)), 10)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(all_versions(&store, "rate-limit").len(), WRITERS);
    // v2.14.4 is the greatest of the generated versions
    assert_eq!(latest_flags(&store, "rate-limit"), vec!["v2.14.4"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_service_calls_leave_one_latest_version() {
    let (_temp_dir, store, service) = create_test_service();
    let service = Arc::new(service);

    let creations = (0..WRITERS).map(|i| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            service
                .create_policy_version(policy("cors", &format!("v1.0.{}", i)))
                .await
        })
    });

    for result in join_all(creations).await {
        result.unwrap().unwrap();
    }

    assert_eq!(all_versions(&store, "cors").len(), WRITERS);
    assert_eq!(
        latest_flags(&store, "cors"),
        vec![format!("v1.0.{}", WRITERS - 1)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batches_observe_a_single_latest_during_writes() {
    let (_temp_dir, store, service) = create_test_service();
    let service = Arc::new(service);
    service
        .create_policy_version(policy("jwt-auth", "v1.0.0"))
        .await
        .unwrap();

    let writer = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for minor in 1..=10 {
                service
                    .create_policy_version(policy("jwt-auth", &format!("v1.{}.0", minor)))
                    .await
                    .unwrap();
            }
        })
    };

    for _ in 0..10 {
        let result = service
            .resolve_batch(vec![
                ResolveRequest::new("jwt-auth", "latest_major", None),
                ResolveRequest::new("jwt-auth", "exact", Some("v1.0.0")),
            ])
            .await
            .unwrap();
        assert_eq!(result.items.len(), 2);
        assert!(result.errors.is_empty());
        assert!(latest_flags(&store, "jwt-auth").len() <= 1);
    }

    writer.await.unwrap();
    assert_eq!(latest_flags(&store, "jwt-auth"), vec!["v1.10.0"]);
}
