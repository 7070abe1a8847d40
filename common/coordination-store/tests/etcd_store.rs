use coordination_store::{CoordinationStore, EtcdStore, Guard, StoreConfig};

const ETCD_ENDPOINT: &str = "http://localhost:2379";

async fn test_store(test_name: &str) -> EtcdStore {
    let prefix = format!("/test-{}-{}/", test_name, uuid::Uuid::new_v4());
    let config = StoreConfig {
        endpoints: vec![ETCD_ENDPOINT.to_string()],
        prefix,
    };
    EtcdStore::connect(config)
        .await
        .expect("failed to connect to etcd")
}

#[tokio::test]
#[ignore = "requires etcd at localhost:2379"]
async fn compare_and_set_follows_key_version() {
    let store = test_store("cas-version").await;
    let key = format!("{}offset", store.prefix());

    assert!(store.compare_and_set(&key, 0, b"1", &[]).await.unwrap());
    assert!(!store.compare_and_set(&key, 0, b"2", &[]).await.unwrap());

    let current = store.get(&key).await.unwrap().unwrap();
    assert_eq!(current.value_str().unwrap(), "1");
    assert_eq!(current.version, 1);

    assert!(store.compare_and_set(&key, 1, b"3", &[]).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap().unwrap().value, b"3");

    store.delete_all().await.unwrap();
}

#[tokio::test]
#[ignore = "requires etcd at localhost:2379"]
async fn guard_blocks_write_after_guarded_key_changes() {
    let store = test_store("cas-guard").await;
    let key = format!("{}offset", store.prefix());
    let owner = format!("{}owner", store.prefix());

    store.put(&key, b"1").await.unwrap();
    store.put(&owner, b"a").await.unwrap();
    let observed = store.get(&owner).await.unwrap().unwrap();
    let guard = Guard {
        key: owner.clone(),
        mod_revision: observed.mod_revision,
    };

    store.put(&owner, b"b").await.unwrap();
    assert!(!store
        .compare_and_set(&key, 1, b"2", std::slice::from_ref(&guard))
        .await
        .unwrap());
    assert_eq!(store.get(&key).await.unwrap().unwrap().value, b"1");

    let observed = store.get(&owner).await.unwrap().unwrap();
    let guard = Guard {
        key: owner,
        mod_revision: observed.mod_revision,
    };
    assert!(store.compare_and_set(&key, 1, b"2", &[guard]).await.unwrap());

    store.delete_all().await.unwrap();
}

#[tokio::test]
#[ignore = "requires etcd at localhost:2379"]
async fn list_returns_prefixed_entries_in_key_order() {
    let store = test_store("list").await;
    let prefix = store.prefix().to_string();
    for name in ["b", "a", "c"] {
        store
            .put(&format!("{prefix}dir/{name}"), name.as_bytes())
            .await
            .unwrap();
    }
    store.put(&format!("{prefix}other"), b"x").await.unwrap();

    let keys: Vec<String> = store
        .list(&format!("{prefix}dir/"))
        .await
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(
        keys,
        vec![
            format!("{prefix}dir/a"),
            format!("{prefix}dir/b"),
            format!("{prefix}dir/c"),
        ]
    );

    store.delete_all().await.unwrap();
}

#[tokio::test]
#[ignore = "requires etcd at localhost:2379"]
async fn revoked_lease_removes_key() {
    let store = test_store("lease").await;
    let key = format!("{}session", store.prefix());

    let lease = store.grant_lease(30).await.unwrap();
    store.put_with_lease(&key, b"", lease).await.unwrap();
    assert!(store.get(&key).await.unwrap().is_some());

    store.revoke_lease(lease).await.unwrap();
    assert!(store.get(&key).await.unwrap().is_none());

    store.delete_all().await.unwrap();
}
