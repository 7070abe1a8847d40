#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coordination_store::{CoordinationStore, Guard, MemoryStore, Versioned};
use mockall::mock;
use tracing_subscriber::EnvFilter;

use subscription_cursors::comparator::{ComparatorRegistry, OffsetOrdering};
use subscription_cursors::coordinator::{Collaborators, CommitConfig, CommitCoordinator};
use subscription_cursors::directory::{
    EventType, EventTypeDirectory, Subscription, SubscriptionDirectory, TokenService,
};
use subscription_cursors::error::ResolutionError;
use subscription_cursors::keys::StoreKey;
use subscription_cursors::types::{ExternalCursor, SessionAssignment};

pub const P1: &str = "p1";
pub const P2: &str = "p2";

pub const NEW_OFFSET: &str = "002_newOffset";
pub const OLD_OFFSET: &str = "001_oldOffset";
pub const OLDEST_OFFSET: &str = "000_oldestOffset";

mock! {
    pub EventTypes {}

    #[async_trait]
    impl EventTypeDirectory for EventTypes {
        async fn find_by_name(&self, name: &str) -> Result<EventType, ResolutionError>;
    }
}

mock! {
    pub Subscriptions {}

    #[async_trait]
    impl SubscriptionDirectory for Subscriptions {
        async fn get_subscription(&self, id: &str) -> Result<Subscription, ResolutionError>;
    }
}

mock! {
    pub Tokens {}

    impl TokenService for Tokens {
        fn generate_token(&self) -> String;
    }
}

pub fn init_tracing() {
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init(),
    );
}

pub fn random_id(kind: &str) -> String {
    format!("{kind}-{}", uuid::Uuid::new_v4())
}

/// How the event-type directory behaves in a test.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Directory {
    Healthy,
    Failing,
}

/// A subscription over one event type with partitions `p1` and `p2`, both
/// assigned to `stream_id`, both at `OLD_OFFSET`, and a live session marker.
pub struct Fixture {
    pub store: Arc<dyn CoordinationStore>,
    pub coordinator: CommitCoordinator,
    pub subscription_id: String,
    pub stream_id: String,
    pub event_type: String,
    pub topic: String,
}

/// Knobs for [`Fixture::build_with`].
pub struct Setup {
    pub store: Arc<dyn CoordinationStore>,
    pub directory: Directory,
    pub config: CommitConfig,
    pub topic: String,
    pub ordering: Arc<dyn OffsetOrdering>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new("/nakadi/")),
            directory: Directory::Healthy,
            config: CommitConfig::default(),
            topic: random_id("topic"),
            ordering: Arc::new(ComparatorRegistry::default()),
        }
    }
}

impl Fixture {
    pub async fn new() -> Self {
        Self::build_with(Setup::default()).await
    }

    pub async fn with_store(store: Arc<dyn CoordinationStore>) -> Self {
        Self::build_with(Setup {
            store,
            ..Setup::default()
        })
        .await
    }

    pub async fn build(
        store: Arc<dyn CoordinationStore>,
        directory: Directory,
        config: CommitConfig,
    ) -> Self {
        Self::build_with(Setup {
            store,
            directory,
            config,
            ..Setup::default()
        })
        .await
    }

    pub async fn build_with(setup: Setup) -> Self {
        init_tracing();

        let Setup {
            store,
            directory,
            config,
            topic,
            ordering,
        } = setup;
        let subscription_id = random_id("sub");
        let stream_id = random_id("stream");
        let event_type = random_id("et");

        let collaborators = Collaborators {
            event_types: Arc::new(event_types(&event_type, &topic, directory)),
            subscriptions: Arc::new(subscriptions(&subscription_id, &event_type)),
            tokens: Arc::new(tokens()),
            ordering,
        };
        let coordinator = CommitCoordinator::new(Arc::clone(&store), collaborators, config);

        let fixture = Self {
            store,
            coordinator,
            subscription_id,
            stream_id,
            event_type,
            topic,
        };

        for partition in [P1, P2] {
            fixture.set_offset(partition, OLD_OFFSET).await;
            fixture.assign(partition, &fixture.stream_id).await;
        }
        fixture.open_session(&fixture.stream_id).await;
        fixture
    }

    pub fn cursor(&self, partition: &str, offset: &str) -> ExternalCursor {
        ExternalCursor::new(partition, offset, self.event_type.clone(), "token")
    }

    pub fn offset_key(&self, partition: &str) -> String {
        StoreKey::PartitionOffset {
            subscription: &self.subscription_id,
            topic: &self.topic,
            partition,
        }
        .resolve(self.store.prefix())
    }

    pub fn assignment_key(&self, partition: &str) -> String {
        StoreKey::PartitionAssignment {
            subscription: &self.subscription_id,
            topic: &self.topic,
            partition,
        }
        .resolve(self.store.prefix())
    }

    pub async fn set_offset(&self, partition: &str, offset: &str) {
        self.store
            .put(&self.offset_key(partition), offset.as_bytes())
            .await
            .unwrap();
    }

    pub async fn assign(&self, partition: &str, stream_id: &str) {
        let record = SessionAssignment::assigned(stream_id).encode();
        self.store
            .put(&self.assignment_key(partition), record.as_bytes())
            .await
            .unwrap();
    }

    pub async fn open_session(&self, stream_id: &str) {
        let key = StoreKey::Session {
            subscription: &self.subscription_id,
            stream_id,
        }
        .resolve(self.store.prefix());
        self.store.put(&key, b"").await.unwrap();
    }

    pub async fn offset(&self, partition: &str) -> String {
        let record = self
            .store
            .get(&self.offset_key(partition))
            .await
            .unwrap()
            .expect("offset record should exist");
        record.value_str().unwrap().to_string()
    }
}

fn event_types(name: &str, topic: &str, directory: Directory) -> MockEventTypes {
    let known = EventType {
        name: name.to_string(),
        topic: topic.to_string(),
    };
    let mut mock = MockEventTypes::new();
    mock.expect_find_by_name().returning(move |name| {
        if directory == Directory::Failing {
            return Err(ResolutionError::Directory("event type repository down".to_string()));
        }
        if name == known.name {
            Ok(known.clone())
        } else {
            Err(ResolutionError::EventTypeNotFound(name.to_string()))
        }
    });
    mock
}

fn subscriptions(id: &str, event_type: &str) -> MockSubscriptions {
    let known = Subscription {
        id: id.to_string(),
        event_types: [event_type.to_string()].into_iter().collect(),
    };
    let mut mock = MockSubscriptions::new();
    mock.expect_get_subscription().returning(move |id| {
        if id == known.id {
            Ok(known.clone())
        } else {
            Err(ResolutionError::SubscriptionNotFound(id.to_string()))
        }
    });
    mock
}

fn tokens() -> MockTokens {
    let issued = AtomicUsize::new(0);
    let mut mock = MockTokens::new();
    mock.expect_generate_token()
        .returning(move || format!("token-{}", issued.fetch_add(1, Ordering::SeqCst)));
    mock
}

/// What the simulated concurrent writer does to `key`.
#[derive(Clone)]
enum Action {
    Put(String),
    Delete,
}

struct Interference {
    target: String,
    remaining: usize,
    key: String,
    action: Action,
}

/// Wraps a [`MemoryStore`] and lets a test act as a concurrent writer: right
/// before a compare-and-set on the targeted key it writes or deletes another
/// key, so the compare-and-set runs against state the caller never read.
pub struct InterferingStore {
    inner: MemoryStore,
    interference: Mutex<Option<Interference>>,
}

impl InterferingStore {
    pub fn new(prefix: &str) -> Self {
        Self {
            inner: MemoryStore::new(prefix),
            interference: Mutex::new(None),
        }
    }

    /// Before each of the next `times` compare-and-set calls on `target`,
    /// write `value` to `key`.
    pub fn interfere(&self, target: String, times: usize, key: String, value: &str) {
        self.set(target, times, key, Action::Put(value.to_string()));
    }

    /// Before the next compare-and-set on `target`, delete `key`.
    pub fn delete_before(&self, target: String, key: String) {
        self.set(target, 1, key, Action::Delete);
    }

    fn set(&self, target: String, remaining: usize, key: String, action: Action) {
        *self.interference.lock().unwrap() = Some(Interference {
            target,
            remaining,
            key,
            action,
        });
    }

    fn next_interference(&self, target: &str) -> Option<(String, Action)> {
        let mut guard = self.interference.lock().unwrap();
        let interference = guard.as_mut()?;
        if interference.target != target || interference.remaining == 0 {
            return None;
        }
        interference.remaining -= 1;
        Some((interference.key.clone(), interference.action.clone()))
    }
}

#[async_trait]
impl CoordinationStore for InterferingStore {
    fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    async fn get(&self, key: &str) -> coordination_store::Result<Option<Versioned>> {
        self.inner.get(key).await
    }

    async fn list(&self, prefix: &str) -> coordination_store::Result<Vec<(String, Versioned)>> {
        self.inner.list(prefix).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> coordination_store::Result<()> {
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> coordination_store::Result<()> {
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> coordination_store::Result<()> {
        self.inner.delete_prefix(prefix).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: i64,
        value: &[u8],
        guards: &[Guard],
    ) -> coordination_store::Result<bool> {
        match self.next_interference(key) {
            Some((other, Action::Put(value))) => self.inner.put(&other, value.as_bytes()).await?,
            Some((other, Action::Delete)) => self.inner.delete(&other).await?,
            None => {}
        }
        self.inner
            .compare_and_set(key, expected_version, value, guards)
            .await
    }
}
