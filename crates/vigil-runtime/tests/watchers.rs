//! Watcher and supervisor behaviour against in-memory fakes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_stream::stream;
use async_trait::async_trait;
use tokio::sync::mpsc;
use vigil_core::{
    ChangeDetector, DiscoveryGate, EventBus, MonitorEvent, ProviderError, ServiceObservation,
    ServiceProvider, ServiceState, SourceKind, StateStore, Subscription, Whitelist,
};
use vigil_runtime::{
    EventFeed, FeedError, FeedStream, MonitorSupervisor, PollWatcher, PushWatcher, SourceWatcher,
};

const RETRY: Duration = Duration::from_millis(20);

type FeedItem = Result<ServiceObservation, FeedError>;

/// Scripted event feed. Every successful `subscribe` replaces the live
/// sender so the test can push events into the newest subscription.
#[derive(Default)]
struct FakeFeed {
    services: Mutex<Vec<ServiceObservation>>,
    discover_fails: AtomicBool,
    subscribe_failures: AtomicUsize,
    subscriptions: AtomicUsize,
    live: Mutex<Option<mpsc::UnboundedSender<FeedItem>>>,
}

impl FakeFeed {
    fn set_services(&self, services: &[(&str, ServiceState)]) {
        *self.services.lock().unwrap() = services
            .iter()
            .map(|(name, state)| obs(name, *state))
            .collect();
    }

    fn push(&self, item: FeedItem) {
        if let Some(tx) = self.live.lock().unwrap().as_ref() {
            let _ = tx.send(item);
        }
    }

    fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFeed for FakeFeed {
    fn host(&self) -> &str {
        "node"
    }

    fn source(&self) -> SourceKind {
        SourceKind::Docker
    }

    async fn discover(&self) -> Result<Vec<ServiceObservation>, FeedError> {
        if self.discover_fails.load(Ordering::SeqCst) {
            return Err(FeedError::Parse("discovery broken".into()));
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn subscribe(&self) -> Result<FeedStream, FeedError> {
        if self
            .subscribe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FeedError::Closed);
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.live.lock().unwrap() = Some(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }))
    }
}

/// Provider whose answer per host can be swapped between cycles.
#[derive(Default)]
struct FakeProvider {
    answers: Mutex<Vec<(String, Result<Vec<(String, bool)>, String>)>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn answer(&self, host: &str, answer: Result<Vec<(&str, bool)>, &str>) {
        let answer = answer
            .map(|list| list.into_iter().map(|(n, r)| (n.to_string(), r)).collect())
            .map_err(str::to_string);
        let mut answers = self.answers.lock().unwrap();
        answers.retain(|(h, _)| h != host);
        answers.push((host.to_string(), answer));
    }
}

#[async_trait]
impl ServiceProvider for FakeProvider {
    fn source(&self) -> SourceKind {
        SourceKind::Agent
    }

    async fn get_services(
        &self,
        host: &str,
        _deadline: Instant,
    ) -> Result<Vec<ServiceObservation>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answers = self.answers.lock().unwrap();
        let (_, answer) = answers
            .iter()
            .find(|(h, _)| h == host)
            .ok_or_else(|| ProviderError::UnknownHost(host.to_string()))?;
        match answer {
            Ok(list) => Ok(list
                .iter()
                .map(|(name, running)| {
                    ServiceObservation::new(
                        host,
                        name.clone(),
                        SourceKind::Agent,
                        ServiceState::from_running(*running),
                        if *running { "up" } else { "down" },
                    )
                })
                .collect()),
            Err(reason) => Err(ProviderError::Unreachable(reason.clone())),
        }
    }
}

fn obs(name: &str, state: ServiceState) -> ServiceObservation {
    ServiceObservation::new("node", name, SourceKind::Docker, state, state.as_str())
}

struct Harness {
    supervisor: MonitorSupervisor,
    store: Arc<StateStore>,
    events: Subscription,
}

impl Harness {
    fn new(whitelist: Whitelist) -> Self {
        let store = Arc::new(StateStore::new());
        let bus = Arc::new(EventBus::new(64));
        let events = bus.subscribe("test");
        let detector = ChangeDetector::new(store.clone(), bus, DiscoveryGate::new(true));
        Self {
            supervisor: MonitorSupervisor::new(detector, Arc::new(whitelist)),
            store,
            events,
        }
    }

    async fn start(&self, watchers: Vec<SourceWatcher>) {
        self.supervisor.start(watchers).await.unwrap();
    }

    async fn discovery_complete(&self) {
        tokio::time::timeout(
            Duration::from_secs(2),
            self.supervisor.detector().gate().wait_complete(),
        )
        .await
        .expect("discovery did not complete");
    }

    async fn next_event(&mut self) -> MonitorEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("no event published")
            .unwrap()
    }

    async fn no_event(&mut self) {
        assert!(
            tokio::time::timeout(Duration::from_millis(100), self.events.recv())
                .await
                .is_err(),
            "unexpected event"
        );
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    let started = Instant::now();
    while !condition() {
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "condition not reached"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn push_watcher(feed: &Arc<FakeFeed>) -> SourceWatcher {
    PushWatcher::new(feed.clone(), RETRY).into()
}

#[tokio::test]
async fn push_sweep_seeds_silently_then_reports_stop() {
    let feed = Arc::new(FakeFeed::default());
    feed.set_services(&[
        ("web", ServiceState::Running),
        ("db", ServiceState::Running),
        ("old", ServiceState::Stopped),
    ]);

    let mut h = Harness::new(Whitelist::allow_all());
    h.start(vec![push_watcher(&feed)]).await;
    h.discovery_complete().await;
    wait_for(|| feed.subscriptions() == 1).await;

    assert_eq!(h.store.service_count(), 3);
    assert!(h.store.host("node").unwrap().reachable);
    h.no_event().await;

    feed.push(Ok(obs("db", ServiceState::Stopped)));
    match h.next_event().await {
        MonitorEvent::ServiceStateChanged {
            service,
            previous_state,
            current_state,
            ..
        } => {
            assert_eq!(service, "db");
            assert_eq!(previous_state, ServiceState::Running);
            assert_eq!(current_state, ServiceState::Stopped);
        }
        other => panic!("unexpected event {other:?}"),
    }

    h.supervisor.shutdown().await;
    assert_eq!(h.supervisor.running_watchers().await, 0);
}

#[tokio::test]
async fn push_feed_drop_marks_unreachable_then_resyncs() {
    let feed = Arc::new(FakeFeed::default());
    feed.set_services(&[("web", ServiceState::Running)]);

    let mut h = Harness::new(Whitelist::allow_all());
    h.start(vec![push_watcher(&feed)]).await;
    h.discovery_complete().await;
    wait_for(|| feed.subscriptions() == 1).await;

    // While the feed is down the container stops and nobody tells us.
    feed.subscribe_failures.store(2, Ordering::SeqCst);
    feed.set_services(&[("web", ServiceState::Stopped)]);
    feed.push(Err(FeedError::Closed));

    assert!(matches!(
        h.next_event().await,
        MonitorEvent::HostUnreachable { .. }
    ));
    assert!(matches!(
        h.next_event().await,
        MonitorEvent::HostRecovered { .. }
    ));
    // Resync after reconnect catches the missed transition.
    assert!(matches!(
        h.next_event().await,
        MonitorEvent::ServiceStateChanged {
            current_state: ServiceState::Stopped,
            ..
        }
    ));
    assert_eq!(feed.subscriptions(), 2);
    h.no_event().await;

    h.supervisor.shutdown().await;
}

#[tokio::test]
async fn failed_sweep_still_ends_discovery() {
    let feed = Arc::new(FakeFeed::default());
    feed.discover_fails.store(true, Ordering::SeqCst);
    feed.subscribe_failures.store(usize::MAX, Ordering::SeqCst);

    let h = Harness::new(Whitelist::allow_all());
    h.start(vec![push_watcher(&feed)]).await;
    h.discovery_complete().await;

    let host = h.store.host("node").unwrap();
    assert!(!host.reachable);
    assert!(!host.last_error.is_empty());
    assert_eq!(h.store.service_count(), 0);

    h.supervisor.shutdown().await;
}

#[tokio::test]
async fn whitelist_filters_observations() {
    let feed = Arc::new(FakeFeed::default());
    feed.set_services(&[("web", ServiceState::Running), ("noise", ServiceState::Running)]);

    let settings = vigil_core::MonitorSettings {
        hosts: vec![vigil_core::HostConfig::new("node", SourceKind::Docker).with_services(["web"])],
        ..Default::default()
    };

    let mut h = Harness::new(settings.whitelist());
    h.start(vec![push_watcher(&feed)]).await;
    h.discovery_complete().await;
    wait_for(|| feed.subscriptions() == 1).await;

    assert_eq!(h.store.service_count(), 1);
    assert!(h.store.service("node", "noise").is_none());

    feed.push(Ok(obs("noise", ServiceState::Stopped)));
    h.no_event().await;

    h.supervisor.shutdown().await;
}

#[tokio::test]
async fn poll_isolates_failing_hosts() {
    let provider = Arc::new(FakeProvider::default());
    provider.answer("nas", Ok(vec![("smbd", true), ("nfsd", true)]));
    provider.answer("pi", Err("connection refused"));

    let mut h = Harness::new(Whitelist::allow_all());
    let watcher = PollWatcher::new(
        provider.clone(),
        vec!["nas".into(), "pi".into()],
        Duration::from_millis(30),
        Duration::from_secs(1),
    );
    h.start(vec![watcher.into()]).await;
    h.discovery_complete().await;

    assert_eq!(h.store.service_count(), 2);
    assert!(h.store.host("nas").unwrap().reachable);
    assert!(!h.store.host("pi").unwrap().reachable);
    h.no_event().await;

    provider.answer("pi", Ok(vec![("sshd", true)]));
    provider.answer("nas", Ok(vec![("smbd", false), ("nfsd", true)]));

    let mut names = vec![h.next_event().await, h.next_event().await]
        .iter()
        .map(|e| (e.event_name(), e.host().to_string()))
        .collect::<Vec<_>>();
    names.sort();
    // "pi" recovering is a first-contact success after a first-contact
    // failure, which counts as a recovery.
    assert_eq!(
        names,
        vec![
            ("host:recovered", "pi".to_string()),
            ("service:state_changed", "nas".to_string()),
        ]
    );

    h.supervisor.shutdown().await;
    let calls = provider.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn discovery_waits_for_every_watcher() {
    let provider = Arc::new(FakeProvider::default());
    let feed = Arc::new(FakeFeed::default());
    feed.set_services(&[("web", ServiceState::Running)]);

    let h = Harness::new(Whitelist::allow_all());
    // An unknown host makes every poll fail, but the cycle still completes.
    let poller = PollWatcher::new(
        provider.clone(),
        vec!["ghost".into()],
        Duration::from_millis(50),
        Duration::from_secs(1),
    );
    h.start(vec![push_watcher(&feed), poller.into()]).await;
    h.discovery_complete().await;

    // Both first sweeps have run by the time the phase ends.
    assert!(h.store.service("node", "web").is_some());
    let ghost = h.store.host("ghost").unwrap();
    assert!(!ghost.reachable);
    assert_eq!(ghost.last_error, "Unknown host: ghost");

    h.supervisor.shutdown().await;
}
