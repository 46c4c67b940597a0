//! Online/offline tracking for the backend.
//!
//! [`ConnectivityMonitor`] owns a single flag fed by two sources: platform
//! network events ([`ConnectivityMonitor::network_available`] and
//! [`ConnectivityMonitor::network_unavailable`]) and periodic health probes.
//! When the flag flips, registered listeners receive a [`Transition`]. Readings
//! equal to the current state are ignored, so steady polling is silent.
//!
//! The monitor does no rendering. UI reactions such as toasts are listeners
//! like any other (see [`crate::notify::connectivity_listener`]).

use crate::api_client::ApiClient;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Online => f.write_str("online"),
            Connectivity::Offline => f.write_str("offline"),
        }
    }
}

/// What produced the reading that caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    NetworkAvailable,
    NetworkUnavailable,
    HealthCheck,
    RequestFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Connectivity,
    pub to: Connectivity,
    pub cause: TransitionCause,
}

impl Transition {
    /// Coming back online from a platform event calls for a UI refresh.
    pub fn requests_refresh(&self) -> bool {
        self.to.is_online() && self.cause == TransitionCause::NetworkAvailable
    }
}

/// Active liveness check against the backend.
pub trait HealthProbe: Send + Sync + 'static {
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

impl HealthProbe for ApiClient {
    async fn probe(&self) -> bool {
        match self.health_check().await {
            Ok(health) => health.is_healthy(),
            Err(err) => {
                debug!("Health check failed: {}", err);
                false
            }
        }
    }
}

pub type Listener = Arc<dyn Fn(&Transition) + Send + Sync + 'static>;

/// Token returned by [`ConnectivityMonitor::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Inner<P> {
    probe: P,
    poll_interval: Duration,
    state: RwLock<Connectivity>,
    // Held across a state change and its notification.
    transitions: Mutex<()>,
    network_up: AtomicBool,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

pub struct ConnectivityMonitor<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for ConnectivityMonitor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: HealthProbe> ConnectivityMonitor<P> {
    /// `network_reachable` is the platform's reachability signal at startup.
    pub fn new(probe: P, network_reachable: bool, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                probe,
                poll_interval,
                state: RwLock::new(Connectivity::from_reachable(network_reachable)),
                transitions: Mutex::new(()),
                network_up: AtomicBool::new(network_reachable),
                listeners: RwLock::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> Connectivity {
        self.inner
            .state
            .read()
            .map(|state| *state)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Transition) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns whether a listener was registered under `id`.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .map(|listeners| listeners.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// Platform event: network became reachable.
    pub fn network_available(&self) -> Option<Transition> {
        self.inner.network_up.store(true, Ordering::SeqCst);
        self.apply(Connectivity::Online, TransitionCause::NetworkAvailable)
    }

    /// Platform event: network became unreachable.
    pub fn network_unavailable(&self) -> Option<Transition> {
        self.inner.network_up.store(false, Ordering::SeqCst);
        self.apply(Connectivity::Offline, TransitionCause::NetworkUnavailable)
    }

    /// A request failed at the transport level; the backend is unreachable.
    pub fn report_network_failure(&self) -> Option<Transition> {
        self.apply(Connectivity::Offline, TransitionCause::RequestFailure)
    }

    /// Runs one health check and applies its result.
    ///
    /// Skips the probe and forces offline when the platform reports no
    /// network. A probe result that arrives after the platform went down is
    /// discarded.
    pub async fn poll_once(&self) -> Option<Transition> {
        if !self.inner.network_up.load(Ordering::SeqCst) {
            return self.apply(Connectivity::Offline, TransitionCause::NetworkUnavailable);
        }

        let healthy = self.inner.probe.probe().await;

        if !self.inner.network_up.load(Ordering::SeqCst) {
            debug!("Network went down during health check, discarding result");
            return self.apply(Connectivity::Offline, TransitionCause::NetworkUnavailable);
        }

        self.apply(
            Connectivity::from_reachable(healthy),
            TransitionCause::HealthCheck,
        )
    }

    /// Spawns the periodic health check. The first check runs immediately.
    pub fn start(&self) -> MonitorHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let monitor = self.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(monitor.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = signal.notified() => {
                        debug!("Connectivity monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.poll_once().await;
                    }
                }
            }
        });

        info!(
            "Connectivity monitor started (interval {:?})",
            self.inner.poll_interval
        );

        MonitorHandle {
            shutdown,
            task: Some(task),
        }
    }

    /// Listeners see transitions in the order the state changed. They may read
    /// the state and add or remove listeners, but must not trigger a transition
    /// themselves.
    fn apply(&self, candidate: Connectivity, cause: TransitionCause) -> Option<Transition> {
        let _serial = self
            .inner
            .transitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let transition = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *state == candidate {
                return None;
            }
            let transition = Transition {
                from: *state,
                to: candidate,
                cause,
            };
            *state = candidate;
            transition
        };

        info!(
            "Connectivity changed: {} -> {} ({:?})",
            transition.from, transition.to, transition.cause
        );
        self.notify(&transition);
        Some(transition)
    }

    fn notify(&self, transition: &Transition) {
        // Snapshot so listeners may add or remove listeners while running.
        let listeners: Vec<(ListenerId, Listener)> = self
            .inner
            .listeners
            .read()
            .map(|listeners| listeners.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(transition))).is_err() {
                warn!("Connectivity listener {:?} panicked", id);
            }
        }
    }
}

/// Handle to the background poll started by [`ConnectivityMonitor::start`].
///
/// Dropping the handle leaves the poll running for the life of the runtime.
pub struct MonitorHandle {
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Cancels the periodic poll and waits for the task to finish.
    pub async fn stop(mut self) {
        // A stored permit is picked up even if a poll is in flight.
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Connectivity monitor task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FixedProbe(AtomicBool);

    impl HealthProbe for FixedProbe {
        async fn probe(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn monitor(reachable: bool, healthy: bool) -> ConnectivityMonitor<FixedProbe> {
        ConnectivityMonitor::new(
            FixedProbe(AtomicBool::new(healthy)),
            reachable,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_initial_state_follows_platform() {
        assert_eq!(monitor(true, true).state(), Connectivity::Online);
        assert_eq!(monitor(false, true).state(), Connectivity::Offline);
    }

    #[test]
    fn test_network_events() {
        let m = monitor(true, true);

        let down = m.network_unavailable().unwrap();
        assert_eq!(down.from, Connectivity::Online);
        assert_eq!(down.to, Connectivity::Offline);
        assert!(m.network_unavailable().is_none());

        let up = m.network_available().unwrap();
        assert_eq!(up.cause, TransitionCause::NetworkAvailable);
        assert!(up.requests_refresh());
        assert!(m.network_available().is_none());
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let m = monitor(true, true);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            m.add_listener(move |_| seen.lock().unwrap().push(tag));
        }

        m.network_unavailable();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_listener() {
        let m = monitor(true, true);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let id = m.add_listener(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(m.remove_listener(id));
        assert!(!m.remove_listener(id));
        assert_eq!(m.listener_count(), 0);

        m.network_unavailable();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let m = monitor(true, true);
        let calls = Arc::new(AtomicUsize::new(0));
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let m_clone = m.clone();
        let calls_clone = calls.clone();
        let slot_clone = id_slot.clone();
        let id = m.add_listener(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot_clone.lock().unwrap() {
                m_clone.remove_listener(id);
            }
        });
        *id_slot.lock().unwrap() = Some(id);

        m.network_unavailable();
        m.network_available();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_count_survives_poisoned_lock() {
        let m = monitor(true, true);
        m.add_listener(|_| {});

        let m_clone = m.clone();
        let _ = std::thread::spawn(move || {
            let _guard = m_clone.inner.listeners.write().unwrap();
            panic!("poisoning listener lock");
        })
        .join();

        assert!(m.inner.listeners.is_poisoned());
        assert_eq!(m.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_report_network_failure_forces_offline() {
        let m = monitor(true, true);
        let t = m.report_network_failure().unwrap();
        assert_eq!(t.cause, TransitionCause::RequestFailure);
        assert!(!m.is_online());

        // The next healthy poll brings it back.
        let t = m.poll_once().await.unwrap();
        assert_eq!(t.to, Connectivity::Online);
        assert_eq!(t.cause, TransitionCause::HealthCheck);
    }
}
