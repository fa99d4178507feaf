//! The lifecycle driver: runs [`ConnectionMachine`] against real timers and
//! owns the extraction session it builds.

use super::clock::Clock;
use super::machine::{ConnectionMachine, Effect, Input, LinkState, RetryPolicy};
use crate::dom::{PageError, PageHandle};
use crate::event::EventBus;
use crate::extractor::Extractor;
use crate::mode::{ModeManager, Visibility};
use crate::observe::{LyricsObserver, TrackObserver};
use crate::state::ConnectionStatus;
use futures_util::future::pending;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("page unavailable: {0}")]
    Page(#[from] PageError),
}

#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub policy: RetryPolicy,
    pub readiness_poll: Duration,
    pub document_supported: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            readiness_poll: Duration::from_millis(100),
            document_supported: true,
        }
    }
}

/// Everything one successful initialization wires up.
#[derive(Debug)]
pub struct Session {
    pub extractor: Extractor,
    pub tracks: TrackObserver,
    pub lyrics: LyricsObserver,
    pub modes: ModeManager,
}

impl Session {
    fn stop(&mut self) {
        self.tracks.stop();
        self.lyrics.stop();
    }
}

type SharedSession = Arc<Mutex<Option<Session>>>;
type InitFuture = Pin<Box<dyn Future<Output = Result<Session, InitError>> + Send>>;

fn lock(session: &SharedSession) -> MutexGuard<'_, Option<Session>> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Control {
    Reinitialize(oneshot::Sender<bool>),
    Shutdown,
}

/// Cheap, cloneable access to the running lifecycle.
#[derive(Clone)]
pub struct LifecycleHandle {
    status: watch::Receiver<ConnectionStatus>,
    session: SharedSession,
    control: mpsc::UnboundedSender<Control>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LifecycleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHandle").field("status", &*self.status.borrow()).finish()
    }
}

impl LifecycleHandle {
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone().at(self.clock.now_ms())
    }

    pub fn state(&self) -> LinkState {
        self.status.borrow().state
    }

    pub fn is_healthy(&self) -> bool {
        self.status.borrow().is_healthy
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Run `f` against the live session, if there is one.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        lock(&self.session).as_mut().map(f)
    }

    pub fn extractor(&self) -> Option<Extractor> {
        self.with_session(|s| s.extractor.clone())
    }

    /// Force a fresh initialization and wait up to `timeout` for it.
    /// `true` only when it ends healthy.
    pub async fn reinitialize(&self, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.control.send(Control::Reinitialize(tx)).is_err() {
            return false;
        }
        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(true)))
    }

    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

/// Start the lifecycle for `page`. The returned task ends after
/// [`LifecycleHandle::shutdown`].
pub fn spawn(
    page: PageHandle,
    bus: EventBus,
    visibility: Visibility,
    config: LifecycleConfig,
    clock: Arc<dyn Clock>,
) -> (LifecycleHandle, JoinHandle<()>) {
    let machine = ConnectionMachine::new(config.policy);
    let (status_tx, status_rx) = watch::channel(machine.status(clock.now_ms()));
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let session = SharedSession::default();
    let driver = Driver {
        machine,
        clock: clock.clone(),
        page,
        bus,
        visibility,
        config,
        session: session.clone(),
        status: status_tx,
        waiters: Vec::new(),
        lyrics_wanted: false,
    };
    let task = tokio::spawn(driver.run(control_rx));
    let handle = LifecycleHandle { status: status_rx, session, control: control_tx, clock };
    (handle, task)
}

struct Driver {
    machine: ConnectionMachine,
    clock: Arc<dyn Clock>,
    page: PageHandle,
    bus: EventBus,
    visibility: Visibility,
    config: LifecycleConfig,
    session: SharedSession,
    status: watch::Sender<ConnectionStatus>,
    waiters: Vec<oneshot::Sender<bool>>,
    /// Lyrics observing carries over into the next session.
    lyrics_wanted: bool,
}

#[derive(Default)]
struct Timers {
    init: Option<InitFuture>,
    retry_at: Option<Instant>,
    health: Option<Interval>,
}

impl Driver {
    async fn run(mut self, mut control: mpsc::UnboundedReceiver<Control>) {
        let mut timers = Timers::default();
        self.feed(Input::Start, &mut timers);
        loop {
            let Timers { init, retry_at, health } = &mut timers;
            let retry_at = *retry_at;
            tokio::select! {
                outcome = async {
                    match init.as_mut() {
                        Some(fut) => fut.await,
                        None => pending().await,
                    }
                } => {
                    timers.init = None;
                    match outcome {
                        Ok(session) => {
                            *lock(&self.session) = Some(session);
                            self.feed(Input::InitSucceeded, &mut timers);
                            self.notify_waiters(true);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Initialization failed");
                            self.feed(Input::InitFailed, &mut timers);
                            self.notify_waiters(false);
                        }
                    }
                }
                _ = async {
                    match retry_at {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => pending().await,
                    }
                } => {
                    timers.retry_at = None;
                    self.feed(Input::RetryDue, &mut timers);
                }
                _ = async {
                    match health.as_mut() {
                        Some(interval) => { interval.tick().await; }
                        None => pending::<()>().await,
                    }
                } => {
                    let input = if self.health_check() { Input::HealthCheckPassed } else { Input::HealthCheckFailed };
                    if input == Input::HealthCheckFailed {
                        tracing::warn!("Health check failed, reinitializing");
                    }
                    self.feed(input, &mut timers);
                }
                cmd = control.recv() => match cmd {
                    Some(Control::Reinitialize(reply)) => {
                        tracing::info!("Reinitialization requested");
                        self.waiters.push(reply);
                        self.feed(Input::Start, &mut timers);
                    }
                    Some(Control::Shutdown) | None => {
                        self.feed(Input::Shutdown, &mut timers);
                        self.notify_waiters(false);
                        tracing::info!("Lifecycle stopped");
                        break;
                    }
                },
            }
        }
    }

    fn feed(&mut self, input: Input, timers: &mut Timers) {
        let effects = self.machine.handle(input, self.clock.now_ms());
        for effect in effects {
            self.apply(effect, timers);
        }
        self.status.send_replace(self.machine.status(self.clock.now_ms()));
    }

    fn apply(&mut self, effect: Effect, timers: &mut Timers) {
        match effect {
            Effect::BeginInit => {
                self.tear_down();
                timers.init = Some(Box::pin(initialize(
                    self.page.clone(),
                    self.bus.clone(),
                    self.visibility.clone(),
                    self.config,
                    self.lyrics_wanted,
                )));
            }
            Effect::ScheduleRetry(delay) => {
                tracing::info!(delay_ms = delay.as_millis() as u64, "Retry scheduled");
                timers.retry_at = Some(Instant::now() + delay);
            }
            Effect::StartHealthChecks(every) => {
                let mut interval = tokio::time::interval_at(Instant::now() + every, every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                timers.health = Some(interval);
            }
            Effect::StopHealthChecks => timers.health = None,
            Effect::CancelRetry => timers.retry_at = None,
            Effect::TearDown => {
                timers.init = None;
                self.tear_down();
            }
        }
    }

    fn tear_down(&mut self) {
        if let Some(mut session) = lock(&self.session).take() {
            self.lyrics_wanted = session.lyrics.is_active();
            session.stop();
            tracing::debug!("Session torn down");
        }
    }

    fn health_check(&self) -> bool {
        let guard = lock(&self.session);
        let Some(session) = guard.as_ref() else {
            return false;
        };
        session.extractor.has_anchors() && session.tracks.is_attached() && session.extractor.try_extract().is_ok()
    }

    fn notify_waiters(&mut self, healthy: bool) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(healthy);
        }
    }
}

async fn initialize(
    page: PageHandle,
    bus: EventBus,
    visibility: Visibility,
    config: LifecycleConfig,
    lyrics_wanted: bool,
) -> Result<Session, InitError> {
    let extractor = Extractor::new(page.clone());
    loop {
        if page.is_closed() {
            return Err(PageError::Closed.into());
        }
        if extractor.is_ready() {
            break;
        }
        tokio::time::sleep(config.readiness_poll).await;
    }
    let tracks = TrackObserver::start(extractor.clone(), bus.clone())?;
    let mut lyrics = LyricsObserver::new(extractor.clone(), bus);
    if lyrics_wanted {
        lyrics.start()?;
    }
    let modes = ModeManager::new(config.document_supported, visibility);
    tracing::info!("Session initialized");
    Ok(Session { extractor, tracks, lyrics, modes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlayerEvent;
    use crate::lifecycle::ManualClock;
    use crate::simulator::Simulator;

    fn start(page: PageHandle) -> (LifecycleHandle, JoinHandle<()>, EventBus, Arc<ManualClock>) {
        let bus = EventBus::new();
        let clock = Arc::new(ManualClock::new(1_000));
        let (tx, _rx) = watch::channel(false);
        let (handle, task) =
            spawn(page, bus.clone(), Arc::new(tx), LifecycleConfig::default(), clock.clone());
        (handle, task, bus, clock)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn ready_page_becomes_healthy_and_publishes_snapshot() {
        let sim = Simulator::new();
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let clock = Arc::new(ManualClock::new(5_000));
        let (tx, _vis) = watch::channel(false);
        let (handle, task) = spawn(sim.page(), bus, Arc::new(tx), LifecycleConfig::default(), clock.clone());
        assert!(matches!(rx.recv().await.unwrap(), PlayerEvent::TrackUpdated(s) if s.title == "Midnight Corniche"));
        settle().await;

        assert!(handle.is_healthy());
        clock.advance(2_500);
        let status = handle.status();
        assert_eq!(status.last_successful_connection, Some(5_000));
        assert_eq!(status.time_since_last_success, Some(2_500));
        assert!(handle.extractor().is_some());

        handle.shutdown();
        task.await.unwrap();
        assert_eq!(handle.state(), LinkState::Uninitialized);
        assert_eq!(sim.page().observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_wait_is_unbounded() {
        let sim = Simulator::new();
        sim.unmount_shell().unwrap();
        let (handle, task, _bus, _clock) = start(sim.page());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handle.state(), LinkState::Initializing);

        sim.mount_shell().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.is_healthy());
        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_page_backs_off_then_degrades() {
        let sim = Simulator::new();
        sim.page().close();
        let (handle, task, _bus, _clock) = start(sim.page());
        settle().await;
        assert_eq!(handle.state(), LinkState::Unhealthy);
        assert_eq!(handle.status().retry_count, 1);

        // 2 + 4 + 8 + 16 s of backoff puts the fifth failure just past 30 s.
        tokio::time::sleep(Duration::from_millis(30_000 + 50)).await;
        assert_eq!(handle.status().retry_count, 5);
        assert_eq!(handle.state(), LinkState::Unhealthy);

        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(handle.state(), LinkState::DegradedPeriodicRetry);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn lost_shell_fails_health_check_and_recovers() {
        let sim = Simulator::new();
        let (handle, task, _bus, _clock) = start(sim.page());
        settle().await;
        assert!(handle.is_healthy());
        handle.with_session(|s| s.lyrics.start()).unwrap().unwrap();

        sim.unmount_shell().unwrap();
        sim.mount_shell().unwrap();
        tokio::time::sleep(Duration::from_secs(10) + Duration::from_millis(50)).await;

        // The stale session was replaced by one watching the new shell.
        assert!(handle.is_healthy());
        assert_eq!(handle.with_session(|s| s.tracks.is_attached()), Some(true));
        assert_eq!(handle.with_session(|s| s.lyrics.is_active()), Some(true));
        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reinitialize_reports_outcome() {
        let sim = Simulator::new();
        let (handle, task, _bus, _clock) = start(sim.page());
        settle().await;
        assert!(handle.reinitialize(Duration::from_secs(5)).await);

        sim.page().close();
        assert!(!handle.reinitialize(Duration::from_secs(5)).await);
        assert_eq!(handle.state(), LinkState::Unhealthy);
        handle.shutdown();
        task.await.unwrap();
    }
}
