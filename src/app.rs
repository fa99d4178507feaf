//! Application context: owns the page, the bus, the lifecycle and the request
//! endpoint for one run.

use crate::dom::PageHandle;
use crate::event::EventBus;
use crate::lifecycle::{self, Clock, LifecycleConfig, LifecycleHandle, SystemClock};
use crate::mode::Visibility;
use crate::protocol::{Endpoint, RequestClient, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct App {
    page: PageHandle,
    bus: EventBus,
    lifecycle: LifecycleHandle,
    visibility: Visibility,
    router: Router,
    client: RequestClient,
    _endpoint: Endpoint,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Start mirroring `page`. Must be called inside a tokio runtime.
    pub fn start(page: PageHandle, config: LifecycleConfig) -> Self {
        Self::start_with_clock(page, config, Arc::new(SystemClock))
    }

    pub fn start_with_clock(page: PageHandle, config: LifecycleConfig, clock: Arc<dyn Clock>) -> Self {
        let bus = EventBus::new();
        let visibility: Visibility = Arc::new(watch::channel(false).0);
        let (lifecycle, lifecycle_task) =
            lifecycle::spawn(page.clone(), bus.clone(), visibility.clone(), config, clock);
        let router = Router::new(lifecycle.clone(), config.document_supported);
        let (endpoint, client) = Endpoint::new();
        let server = endpoint.bind(router.clone());
        tracing::info!("Mirror started");
        Self {
            page,
            bus,
            lifecycle,
            visibility,
            router,
            client,
            _endpoint: endpoint,
            tasks: vec![lifecycle_task, server],
        }
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn lifecycle(&self) -> &LifecycleHandle {
        &self.lifecycle
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn client(&self) -> RequestClient {
        self.client.clone()
    }

    /// Follows the mini-player's open/closed flag.
    pub fn visibility(&self) -> watch::Receiver<bool> {
        self.visibility.subscribe()
    }

    /// The sink closed itself (e.g. the user dismissed it).
    pub fn sink_closed(&self) {
        let handled = self.lifecycle.with_session(|s| s.modes.closed_by_sink());
        if handled.is_none() {
            self.visibility.send_replace(false);
        }
    }

    pub async fn shutdown(mut self) {
        self.lifecycle.shutdown();
        let mut tasks = std::mem::take(&mut self.tasks).into_iter();
        if let Some(lifecycle_task) = tasks.next() {
            let _ = lifecycle_task.await;
        }
        for task in tasks {
            task.abort();
        }
        tracing::info!("Mirror stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ManualClock;
    use crate::protocol::Request;
    use crate::simulator::Simulator;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn start_toggle_and_shutdown() {
        let sim = Simulator::new();
        let app = App::start_with_clock(sim.page(), LifecycleConfig::default(), Arc::new(ManualClock::new(0)));
        let visible = app.visibility();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(app.lifecycle().is_healthy());
        assert_eq!(app.bus().latest_track().map(|t| t.title), Some("Midnight Corniche".to_string()));

        let response = app.client().send(Request::ToggleMiniPlayer { preferred_mode: None }).await.unwrap();
        assert!(response.success);
        assert!(*visible.borrow());
        app.sink_closed();
        assert!(!*visible.borrow());

        let unknown = app.router().handle_json(r#"{"action":"resize"}"#).await;
        assert_eq!(unknown.error.as_deref(), Some("Unknown action: resize"));

        let page = app.page().clone();
        app.shutdown().await;
        assert_eq!(page.observer_count(), 0);
    }
}
