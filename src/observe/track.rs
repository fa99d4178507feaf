//! Track observation: scoped mutation watches plus a periodic fallback poll.

use super::diff::diff_snapshot;
use crate::dom::{
    Document, MutationSink, Notification, NodeId, ObserveOptions, PageError, Selector, Subscription,
};
use crate::event::EventBus;
use crate::extractor::{Extractor, selectors as sel};
use crate::state::TrackState;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Narrow watches over the containers whose changes matter.
fn watch_scopes(doc: &Document) -> Vec<(&'static str, NodeId, ObserveOptions)> {
    let mut scopes = Vec::new();
    let mut add = |name: &'static str, selector: &str, all: bool, options: ObserveOptions| {
        let Ok(selector) = Selector::parse(selector) else {
            return;
        };
        let nodes = if all {
            doc.query_selector_all(&selector)
        } else {
            doc.query_selector(&selector).into_iter().collect()
        };
        scopes.extend(nodes.into_iter().map(|n| (name, n, options.clone())));
    };
    add(
        "track_info",
        sel::TRACK_INFO,
        false,
        ObserveOptions::subtree_children().with_attributes(&["style", "class"]),
    );
    add(
        "progress",
        sel::PROGRESS_SCOPE,
        false,
        ObserveOptions::subtree_children().with_attributes(&["style"]),
    );
    add(
        "time",
        sel::TIME_READOUT,
        true,
        ObserveOptions::subtree_children().with_character_data(),
    );
    add(
        "controls",
        sel::CONTROLS_SCOPE,
        false,
        ObserveOptions::subtree_children().with_attributes(&["class"]),
    );
    scopes
}

/// Keeps the bus fed with track changes. Owns its subscriptions and task;
/// [`stop`](TrackObserver::stop) tears both down.
#[derive(Debug)]
pub struct TrackObserver {
    extractor: Extractor,
    scopes: Vec<NodeId>,
    subscriptions: Vec<Subscription>,
    task: Option<JoinHandle<()>>,
}

impl TrackObserver {
    /// Attach the watches, publish the initial snapshot and start the loop.
    pub fn start(extractor: Extractor, bus: EventBus) -> Result<Self, PageError> {
        let page = extractor.page().clone();
        let (tx, rx): (MutationSink, _) = mpsc::unbounded_channel();
        let scopes = page.read(watch_scopes)?;
        let mut subscriptions = Vec::with_capacity(scopes.len());
        for (name, node, options) in &scopes {
            subscriptions.push(page.observe(*node, options.clone(), tx.clone())?);
            tracing::debug!(scope = name, %node, "Watching");
        }
        if scopes.is_empty() {
            tracing::warn!("No observable containers found, relying on polling");
        }

        let initial = extractor.try_extract()?;
        for event in diff_snapshot(None, &initial) {
            bus.publish(event);
        }
        let task = tokio::spawn(run(extractor.clone(), bus, rx, initial));
        Ok(Self {
            extractor,
            scopes: scopes.into_iter().map(|(_, node, _)| node).collect(),
            subscriptions,
            task: Some(task),
        })
    }

    /// Every watched container is still part of the page.
    pub fn is_attached(&self) -> bool {
        if self.task.as_ref().is_none_or(|t| t.is_finished()) {
            return false;
        }
        self.extractor
            .page()
            .read(|doc| !self.scopes.is_empty() && self.scopes.iter().all(|&n| doc.is_connected(n)))
            .unwrap_or(false)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_active()).count()
    }

    pub fn stop(&mut self) {
        for sub in &mut self.subscriptions {
            sub.cancel();
        }
        self.subscriptions.clear();
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Track observer stopped");
        }
    }
}

impl Drop for TrackObserver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    extractor: Extractor,
    bus: EventBus,
    mut rx: mpsc::UnboundedReceiver<Notification>,
    mut last: TrackState,
) {
    let mut poll = tokio::time::interval_at(tokio::time::Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            notification = rx.recv() => {
                let Some(_) = notification else { break };
                // One re-extraction per wake-up, however many records queued.
                let mut coalesced = 1;
                while rx.try_recv().is_ok() {
                    coalesced += 1;
                }
                tracing::trace!(coalesced, "Mutations observed");
            }
            _ = poll.tick() => {
                tracing::trace!("Fallback poll");
            }
        }
        let next = match extractor.try_extract() {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(error = %e, "Page unreadable, observer idle");
                continue;
            }
        };
        for event in diff_snapshot(Some(&last), &next) {
            bus.publish(event);
        }
        last = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PlayerEvent;
    use crate::simulator::Simulator;

    #[tokio::test(start_paused = true)]
    async fn publishes_initial_snapshot_then_only_changes() {
        let sim = Simulator::new();
        let extractor = Extractor::new(sim.page());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut observer = TrackObserver::start(extractor.clone(), bus.clone()).unwrap();
        assert_eq!(observer.subscription_count(), 5);
        assert!(observer.is_attached());
        assert!(matches!(rx.recv().await.unwrap(), PlayerEvent::TrackUpdated(_)));

        extractor.toggle_play_pause();
        let event = rx.recv().await.unwrap();
        assert_eq!(event, PlayerEvent::PlayStateUpdated { is_playing: true });

        sim.advance(1.0).unwrap();
        assert!(matches!(rx.recv().await.unwrap(), PlayerEvent::ProgressUpdated(s) if s.current_time == "0:01"));

        extractor.next_track();
        assert!(matches!(rx.recv().await.unwrap(), PlayerEvent::TrackUpdated(s) if s.title == "Paper Lanterns"));

        observer.stop();
        observer.stop();
        assert_eq!(sim.page().observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_poll_catches_unobserved_changes() {
        let sim = Simulator::new();
        let extractor = Extractor::new(sim.page());
        let bus = EventBus::new();
        let mut observer = TrackObserver::start(extractor, bus.clone()).unwrap();
        // Detach every watch; only the poll is left.
        sim.unmount_shell().unwrap();
        sim.mount_shell().unwrap();
        assert!(!observer.is_attached());
        let mut rx = bus.subscribe();
        let page = sim.page();
        let title = Selector::parse(".action-title .trim span").unwrap();
        page.write(|doc| {
            let span = doc.query_selector(&title).unwrap();
            doc.set_text_content(span, "Renamed Live");
        })
        .unwrap();
        tokio::time::sleep(POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(matches!(rx.try_recv().unwrap(), PlayerEvent::TrackUpdated(s) if s.title == "Renamed Live"));
        observer.stop();
    }
}
