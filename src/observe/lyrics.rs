//! On-demand lyrics observation.
//!
//! While active, two watches exist: one on the lyrics panel itself (line
//! highlight changes) and one on the whole body (the panel being mounted or
//! unmounted). Both, plus the driving task, are torn down by
//! [`LyricsObserver::stop`].

use super::diff::LyricsDeduper;
use crate::dom::{MutationKind, Notification, NodeId, ObserveOptions, PageError, Subscription};
use crate::event::{EventBus, PlayerEvent};
use crate::extractor::Extractor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

pub const ATTACH_ATTEMPTS: u32 = 10;
pub const ATTACH_RETRY: Duration = Duration::from_secs(1);
pub const REMOUNT_SETTLE: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Watches {
    panel: Option<(NodeId, Subscription)>,
    body: Option<Subscription>,
    dedup: LyricsDeduper,
    identity: Option<(String, String)>,
}

impl Watches {
    fn count(&self) -> usize {
        usize::from(self.panel.is_some()) + usize::from(self.body.is_some())
    }

    fn clear(&mut self) {
        if let Some((_, mut sub)) = self.panel.take() {
            sub.cancel();
        }
        if let Some(mut sub) = self.body.take() {
            sub.cancel();
        }
    }
}

fn lock(watches: &Mutex<Watches>) -> MutexGuard<'_, Watches> {
    watches.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LyricsObserver {
    extractor: Extractor,
    bus: EventBus,
    watches: Arc<Mutex<Watches>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LyricsObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyricsObserver")
            .field("active", &self.is_active())
            .field("observers", &self.active_observer_count())
            .finish()
    }
}

impl LyricsObserver {
    pub fn new(extractor: Extractor, bus: EventBus) -> Self {
        Self { extractor, bus, watches: Arc::default(), task: None }
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Live watches plus the driving task. Zero when stopped.
    pub fn active_observer_count(&self) -> usize {
        let task = self.task.as_ref().is_some_and(|t| !t.is_finished());
        lock(&self.watches).count() + usize::from(task)
    }

    /// Start observing. Emits the current lyrics immediately (even when
    /// there are none). A second call while active is a no-op.
    pub fn start(&mut self) -> Result<(), PageError> {
        if self.is_active() {
            return Ok(());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let body = self.extractor.page().read(|doc| doc.body())?;
        let body_sub = self.extractor.page().observe(body, ObserveOptions::subtree_children(), tx.clone())?;
        {
            let mut watches = lock(&self.watches);
            watches.clear();
            watches.body = Some(body_sub);
            watches.dedup.reset();
            watches.identity = self.bus.latest_track().map(|t| (t.title, t.artist));
        }
        let ctx = Context {
            extractor: self.extractor.clone(),
            bus: self.bus.clone(),
            watches: self.watches.clone(),
            tx,
        };
        let attached = ctx.attach_panel();
        ctx.emit(true);
        let bus_rx = self.bus.subscribe();
        self.task = Some(tokio::spawn(ctx.run(rx, bus_rx, attached)));
        tracing::debug!(attached, "Lyrics observing started");
        Ok(())
    }

    /// Detach everything. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Lyrics observing stopped");
        }
        lock(&self.watches).clear();
    }
}

impl Drop for LyricsObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Context {
    extractor: Extractor,
    bus: EventBus,
    watches: Arc<Mutex<Watches>>,
    tx: mpsc::UnboundedSender<Notification>,
}

impl Context {
    /// (Re)attach the panel watch to whatever panel is mounted now.
    fn attach_panel(&self) -> bool {
        let page = self.extractor.page();
        let reader = self.extractor.lyrics_reader();
        let target = page.read(|doc| reader.observe_target(doc)).ok().flatten();
        let mut watches = lock(&self.watches);
        if let Some((_, mut old)) = watches.panel.take() {
            old.cancel();
        }
        let Some(target) = target else {
            return false;
        };
        let options = ObserveOptions::subtree_children()
            .with_attributes(&["class"])
            .with_character_data();
        match page.observe(target, options, self.tx.clone()) {
            Ok(sub) => {
                watches.panel = Some((target, sub));
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Lyrics panel watch failed");
                false
            }
        }
    }

    /// Publish the current lyrics if the resolved line changed (or `force`).
    fn emit(&self, force: bool) {
        let lyrics = self.extractor.get_lyrics();
        {
            let mut watches = lock(&self.watches);
            if force {
                watches.dedup.reset();
            }
            if !watches.dedup.admit(lyrics.as_ref()) {
                return;
            }
        }
        self.bus.publish(PlayerEvent::LyricsUpdated(lyrics));
    }

    /// Whether the mounted panel differs from the watched one.
    fn panel_moved(&self) -> bool {
        let reader = self.extractor.lyrics_reader();
        let current = self.extractor.page().read(|doc| reader.observe_target(doc)).ok().flatten();
        let watched = lock(&self.watches).panel.as_ref().map(|(node, _)| *node);
        current != watched
    }

    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<Notification>,
        mut bus_rx: broadcast::Receiver<PlayerEvent>,
        attached: bool,
    ) {
        let body_id = lock(&self.watches).body.as_ref().map(Subscription::id);
        let mut attempts_left = if attached { 0 } else { ATTACH_ATTEMPTS - 1 };
        let mut remount: Option<tokio::time::Instant> = None;
        let retry = tokio::time::sleep(ATTACH_RETRY);
        tokio::pin!(retry);

        loop {
            tokio::select! {
                notification = rx.recv() => {
                    let Some(first) = notification else { break };
                    let mut panel_changed = false;
                    let mut structure_changed = false;
                    for n in std::iter::once(first).chain(std::iter::from_fn(|| rx.try_recv().ok())) {
                        if Some(n.observer) == body_id {
                            structure_changed |= matches!(n.record.kind, MutationKind::ChildList { .. });
                        } else {
                            panel_changed = true;
                        }
                    }
                    if structure_changed && remount.is_none() && self.panel_moved() {
                        tracing::debug!("Lyrics panel mounted or unmounted");
                        remount = Some(tokio::time::Instant::now() + REMOUNT_SETTLE);
                    }
                    if panel_changed && remount.is_none() {
                        self.emit(false);
                    }
                }
                _ = &mut retry, if attempts_left > 0 => {
                    attempts_left -= 1;
                    if self.attach_panel() {
                        tracing::debug!("Lyrics panel attached after retry");
                        attempts_left = 0;
                        self.emit(true);
                    } else if attempts_left > 0 {
                        retry.as_mut().reset(tokio::time::Instant::now() + ATTACH_RETRY);
                    } else {
                        tracing::debug!("Lyrics panel never appeared");
                    }
                }
                _ = async {
                    match remount {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => futures_util::future::pending::<()>().await,
                    }
                } => {
                    remount = None;
                    attempts_left = 0;
                    self.attach_panel();
                    self.emit(true);
                }
                event = bus_rx.recv() => match event {
                    Ok(PlayerEvent::TrackUpdated(track)) => {
                        let identity = (track.title, track.artist);
                        let changed = {
                            let mut watches = lock(&self.watches);
                            let changed = watches.identity.as_ref() != Some(&identity);
                            watches.identity = Some(identity);
                            changed
                        };
                        if changed {
                            self.emit(true);
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, PageHandle};
    use crate::simulator::Simulator;

    fn lyrics_events(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<Option<String>> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PlayerEvent::LyricsUpdated(l) = event {
                out.push(l.and_then(|l| l.current_line_text));
            }
        }
        out
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_detaches_everything_and_restart_reattaches_one_set() {
        let sim = Simulator::new();
        let page = sim.page();
        let extractor = Extractor::new(page.clone());
        let mut observer = LyricsObserver::new(extractor, EventBus::new());
        observer.start().unwrap();
        observer.start().unwrap();
        assert_eq!(observer.active_observer_count(), 3);
        assert_eq!(page.observer_count(), 2);

        observer.stop();
        observer.stop();
        settle().await;
        assert_eq!(observer.active_observer_count(), 0);
        assert_eq!(page.observer_count(), 0);

        observer.start().unwrap();
        assert_eq!(observer.active_observer_count(), 3);
        assert_eq!(page.observer_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_only_when_the_highlighted_line_changes() {
        let sim = Simulator::new();
        let extractor = Extractor::new(sim.page());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut observer = LyricsObserver::new(extractor.clone(), bus);
        observer.start().unwrap();
        assert_eq!(lyrics_events(&mut rx), [Some("Lights along the water".to_string())]);

        extractor.toggle_play_pause();
        sim.advance(5.0).unwrap();
        settle().await;
        assert!(lyrics_events(&mut rx).is_empty());

        sim.advance(35.0).unwrap();
        settle().await;
        assert_eq!(lyrics_events(&mut rx), [Some("Every window humming low".to_string())]);
        observer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn late_panel_is_attached_by_retry() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_element(root, "body", &[]);
        let page = PageHandle::new(doc);
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut observer = LyricsObserver::new(Extractor::new(page.clone()), bus);
        observer.start().unwrap();
        assert_eq!(lyrics_events(&mut rx), [None]);
        assert_eq!(observer.active_observer_count(), 2);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        page.write(|doc| {
            let mini = doc.create_element("div", &[("class", "mini-lyrics")]);
            let lyrics = doc.append_element(mini, "div", &[("class", "lyrics")]);
            let line = doc.append_element(lyrics, "span", &[("class", "highlighted")]);
            doc.append_text(line, "Hello again");
            // Mounted without a body mutation the watch would see.
            doc.append_child(root, mini);
        })
        .unwrap();
        tokio::time::sleep(ATTACH_RETRY).await;
        assert_eq!(observer.active_observer_count(), 3);
        assert_eq!(lyrics_events(&mut rx), [Some("Hello again".to_string())]);
        observer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn remounted_panel_is_rewatched_after_settling() {
        let sim = Simulator::new();
        let extractor = Extractor::new(sim.page());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut observer = LyricsObserver::new(extractor.clone(), bus);
        observer.start().unwrap();
        lyrics_events(&mut rx);

        // The next demo track has no lyrics: the panel unmounts.
        extractor.next_track();
        settle().await;
        assert!(lyrics_events(&mut rx).is_empty());
        tokio::time::sleep(REMOUNT_SETTLE).await;
        assert_eq!(lyrics_events(&mut rx), [None]);
        assert_eq!(observer.active_observer_count(), 2);

        // The one after mounts a fresh panel.
        extractor.next_track();
        tokio::time::sleep(REMOUNT_SETTLE + Duration::from_millis(10)).await;
        assert_eq!(lyrics_events(&mut rx), [Some("Count the mile markers".to_string())]);
        assert_eq!(observer.active_observer_count(), 3);
        observer.stop();
    }
}
