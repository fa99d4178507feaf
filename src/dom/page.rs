//! Shared, lock-guarded access to the host page plus mutation subscriptions.

use super::{Document, MutationKind, MutationRecord, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use tokio::sync::mpsc;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("page context is closed")]
    Closed,
    #[error("node {0} does not exist in the page")]
    UnknownNode(NodeId),
}

pub type ObserverId = u64;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Which kinds of change a subscription wants to hear about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    /// When non-empty, only these attribute names are reported.
    pub attribute_filter: Vec<String>,
    pub character_data: bool,
    pub subtree: bool,
}

impl ObserveOptions {
    /// Child-list changes anywhere under the scope.
    pub fn subtree_children() -> Self {
        Self { child_list: true, subtree: true, ..Self::default() }
    }

    pub fn with_attributes(mut self, filter: &[&str]) -> Self {
        self.attributes = true;
        self.attribute_filter = filter.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_character_data(mut self) -> Self {
        self.character_data = true;
        self
    }

    fn accepts(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::ChildList { .. } => self.child_list,
            MutationKind::CharacterData => self.character_data,
            MutationKind::Attribute { name } => {
                self.attributes
                    && (self.attribute_filter.is_empty()
                        || self.attribute_filter.iter().any(|f| f.eq_ignore_ascii_case(name)))
            }
        }
    }
}

/// A mutation record tagged with the subscription it was delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub observer: ObserverId,
    pub record: MutationRecord,
}

/// Where notifications for a subscription are delivered. Several
/// subscriptions may share one sink.
pub type MutationSink = mpsc::UnboundedSender<Notification>;

struct ObserverEntry {
    id: ObserverId,
    scope: NodeId,
    options: ObserveOptions,
    sink: MutationSink,
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    entries: Vec<ObserverEntry>,
}

impl ObserverRegistry {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn register(&mut self, scope: NodeId, options: ObserveOptions, sink: MutationSink) -> ObserverId {
        let id = NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed);
        self.entries.push(ObserverEntry { id, scope, options, sink });
        id
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Deliver `record` to every entry whose scope covers its target.
    /// Entries whose receiver has gone away are pruned.
    pub(crate) fn dispatch(&mut self, record: &MutationRecord, ancestors: &[NodeId]) {
        self.entries.retain(|entry| {
            if !entry.options.accepts(&record.kind) {
                return !entry.sink.is_closed();
            }
            let covered = entry.scope == record.target
                || (entry.options.subtree && ancestors.contains(&entry.scope));
            if !covered {
                return !entry.sink.is_closed();
            }
            entry
                .sink
                .send(Notification { observer: entry.id, record: record.clone() })
                .is_ok()
        });
    }
}

struct PageState {
    document: Document,
    closed: bool,
}

/// Cloneable handle to the host page. Every read or write holds the page lock
/// for its whole duration, so an extraction sees a single consistent snapshot.
#[derive(Clone)]
pub struct PageHandle {
    inner: Arc<Mutex<PageState>>,
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle").finish_non_exhaustive()
    }
}

fn lock(inner: &Mutex<PageState>) -> MutexGuard<'_, PageState> {
    // A panicking host handler must not take the mirror down with it.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PageHandle {
    pub fn new(mut document: Document) -> Self {
        document.collect_detached();
        Self { inner: Arc::new(Mutex::new(PageState { document, closed: false })) }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> Result<R, PageError> {
        let guard = lock(&self.inner);
        if guard.closed {
            return Err(PageError::Closed);
        }
        Ok(f(&guard.document))
    }

    /// Run `f` against the document. Subtrees left detached when `f`
    /// returns are reclaimed, so ids into them go stale.
    pub fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R, PageError> {
        let mut guard = lock(&self.inner);
        if guard.closed {
            return Err(PageError::Closed);
        }
        let out = f(&mut guard.document);
        guard.document.collect_detached();
        Ok(out)
    }

    /// Subscribe to mutations under `scope`. The returned token cancels the
    /// subscription.
    pub fn observe(
        &self,
        scope: NodeId,
        options: ObserveOptions,
        sink: MutationSink,
    ) -> Result<Subscription, PageError> {
        let id = self.write(|doc| {
            if !doc.contains(scope) {
                return Err(PageError::UnknownNode(scope));
            }
            Ok(doc.observers.register(scope, options, sink))
        })??;
        Ok(Subscription { id, page: Arc::downgrade(&self.inner), active: true })
    }

    /// Swap in a new document (a full page load). Existing subscriptions die
    /// with the old document.
    pub fn replace(&self, mut document: Document) {
        document.collect_detached();
        let mut guard = lock(&self.inner);
        guard.document = document;
        guard.closed = false;
    }

    /// Tear the page context down; every access fails until [`replace`].
    ///
    /// [`replace`]: PageHandle::replace
    pub fn close(&self) {
        let mut guard = lock(&self.inner);
        guard.closed = true;
        guard.document.observers = ObserverRegistry::default();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner).document.observer_count()
    }
}

/// Cancellation token for a mutation subscription.
#[derive(Debug)]
pub struct Subscription {
    id: ObserverId,
    page: Weak<Mutex<PageState>>,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Detach from the page. Safe to call more than once.
    pub fn cancel(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if let Some(inner) = self.page.upgrade() {
            lock(&inner).document.observers.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        let Some(inner) = self.page.upgrade() else {
            return;
        };
        // Never block in drop; a closed receiver is pruned on the next dispatch.
        match inner.try_lock() {
            Ok(mut guard) => {
                guard.document.observers.remove(self.id);
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().document.observers.remove(self.id);
            }
            Err(TryLockError::WouldBlock) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (PageHandle, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        let box_ = doc.append_element(body, "div", &[("class", "box")]);
        let leaf = doc.append_text(box_, "0:01");
        (PageHandle::new(doc), box_, leaf)
    }

    #[test]
    fn subtree_character_data_is_delivered() {
        let (page, box_, leaf) = page();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = page
            .observe(box_, ObserveOptions::subtree_children().with_character_data(), tx)
            .unwrap();
        page.write(|doc| doc.set_text_content(leaf, "0:02")).unwrap();
        let n = rx.try_recv().unwrap();
        assert_eq!(n.observer, sub.id());
        assert_eq!(n.record, MutationRecord { target: leaf, kind: MutationKind::CharacterData });
    }

    #[test]
    fn attribute_filter_limits_delivery() {
        let (page, box_, _) = page();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = page
            .observe(box_, ObserveOptions::default().with_attributes(&["class"]), tx)
            .unwrap();
        page.write(|doc| doc.set_attribute(box_, "style", "width: 3%")).unwrap();
        assert!(rx.try_recv().is_err());
        page.write(|doc| doc.set_attribute(box_, "class", "box active")).unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn cancel_is_idempotent_and_drops_registration() {
        let (page, box_, _) = page();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut sub = page.observe(box_, ObserveOptions::subtree_children(), tx).unwrap();
        assert_eq!(page.observer_count(), 1);
        sub.cancel();
        sub.cancel();
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn dropping_the_token_unregisters() {
        let (page, box_, _) = page();
        let (tx, _rx) = mpsc::unbounded_channel();
        drop(page.observe(box_, ObserveOptions::subtree_children(), tx).unwrap());
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn closed_page_rejects_access_until_replaced() {
        let (page, box_, _) = page();
        page.close();
        assert_eq!(page.read(|d| d.root()), Err(PageError::Closed));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(page.observe(box_, ObserveOptions::subtree_children(), tx).is_err());
        page.replace(Document::new());
        assert!(page.read(|d| d.root()).is_ok());
    }

    #[test]
    fn unknown_scope_is_an_error() {
        let (page, _, _) = page();
        let stale = page.write(|doc| doc.create_element("div", &[])).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = page.observe(stale, ObserveOptions::subtree_children(), tx).unwrap_err();
        assert_eq!(err, PageError::UnknownNode(stale));
    }

    #[test]
    fn removed_subtree_is_reclaimed_after_the_write() {
        let (page, box_, leaf) = page();
        let inspected = page
            .write(|doc| {
                doc.remove(box_);
                doc.text(leaf).map(str::to_string)
            })
            .unwrap();
        assert_eq!(inspected.as_deref(), Some("0:01"));
        let after = page.read(|doc| (doc.contains(box_), doc.text(leaf).map(str::to_string))).unwrap();
        assert_eq!(after, (false, None));
    }

    #[test]
    fn reused_slot_does_not_reach_old_subscriptions() {
        let (page, box_, _) = page();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = page
            .observe(box_, ObserveOptions::default().with_attributes(&["class"]), tx)
            .unwrap();
        page.write(|doc| doc.remove(box_)).unwrap();
        while rx.try_recv().is_ok() {}
        let fresh = page
            .write(|doc| {
                let body = doc.body();
                doc.append_element(body, "div", &[])
            })
            .unwrap();
        assert_ne!(fresh, box_);
        page.write(|doc| doc.set_attribute(fresh, "class", "box")).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
