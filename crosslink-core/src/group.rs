//! Link Groups
//!
//! A link group is the scope that ties widgets together: every consumer
//! attached to the same group shares one selection and one set of filter
//! sources. Groups are looked up by name in a [`Session`](crate::Session)
//! and handed to consumers explicitly.
//!
//! # Mutation Protocol
//!
//! 1. Every mutation carries its origin and a sequence number. Local
//!    mutations get the next sequence from the group; wire messages bring
//!    their own.
//!
//! 2. A mutation is applied only if its sequence is strictly greater than the
//!    last one applied to the group. Older ones are discarded without
//!    notification (last writer wins by sequence, not by arrival).
//!
//! 3. Applied mutations change state immediately, so a read right after
//!    always sees them. Delivery is deferred: every other consumer and every
//!    observer watching that kind gets a pending entry in a debounced queue.
//!    The originating consumer never gets an echo of its own change; if it
//!    already had a pending entry for another member's change, that entry is
//!    kept and moved to the new sequence, so it sees the merged state once.
//!
//! 4. [`LinkGroup::flush`] delivers due entries outside the group lock,
//!    building each payload from the state at delivery time.

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::bridge::debounce::Debouncer;
use crate::bridge::{ChangeKind, ConsumerHandle, MutationMessage, NotificationMessage, Origin};
use crate::config::LinkConfig;
use crate::key::RowKey;
use crate::reactive::{Observer, ObserverId};
use crate::state::{FilterState, SelectionState};

/// Receives state changes made by other members of a group.
///
/// Both callbacks default to doing nothing; override the ones you need, or
/// override [`Consumer::notify`] to get the full wire message.
pub trait Consumer: Send + Sync {
    /// The selection changed. `keys` is empty when `active` is false.
    fn on_selection_changed(&self, _group: &str, _keys: &[RowKey], _active: bool) {}

    /// The effective visible set changed. `None` means every row is visible.
    fn on_filter_changed(&self, _group: &str, _keys: Option<&[RowKey]>) {}

    fn notify(&self, message: &NotificationMessage) {
        match message.kind {
            ChangeKind::Selection => self.on_selection_changed(
                &message.group_id,
                message.keys.as_deref().unwrap_or(&[]),
                message.active.unwrap_or(false),
            ),
            ChangeKind::Filter => {
                self.on_filter_changed(&message.group_id, message.keys.as_deref())
            }
        }
    }
}

/// Why a mutation was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// The sequence number was not newer than the last applied one.
    StaleSequence { sequence: u64, last_applied: u64 },
    /// The consumer was detached before its mutation arrived.
    DetachedConsumer { handle: ConsumerHandle },
    /// The owning session has ended.
    GroupClosed,
}

/// Result of a mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied { sequence: u64 },
    Discarded(Discard),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }
}

/// A due notification, ready to hand to its recipient.
pub enum Delivery {
    Consumer {
        consumer: Arc<dyn Consumer>,
        message: NotificationMessage,
    },
    Observer(Observer),
}

impl Delivery {
    pub fn deliver(self) {
        match self {
            Delivery::Consumer { consumer, message } => consumer.notify(&message),
            Delivery::Observer(observer) => observer.execute(),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Consumer { message, .. } => {
                f.debug_struct("Consumer").field("message", message).finish()
            }
            Delivery::Observer(observer) => f.debug_tuple("Observer").field(observer).finish(),
        }
    }
}

struct GroupInner {
    selection: SelectionState,
    filter: FilterState,
    consumers: IndexMap<ConsumerHandle, Arc<dyn Consumer>>,
    observers: IndexMap<ObserverId, (ChangeKind, Observer)>,
    issued: u64,
    last_applied: u64,
    outbound: Debouncer<(ConsumerHandle, ChangeKind)>,
    observer_queue: Debouncer<ObserverId>,
    wake: Arc<Notify>,
    closed: bool,
}

impl GroupInner {
    fn allocate_sequence(&mut self) -> u64 {
        self.issued = self.issued.max(self.last_applied) + 1;
        self.issued
    }

    /// Queue delivery of a change to everyone except `origin`.
    fn fan_out(&mut self, origin: Origin, kind: ChangeKind, sequence: u64, now: Instant) {
        let handles: SmallVec<[ConsumerHandle; 8]> = self.consumers.keys().copied().collect();
        for handle in handles {
            if origin == Origin::Consumer(handle) {
                // A pending entry for the originator covers another member's
                // change. Keep it so the merged state reaches it once.
                self.outbound.reschedule(&(handle, kind), now, sequence);
            } else {
                self.outbound.schedule((handle, kind), now, sequence, origin);
            }
        }
        for (id, (watched, _)) in &self.observers {
            if *watched == kind {
                self.observer_queue.schedule(*id, now, sequence, origin);
            }
        }
        self.wake.notify_one();
    }

    fn notification(&self, group: &str, kind: ChangeKind, sequence: u64, origin: Origin) -> NotificationMessage {
        let (keys, active) = match kind {
            ChangeKind::Selection => (self.selection.to_wire(), Some(self.selection.is_active())),
            ChangeKind::Filter => (self.filter.visible().map(|v| v.into_iter().collect()), None),
        };
        NotificationMessage {
            group_id: group.to_string(),
            kind,
            source_id: origin,
            sequence,
            keys,
            active,
        }
    }
}

/// Named scope binding one selection, its filter sources, and the attached
/// consumers and observers.
pub struct LinkGroup {
    name: String,
    config: LinkConfig,
    inner: Mutex<GroupInner>,
}

impl LinkGroup {
    pub fn new(name: impl Into<String>, config: &LinkConfig) -> Self {
        Self::with_wake(name, config, Arc::new(Notify::new()))
    }

    /// Create a group that signals `wake` whenever a delivery is queued.
    pub fn with_wake(name: impl Into<String>, config: &LinkConfig, wake: Arc<Notify>) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
            inner: Mutex::new(GroupInner {
                selection: SelectionState::new(),
                filter: FilterState::new(),
                consumers: IndexMap::new(),
                observers: IndexMap::new(),
                issued: 0,
                last_applied: 0,
                outbound: Debouncer::new(config.notify_delay(), config.max_wait()),
                observer_queue: Debouncer::new(config.observer_debounce(), config.max_wait()),
                wake,
                closed: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Register a consumer for notifications.
    pub fn attach(&self, consumer: Arc<dyn Consumer>) -> ConsumerHandle {
        let handle = ConsumerHandle::next();
        let mut inner = self.inner.lock();
        if inner.closed {
            tracing::warn!(group = %self.name, %handle, "attach to closed group ignored");
            return handle;
        }
        inner.consumers.insert(handle, consumer);
        tracing::debug!(group = %self.name, %handle, "consumer attached");
        handle
    }

    /// Remove a consumer, its pending notifications, and its filter source.
    ///
    /// Returns `false` if the handle was not attached.
    pub fn detach(&self, handle: ConsumerHandle) -> bool {
        self.detach_at(handle, Instant::now())
    }

    pub fn detach_at(&self, handle: ConsumerHandle, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.consumers.shift_remove(&handle).is_none() {
            return false;
        }
        inner.outbound.cancel_where(|(h, _)| *h == handle);

        let origin = Origin::Consumer(handle);
        if inner.filter.unregister_source(origin) {
            // Remaining members see the visible set widen.
            let sequence = inner.allocate_sequence();
            inner.last_applied = sequence;
            inner.fan_out(origin, ChangeKind::Filter, sequence, now);
        }
        tracing::debug!(group = %self.name, %handle, "consumer detached");
        true
    }

    pub fn is_attached(&self, handle: ConsumerHandle) -> bool {
        self.inner.lock().consumers.contains_key(&handle)
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.lock().consumers.len()
    }

    /// Re-run `observer` (debounced) whenever state of `kind` changes.
    pub fn observe(&self, kind: ChangeKind, observer: Observer) -> ObserverId {
        let id = observer.id();
        self.inner.lock().observers.insert(id, (kind, observer));
        id
    }

    /// Stop re-running an observer and drop its pending run.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.lock();
        inner.observer_queue.cancel(&id);
        inner.observers.shift_remove(&id).is_some()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Allocate the next sequence number, for callers that stamp their own
    /// wire messages.
    pub fn next_sequence(&self) -> u64 {
        self.inner.lock().allocate_sequence()
    }

    pub fn last_applied(&self) -> u64 {
        self.inner.lock().last_applied
    }

    /// Replace (`Some`) or clear (`None`) the selection on behalf of a consumer.
    pub fn mutate_selection(&self, handle: ConsumerHandle, keys: Option<Vec<RowKey>>) -> MutationOutcome {
        self.apply_local(handle.into(), ChangeKind::Selection, Instant::now(), |_| keys)
    }

    /// Toggle one key in the selection on behalf of a consumer.
    pub fn toggle_selection(&self, handle: ConsumerHandle, key: RowKey) -> MutationOutcome {
        self.apply_local(handle.into(), ChangeKind::Selection, Instant::now(), |inner| {
            let mut next = inner.selection.clone();
            next.toggle(key);
            next.to_wire()
        })
    }

    /// Set (`Some`) or stop (`None`) a consumer's filter contribution.
    ///
    /// The consumer's filter source is registered on first use.
    pub fn mutate_filter(&self, handle: ConsumerHandle, keys: Option<Vec<RowKey>>) -> MutationOutcome {
        self.apply_local(handle.into(), ChangeKind::Filter, Instant::now(), |_| keys)
    }

    /// Toggle one key in a consumer's filter contribution.
    pub fn toggle_filter(&self, handle: ConsumerHandle, key: RowKey) -> MutationOutcome {
        let origin = Origin::Consumer(handle);
        self.apply_local(origin, ChangeKind::Filter, Instant::now(), |inner| {
            let mut next = inner.filter.clone();
            next.toggle(origin, key);
            next.get(origin).map(|keys| keys.iter().cloned().collect())
        })
    }

    /// Register a filter source that has not filtered anything yet.
    pub fn register_filter_source(&self, source: Origin) -> bool {
        self.inner.lock().filter.register_source(source)
    }

    /// Remove a filter source, notifying members if the visible set changed.
    pub fn unregister_filter_source(&self, source: Origin) -> bool {
        let mut inner = self.inner.lock();
        if !inner.filter.is_registered(source) {
            return false;
        }
        if inner.filter.unregister_source(source) {
            let sequence = inner.allocate_sequence();
            inner.last_applied = sequence;
            inner.fan_out(source, ChangeKind::Filter, sequence, Instant::now());
        }
        true
    }

    /// Write the selection from the server side.
    pub fn server_set_selection(&self, keys: Option<Vec<RowKey>>) -> MutationOutcome {
        self.apply_local(Origin::Server, ChangeKind::Selection, Instant::now(), |_| keys)
    }

    /// Write the server's filter contribution.
    pub fn server_set_filter(&self, keys: Option<Vec<RowKey>>) -> MutationOutcome {
        self.apply_local(Origin::Server, ChangeKind::Filter, Instant::now(), |_| keys)
    }

    /// Apply a decoded wire message. The group id is not re-checked here.
    pub fn apply_message(&self, message: MutationMessage, now: Instant) -> MutationOutcome {
        let mut inner = self.inner.lock();
        self.apply_locked(
            &mut inner,
            message.source_id,
            message.kind,
            message.sequence,
            message.keys,
            now,
        )
    }

    fn apply_local<F>(&self, origin: Origin, kind: ChangeKind, now: Instant, keys: F) -> MutationOutcome
    where
        F: FnOnce(&GroupInner) -> Option<Vec<RowKey>>,
    {
        let mut inner = self.inner.lock();
        if let Some(discard) = self.check_origin(&inner, origin) {
            return MutationOutcome::Discarded(discard);
        }
        let keys = keys(&*inner);
        let sequence = inner.allocate_sequence();
        self.apply_locked(&mut inner, origin, kind, sequence, keys, now)
    }

    fn check_origin(&self, inner: &GroupInner, origin: Origin) -> Option<Discard> {
        if inner.closed {
            tracing::debug!(group = %self.name, %origin, "mutation on closed group ignored");
            return Some(Discard::GroupClosed);
        }
        if let Origin::Consumer(handle) = origin {
            if !inner.consumers.contains_key(&handle) {
                tracing::warn!(
                    group = %self.name,
                    %handle,
                    "mutation from detached consumer ignored"
                );
                return Some(Discard::DetachedConsumer { handle });
            }
        }
        None
    }

    fn apply_locked(
        &self,
        inner: &mut GroupInner,
        origin: Origin,
        kind: ChangeKind,
        sequence: u64,
        keys: Option<Vec<RowKey>>,
        now: Instant,
    ) -> MutationOutcome {
        if let Some(discard) = self.check_origin(inner, origin) {
            return MutationOutcome::Discarded(discard);
        }
        if sequence <= inner.last_applied {
            tracing::debug!(
                group = %self.name,
                %origin,
                %kind,
                sequence,
                last_applied = inner.last_applied,
                "stale mutation discarded"
            );
            return MutationOutcome::Discarded(Discard::StaleSequence {
                sequence,
                last_applied: inner.last_applied,
            });
        }

        match kind {
            ChangeKind::Selection => inner.selection.apply(keys),
            ChangeKind::Filter => inner.filter.apply(origin, keys),
        }
        inner.last_applied = sequence;
        inner.issued = inner.issued.max(sequence);
        inner.fan_out(origin, kind, sequence, now);

        tracing::debug!(group = %self.name, %origin, %kind, sequence, "mutation applied");
        MutationOutcome::Applied { sequence }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn selection(&self) -> SelectionState {
        self.inner.lock().selection.clone()
    }

    pub fn filter(&self) -> FilterState {
        self.inner.lock().filter.clone()
    }

    /// Effective visible keys, `None` when unfiltered.
    pub fn visible(&self) -> Option<IndexSet<RowKey>> {
        self.inner.lock().filter.visible()
    }

    /// Borrow both states under one lock.
    pub fn with_state<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&SelectionState, &FilterState) -> R,
    {
        let inner = self.inner.lock();
        f(&inner.selection, &inner.filter)
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    /// Remove and build every delivery due at `now`.
    pub fn take_due(&self, now: Instant) -> Vec<Delivery> {
        let mut inner = self.inner.lock();
        let mut deliveries = Vec::new();

        for ((handle, kind), pending) in inner.outbound.take_due(now) {
            let Some(consumer) = inner.consumers.get(&handle).cloned() else {
                continue;
            };
            let message = inner.notification(&self.name, kind, pending.sequence, pending.origin);
            tracing::trace!(group = %self.name, %handle, %kind, sequence = pending.sequence, "notify consumer");
            deliveries.push(Delivery::Consumer { consumer, message });
        }

        for (id, pending) in inner.observer_queue.take_due(now) {
            if let Some((_, observer)) = inner.observers.get(&id) {
                tracing::trace!(group = %self.name, sequence = pending.sequence, "re-run observer");
                deliveries.push(Delivery::Observer(observer.clone()));
            }
        }
        deliveries
    }

    /// Deliver everything due at `now`. Returns the number of deliveries.
    pub fn flush(&self, now: Instant) -> usize {
        let deliveries = self.take_due(now);
        let count = deliveries.len();
        for delivery in deliveries {
            delivery.deliver();
        }
        count
    }

    /// When the next pending delivery becomes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        let inner = self.inner.lock();
        match (inner.outbound.next_deadline(), inner.observer_queue.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// End the group: detach everyone and drop pending deliveries.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.consumers.clear();
        inner.observers.clear();
        inner.outbound.clear();
        inner.observer_queue.clear();
        tracing::debug!(group = %self.name, "link group closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl fmt::Debug for LinkGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LinkGroup")
            .field("name", &self.name)
            .field("consumers", &inner.consumers.len())
            .field("observers", &inner.observers.len())
            .field("last_applied", &inner.last_applied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<NotificationMessage>>,
    }

    impl Consumer for Recorder {
        fn notify(&self, message: &NotificationMessage) {
            self.seen.lock().push(message.clone());
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<NotificationMessage> {
            std::mem::take(&mut *self.seen.lock())
        }
    }

    fn keys(ks: &[&str]) -> Vec<RowKey> {
        ks.iter().map(|k| RowKey::from(*k)).collect()
    }

    fn group() -> LinkGroup {
        LinkGroup::new("g", &LinkConfig::default())
    }

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn originator_gets_no_echo() {
        let group = group();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let ha = group.attach(a.clone());
        group.attach(b.clone());

        let outcome = group.mutate_selection(ha, Some(keys(&["k1", "k3"])));
        assert!(outcome.is_applied());
        group.flush(later());

        assert!(a.take().is_empty());
        let seen = b.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].keys, Some(keys(&["k1", "k3"])));
        assert_eq!(seen[0].active, Some(true));
        assert_eq!(seen[0].source_id, Origin::Consumer(ha));
    }

    #[test]
    fn originator_still_sees_pending_filter_from_others() {
        let group = group();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let ha = group.attach(a.clone());
        let hb = group.attach(b.clone());

        group.mutate_filter(hb, Some(keys(&["k1", "k2", "k3"])));
        group.mutate_filter(ha, Some(keys(&["k2", "k3", "k4"])));
        group.flush(later());

        let to_a = a.take();
        assert_eq!(to_a.len(), 1);
        assert_eq!(to_a[0].keys, Some(keys(&["k2", "k3"])));
        assert_eq!(to_a[0].source_id, Origin::Consumer(hb));
        assert_eq!(to_a[0].sequence, 2);

        let to_b = b.take();
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].keys, Some(keys(&["k2", "k3"])));
    }

    #[test]
    fn toggle_after_server_write_delivers_merged_selection() {
        let group = group();
        let a = Arc::new(Recorder::default());
        let ha = group.attach(a.clone());

        group.server_set_selection(Some(keys(&["x"])));
        group.toggle_selection(ha, RowKey::from("y"));
        group.flush(later());

        let seen = a.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].keys, Some(keys(&["x", "y"])));
        assert_eq!(seen[0].active, Some(true));
        assert_eq!(seen[0].source_id, Origin::Server);
    }

    #[test]
    fn own_writes_alone_are_never_echoed() {
        let group = group();
        let a = Arc::new(Recorder::default());
        let ha = group.attach(a.clone());
        group.attach(Arc::new(Recorder::default()));

        group.mutate_filter(ha, Some(keys(&["k1"])));
        group.toggle_selection(ha, RowKey::from("k1"));
        group.flush(later());
        assert!(a.take().is_empty());
    }

    #[test]
    fn rapid_mutations_coalesce_to_latest() {
        let group = group();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let ha = group.attach(a.clone());
        group.attach(b.clone());

        group.mutate_selection(ha, Some(keys(&["x"])));
        group.mutate_selection(ha, Some(keys(&["y"])));
        group.mutate_selection(ha, Some(keys(&["z"])));
        group.flush(later());

        let seen = b.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].keys, Some(keys(&["z"])));
        assert_eq!(seen[0].sequence, 3);
    }

    #[test]
    fn stale_wire_message_is_discarded() {
        let group = group();
        let b = Arc::new(Recorder::default());
        let ha = group.attach(Arc::new(Recorder::default()));
        group.attach(b.clone());

        let message = |sequence| MutationMessage {
            group_id: "g".into(),
            kind: ChangeKind::Selection,
            source_id: Origin::Consumer(ha),
            sequence,
            keys: Some(keys(&["a"])),
        };
        assert!(group.apply_message(message(5), Instant::now()).is_applied());
        group.flush(later());
        b.take();

        let outcome = group.apply_message(message(4), Instant::now());
        assert_eq!(
            outcome,
            MutationOutcome::Discarded(Discard::StaleSequence { sequence: 4, last_applied: 5 })
        );
        assert_eq!(group.flush(later()), 0);
        assert!(b.take().is_empty());
    }

    #[test]
    fn detached_consumer_mutation_is_a_noop() {
        let group = group();
        let ha = group.attach(Arc::new(Recorder::default()));
        assert!(group.detach(ha));
        assert!(!group.detach(ha));
        assert_eq!(
            group.mutate_selection(ha, Some(keys(&["a"]))),
            MutationOutcome::Discarded(Discard::DetachedConsumer { handle: ha })
        );
        assert!(!group.selection().is_active());
    }

    #[test]
    fn detach_cancels_pending_notification() {
        let group = group();
        let b = Arc::new(Recorder::default());
        let ha = group.attach(Arc::new(Recorder::default()));
        let hb = group.attach(b.clone());

        group.mutate_selection(ha, Some(keys(&["a"])));
        group.detach(hb);
        group.flush(later());
        assert!(b.take().is_empty());
    }

    #[test]
    fn detach_unregisters_filter_and_notifies_others() {
        let group = group();
        let b = Arc::new(Recorder::default());
        let ha = group.attach(Arc::new(Recorder::default()));
        group.attach(b.clone());

        group.mutate_filter(ha, Some(keys(&["a", "b"])));
        group.flush(later());
        assert_eq!(b.take()[0].keys, Some(keys(&["a", "b"])));

        group.detach(ha);
        assert!(group.visible().is_none());
        group.flush(later());
        let seen = b.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, ChangeKind::Filter);
        assert!(seen[0].keys.is_none());
    }

    #[test]
    fn server_writes_reach_every_consumer() {
        let group = group();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        group.attach(a.clone());
        group.attach(b.clone());

        group.server_set_selection(Some(keys(&["s"])));
        group.flush(later());
        assert_eq!(a.take()[0].source_id, Origin::Server);
        assert_eq!(b.take().len(), 1);
    }

    #[test]
    fn toggle_builds_on_current_selection() {
        let group = group();
        let ha = group.attach(Arc::new(Recorder::default()));
        group.toggle_selection(ha, RowKey::from("a"));
        group.toggle_selection(ha, RowKey::from("b"));
        group.toggle_selection(ha, RowKey::from("a"));
        let selection = group.selection();
        assert!(selection.contains(&RowKey::from("b")));
        assert!(!selection.contains(&RowKey::from("a")));
    }

    #[test]
    fn observers_are_debounced() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let group = group();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let observer = Observer::new_lazy(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        group.observe(ChangeKind::Selection, observer);

        let start = Instant::now();
        group.server_set_selection(Some(keys(&["a"])));
        group.server_set_selection(Some(keys(&["b"])));
        group.server_set_filter(Some(keys(&["b"])));

        assert_eq!(group.flush(start + Duration::from_millis(10)), 0);
        assert_eq!(group.flush(start + Duration::from_millis(400)), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_group_rejects_mutations() {
        let group = group();
        group.close();
        assert_eq!(
            group.server_set_selection(None),
            MutationOutcome::Discarded(Discard::GroupClosed)
        );
        assert!(group.is_closed());
    }
}
