//! Per-session publish/subscribe channel.
//!
//! Delivery is synchronous and in publish order: `publish` copies the event
//! into every live subscriber's mailbox and returns; subscribers drain their
//! mailbox when they settle. A `FilterChanged` is never delivered to the
//! subscription registered under the event's own origin.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::aggregate::AggregationKey;
use crate::predicate::PartialFilter;
use crate::row::Row;
use crate::view::{Selection, ViewKind};

/// Who issued a predicate update.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    View(ViewKind),
    /// Anything that is not one of the linked views, e.g. a scripted query.
    External(Arc<str>),
}

impl Origin {
    pub fn external(name: impl Into<Arc<str>>) -> Self {
        Origin::External(name.into())
    }
}

impl From<ViewKind> for Origin {
    fn from(view: ViewKind) -> Self {
        Origin::View(view)
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    DatasetChanged(Arc<[Row]>),
    /// Only the predicate kinds that changed.
    FilterChanged {
        origin: Origin,
        change: PartialFilter,
    },
    CounterChanged(AggregationKey),
    SelectionChanged {
        view: ViewKind,
        selection: Selection,
    },
}

impl Event {
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Event::FilterChanged { origin, .. } => Some(origin),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Event::DatasetChanged(_) => "dataset-changed",
            Event::FilterChanged { .. } => "filter-changed",
            Event::CounterChanged(_) => "counter-changed",
            Event::SelectionChanged { .. } => "selection-changed",
        }
    }
}

struct Mailbox {
    origin: Option<Origin>,
    queue: Mutex<VecDeque<Event>>,
}

#[derive(Default)]
struct Shared {
    mailboxes: Mutex<Vec<Weak<Mailbox>>>,
    closed: AtomicBool,
}

#[derive(Clone, Default)]
pub struct Relay {
    shared: Arc<Shared>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mailbox. Events published by `origin` skip it.
    pub fn subscribe(&self, origin: Option<Origin>) -> Subscription {
        let mailbox = Arc::new(Mailbox {
            origin,
            queue: Mutex::new(VecDeque::new()),
        });
        if !self.is_closed() {
            self.shared.mailboxes.lock().push(Arc::downgrade(&mailbox));
        }
        Subscription {
            mailbox,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns the number of mailboxes the event was delivered to.
    pub fn publish(&self, event: Event) -> usize {
        if self.is_closed() {
            trace!(event = event.name(), "relay closed, event dropped");
            return 0;
        }
        let mut mailboxes = self.shared.mailboxes.lock();
        mailboxes.retain(|mailbox| mailbox.strong_count() > 0);
        let mut delivered = 0;
        for mailbox in mailboxes.iter().filter_map(Weak::upgrade) {
            if mailbox.origin.is_some() && mailbox.origin.as_ref() == event.origin() {
                continue;
            }
            mailbox.queue.lock().push_back(event.clone());
            delivered += 1;
        }
        trace!(event = event.name(), delivered, "published");
        delivered
    }

    pub fn subscribers(&self) -> usize {
        self.shared
            .mailboxes
            .lock()
            .iter()
            .filter(|mailbox| mailbox.strong_count() > 0)
            .count()
    }

    /// Tear the channel down: pending events are discarded and later
    /// publishes are dropped.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mailboxes = std::mem::take(&mut *self.shared.mailboxes.lock());
        for mailbox in mailboxes.iter().filter_map(Weak::upgrade) {
            mailbox.queue.lock().clear();
        }
        debug!(subscribers = mailboxes.len(), "relay closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("subscribers", &self.subscribers())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A subscriber's end of the relay. Dropping it unsubscribes.
pub struct Subscription {
    mailbox: Arc<Mailbox>,
    shared: Arc<Shared>,
}

impl Subscription {
    pub fn origin(&self) -> Option<&Origin> {
        self.mailbox.origin.as_ref()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.mailbox.queue.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.mailbox.queue.lock().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.mailbox.queue.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("origin", &self.mailbox.origin)
            .field("pending", &self.pending())
            .finish()
    }
}
