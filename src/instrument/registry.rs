//! Subscriber lists and the install-once guard, per instrument kind.
//!
//! The registry is what lets any number of independent consumers observe one
//! underlying interception: subscriptions accumulate here, while
//! [`HandlerRegistry::ensure_instrumented`] guarantees the actual wrap of the
//! native operation happens at most once per kind for the process lifetime.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::warn;

use crate::instrument::fetch::FetchObservation;

/// Observable operation categories.
///
/// Each kind has its own subscriber list and its own installed flag;
/// instrumenting one kind never gates another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Start and settlement of an intercepted fetch call.
    Fetch,
    /// Completion of a streamed response body, observed after settlement.
    FetchBodyResolved,
}

/// Callback receiving observations for one instrument kind.
pub type FetchHandler = Arc<dyn Fn(&FetchObservation) + Send + Sync>;

/// Fan-out point between the interceptor and its consumers.
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<InstrumentKind, Vec<FetchHandler>>>,
    instrumented: Mutex<HashSet<InstrumentKind>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: Mutex::new(HashMap::new()),
            instrumented: Mutex::new(HashSet::new()),
        }
    }

    /// Appends a handler to the subscriber list for `kind`.
    ///
    /// Handlers are never deduplicated; subscribing the same function twice
    /// yields two distinct subscriptions. There is no unsubscribe.
    pub fn subscribe(
        &self,
        kind: InstrumentKind,
        handler: impl Fn(&FetchObservation) + Send + Sync + 'static,
    ) {
        self.subscribe_arc(kind, Arc::new(handler));
    }

    /// Appends an already-shared handler, allowing one closure to back
    /// several subscriptions.
    pub fn subscribe_arc(&self, kind: InstrumentKind, handler: FetchHandler) {
        self.handlers
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(handler);
    }

    pub fn has_subscribers(&self, kind: InstrumentKind) -> bool {
        self.subscriber_count(kind) > 0
    }

    pub fn subscriber_count(&self, kind: InstrumentKind) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Runs `install` the first time it is called for `kind`; later calls
    /// for the same kind are no-ops. The flag is set before `install` runs.
    pub fn ensure_instrumented(&self, kind: InstrumentKind, install: impl FnOnce()) {
        {
            let mut instrumented = self.instrumented.lock().unwrap();
            if !instrumented.insert(kind) {
                return;
            }
        }
        install();
    }

    pub fn is_instrumented(&self, kind: InstrumentKind) -> bool {
        self.instrumented.lock().unwrap().contains(&kind)
    }

    /// Delivers `observation` to every handler currently subscribed for
    /// `kind`, in subscription order.
    ///
    /// Iteration runs over a snapshot taken under the lock, so a handler
    /// subscribing mid-publish does not receive the in-flight observation.
    /// A panicking handler is logged and skipped; the rest still run, and
    /// nothing unwinds into the instrumented call site.
    pub fn publish(&self, kind: InstrumentKind, observation: &FetchObservation) {
        let snapshot = {
            let handlers = self.handlers.lock().unwrap();
            match handlers.get(&kind) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(observation))).is_err() {
                warn!(
                    kind = ?kind,
                    "instrumentation handler panicked; remaining handlers still run"
                );
            }
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/// The process-wide registry used by the subscription API.
pub fn registry() -> Arc<HandlerRegistry> {
    Arc::clone(REGISTRY.get_or_init(|| Arc::new(HandlerRegistry::new())))
}
