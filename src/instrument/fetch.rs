//! Fetch interception and observation publishing.
//!
//! [`install_fetch_interceptor`] swaps the mounted fetch implementation for a
//! wrapper that publishes a [`FetchObservation`] at call start and at
//! settlement, while preserving the original calling contract exactly: same
//! arguments through, same response or error back.
//!
//! A second mode serves consumers that care about when a *streamed* body has
//! actually been read to its end, which can be long after the call itself
//! settles. When any body-resolved subscriber exists at call time, the
//! wrapper suppresses its own start and success-end observations and instead
//! tees the response body, drains the tee in a background task, and publishes
//! a single body-resolved observation once the stream completes or the
//! per-read deadline gives up on it. Failed calls are observed the same way
//! in both modes.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::instrument::registry::{registry, HandlerRegistry, InstrumentKind};
use crate::net::{
    parse_fetch_args, ChunkStream, Fetch, FetchArgs, FetchError, FetchSlot, Response,
};
use crate::stacktrace::{self, CallTrace};

/// Per-read deadline while draining a streamed body. A read that takes
/// longer counts as stream completion, not as an error.
pub const BODY_DRAIN_READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// One fact about an intercepted fetch call's lifecycle.
///
/// A call produces an unsettled observation at issuance and a settled one at
/// settlement; `end_timestamp_ms` is `None` iff the call has not settled. A
/// settled observation carries exactly one of `response` / `error`.
#[derive(Debug, Clone)]
pub struct FetchObservation {
    /// The original call arguments, untouched.
    pub args: FetchArgs,
    pub method: String,
    pub url: String,
    /// Milliseconds since the Unix epoch.
    pub start_timestamp_ms: f64,
    pub end_timestamp_ms: Option<f64>,
    pub response: Option<Response>,
    pub error: Option<FetchError>,
}

impl FetchObservation {
    /// An unsettled observation, as published when a call is issued.
    pub fn start(
        args: FetchArgs,
        method: impl Into<String>,
        url: impl Into<String>,
        start_timestamp_ms: f64,
    ) -> Self {
        FetchObservation {
            args,
            method: method.into(),
            url: url.into(),
            start_timestamp_ms,
            end_timestamp_ms: None,
            response: None,
            error: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.end_timestamp_ms.is_some()
    }

    fn settled_ok(&self, response: Response, end_timestamp_ms: f64) -> Self {
        FetchObservation {
            end_timestamp_ms: Some(end_timestamp_ms),
            response: Some(response),
            error: None,
            ..self.clone()
        }
    }

    fn settled_err(&self, error: FetchError, end_timestamp_ms: f64) -> Self {
        FetchObservation {
            end_timestamp_ms: Some(end_timestamp_ms),
            response: None,
            error: Some(error),
            ..self.clone()
        }
    }

    /// Human-readable one-liner for logs and demos.
    pub fn printable_summary(&self) -> String {
        let clock = format_clock(self.start_timestamp_ms);
        match (&self.response, &self.error) {
            (Some(response), _) => {
                let elapsed = self
                    .end_timestamp_ms
                    .map(|end| end - self.start_timestamp_ms)
                    .unwrap_or(0.0);
                format!(
                    "[{clock}] {} {} -> {} ({elapsed:.0}ms)",
                    self.method,
                    self.url,
                    response.status()
                )
            }
            (None, Some(error)) => {
                format!("[{clock}] {} {} failed: {error}", self.method, self.url)
            }
            (None, None) => format!("[{clock}] {} {} started", self.method, self.url),
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}

fn format_clock(timestamp_ms: f64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms as i64) {
        chrono::LocalResult::Single(datetime) => datetime.format("%H:%M:%S%.3f").to_string(),
        _ => format!("{timestamp_ms:.0}"),
    }
}

/// Subscribes `handler` to fetch start/settlement observations and makes
/// sure the process-wide fetch entry point is instrumented.
pub fn add_fetch_handler(handler: impl Fn(&FetchObservation) + Send + Sync + 'static) {
    let registry = registry();
    registry.subscribe(InstrumentKind::Fetch, handler);
    ensure_interception(crate::net::fetch_slot(), &registry, InstrumentKind::Fetch);
}

/// Subscribes `handler` to body-resolved observations and makes sure the
/// process-wide fetch entry point is instrumented.
pub fn add_fetch_body_resolved_handler(
    handler: impl Fn(&FetchObservation) + Send + Sync + 'static,
) {
    let registry = registry();
    registry.subscribe(InstrumentKind::FetchBodyResolved, handler);
    ensure_interception(
        crate::net::fetch_slot(),
        &registry,
        InstrumentKind::FetchBodyResolved,
    );
}

/// Installs the interceptor the first time `kind` subscribes, and re-arms it
/// whenever the slot holds an unintercepted backend. A backend mounted after
/// the first subscription, or mounted over an existing wrapper, is observed
/// again from the next subscription on.
fn ensure_interception(slot: &FetchSlot, registry: &Arc<HandlerRegistry>, kind: InstrumentKind) {
    registry.ensure_instrumented(kind, || install_fetch_interceptor(slot, registry));
    if !slot.is_empty() && !slot.is_intercepted() {
        install_fetch_interceptor(slot, registry);
    }
}

/// Wraps the implementation mounted in `slot` with the observing wrapper.
///
/// An empty slot means the environment has no fetch to observe; that is a
/// skip, not an error. A slot that is already intercepted keeps its single
/// wrapper layer no matter how many kinds request installation.
pub fn install_fetch_interceptor(slot: &FetchSlot, registry: &Arc<HandlerRegistry>) {
    let wrapper_registry = Arc::clone(registry);
    let installed = slot.intercept(move |original| {
        Arc::new(InterceptedFetch {
            original,
            registry: wrapper_registry,
        }) as Arc<dyn Fetch>
    });

    if installed {
        debug!("fetch interception installed");
    } else if slot.is_empty() {
        debug!("no fetch backend mounted; skipping fetch interception");
    } else {
        debug!("fetch already intercepted; keeping the existing wrapper");
    }
}

struct InterceptedFetch {
    original: Arc<dyn Fetch>,
    registry: Arc<HandlerRegistry>,
}

#[async_trait]
impl Fetch for InterceptedFetch {
    async fn fetch(&self, args: FetchArgs) -> Result<Response, FetchError> {
        let (method, url) = parse_fetch_args(&args);

        // Sampled once per call: a consumer subscribing mid-flight does not
        // flip this call's mode.
        let drain_active = self
            .registry
            .has_subscribers(InstrumentKind::FetchBodyResolved);

        // Captured now because the frames are gone by the time an async
        // failure surfaces. Resolution is deferred to the error path.
        let raw_trace = stacktrace::capture_raw();

        let observation =
            FetchObservation::start(args.clone(), method, url, current_timestamp_ms());

        if !drain_active {
            self.registry.publish(InstrumentKind::Fetch, &observation);
        }

        match self.original.fetch(args).await {
            Ok(response) => {
                if drain_active {
                    spawn_body_drain(
                        Arc::clone(&self.registry),
                        observation,
                        response.clone(),
                    );
                } else {
                    let settled =
                        observation.settled_ok(response.clone(), current_timestamp_ms());
                    self.registry.publish(InstrumentKind::Fetch, &settled);
                }
                Ok(response)
            }
            Err(error) => {
                let error = if error.has_trace() {
                    error
                } else {
                    error.with_trace(CallTrace::resolve(raw_trace, 1))
                };
                let settled = observation.settled_err(error.clone(), current_timestamp_ms());
                self.registry.publish(InstrumentKind::Fetch, &settled);
                Err(error)
            }
        }
    }
}

/// Tees the settled response and drains the tee in the background, then
/// publishes the body-resolved observation carrying the original response.
///
/// A response whose body cannot be teed (already consumed) is silently
/// skipped; drain completion is best-effort.
fn spawn_body_drain(
    registry: Arc<HandlerRegistry>,
    observation: FetchObservation,
    response: Response,
) {
    let reader = match response
        .try_clone()
        .and_then(|teed| teed.bytes_stream().ok())
    {
        Some(reader) => reader,
        None => {
            debug!(url = %observation.url, "response body unavailable; skipping body drain");
            return;
        }
    };

    tokio::spawn(async move {
        drain_reader(reader).await;
        let resolved = observation.settled_ok(response, current_timestamp_ms());
        registry.publish(InstrumentKind::FetchBodyResolved, &resolved);
    });
}

/// Reads chunks until the stream ends, a read errors, or a single read
/// outlives [`BODY_DRAIN_READ_TIMEOUT`]. All three count as completion.
async fn drain_reader(mut reader: ChunkStream) {
    loop {
        match timeout(BODY_DRAIN_READ_TIMEOUT, reader.next()).await {
            Ok(Some(Ok(_chunk))) => continue,
            Ok(Some(Err(error))) => {
                warn!(error = %error, "body drain read failed; treating body as resolved");
                return;
            }
            Ok(None) => return,
            Err(_elapsed) => {
                debug!("body drain read deadline elapsed; treating body as resolved");
                return;
            }
        }
    }
}
