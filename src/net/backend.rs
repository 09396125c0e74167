//! The pluggable fetch entry point.
//!
//! [`FetchSlot`] is the process-wide mount point for the current [`Fetch`]
//! implementation. The SDK installs [`HttpFetch`] here at initialization;
//! the instrumentation layer later swaps the slot's contents for a wrapper
//! around whatever it found. An empty slot means the environment has no
//! fetch to observe.

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use tracing::warn;

use crate::error::FaultlineError;
use crate::net::request::{parse_fetch_args, FetchArgs};
use crate::net::response::Response;
use crate::stacktrace::CallTrace;

/// Error returned by fetch paths, carrying the captured call trace when one
/// has been backfilled.
///
/// Cheap to clone so the same failure can be both observed and re-thrown.
#[derive(Debug, Clone)]
pub struct FetchError {
    kind: Arc<FaultlineError>,
    trace: Option<Arc<CallTrace>>,
}

impl FetchError {
    pub fn new(kind: FaultlineError) -> Self {
        FetchError {
            kind: Arc::new(kind),
            trace: None,
        }
    }

    pub fn kind(&self) -> &FaultlineError {
        &self.kind
    }

    pub fn has_trace(&self) -> bool {
        self.trace.is_some()
    }

    pub fn trace(&self) -> Option<&CallTrace> {
        self.trace.as_deref()
    }

    /// Attaches a call trace. Callers wanting backfill semantics must check
    /// [`has_trace`](Self::has_trace) first; this overwrites.
    pub fn with_trace(mut self, trace: CallTrace) -> Self {
        self.trace = Some(Arc::new(trace));
        self
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.kind.as_ref())
    }
}

impl From<FaultlineError> for FetchError {
    fn from(kind: FaultlineError) -> Self {
        FetchError::new(kind)
    }
}

/// A fetch implementation.
///
/// Implementations must not observe or publish anything themselves; the
/// instrumentation wrapper handles that uniformly for whatever sits in the
/// slot.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs the call described by `args`.
    ///
    /// # Arguments
    ///
    /// * `args` - The original, unmodified call arguments
    ///
    /// # Returns
    ///
    /// The response, or a [`FetchError`] that the caller sees unchanged.
    async fn fetch(&self, args: FetchArgs) -> Result<Response, FetchError>;
}

struct SlotState {
    backend: Option<Arc<dyn Fetch>>,
    intercepted: bool,
}

/// Mount point holding the current fetch implementation.
pub struct FetchSlot {
    state: RwLock<SlotState>,
}

impl FetchSlot {
    pub fn new() -> Self {
        FetchSlot {
            state: RwLock::new(SlotState {
                backend: None,
                intercepted: false,
            }),
        }
    }

    /// Installs a backend, replacing whatever was mounted. Any previously
    /// installed interception layer is discarded along with it; the next
    /// subscription re-arms it.
    pub fn install(&self, backend: Arc<dyn Fetch>) {
        let mut state = self.state.write().unwrap();
        if state.intercepted {
            warn!("replacing an intercepted fetch backend; interception is discarded");
        }
        state.backend = Some(backend);
        state.intercepted = false;
    }

    /// The currently mounted implementation, if any.
    pub fn current(&self) -> Option<Arc<dyn Fetch>> {
        self.state.read().unwrap().backend.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().backend.is_none()
    }

    pub fn is_intercepted(&self) -> bool {
        self.state.read().unwrap().intercepted
    }

    /// Wraps the mounted implementation exactly once.
    ///
    /// Returns `false` without calling `wrap` when the slot is empty or a
    /// wrapper is already installed, so repeated instrumentation requests
    /// never stack a second layer.
    pub fn intercept(&self, wrap: impl FnOnce(Arc<dyn Fetch>) -> Arc<dyn Fetch>) -> bool {
        let mut state = self.state.write().unwrap();
        if state.intercepted {
            return false;
        }
        let original = match state.backend.take() {
            Some(backend) => backend,
            None => return false,
        };
        state.backend = Some(wrap(original));
        state.intercepted = true;
        true
    }
}

impl Default for FetchSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP backend over a shared [`reqwest::Client`].
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new() -> Self {
        HttpFetch {
            client: reqwest::Client::new(),
        }
    }

    /// Uses an existing client, preserving its pool, proxy, and TLS setup.
    pub fn with_client(client: reqwest::Client) -> Self {
        HttpFetch { client }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, args: FetchArgs) -> Result<Response, FetchError> {
        let (method, url) = parse_fetch_args(&args);
        if url.is_empty() {
            return Err(FaultlineError::InvalidRequest("empty URL".to_string()).into());
        }
        let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| {
            FetchError::new(FaultlineError::InvalidRequest(format!(
                "unsupported method: {method}"
            )))
        })?;

        let mut request = self.client.request(method, url.as_str());
        if let Some(init) = &args.init {
            for (name, value) in &init.headers {
                request = request.header(name, value);
            }
            if let Some(body) = &init.body {
                request = request.body(body.clone());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|error| FetchError::new(error.into()))?;
        Ok(Response::from_reqwest(response))
    }
}

static FETCH_SLOT: OnceLock<FetchSlot> = OnceLock::new();

/// The process-wide fetch slot.
pub fn fetch_slot() -> &'static FetchSlot {
    FETCH_SLOT.get_or_init(FetchSlot::new)
}

/// Mounts `backend` as the process-wide fetch implementation.
pub fn set_fetch_backend(backend: Arc<dyn Fetch>) {
    fetch_slot().install(backend);
}

/// Performs a fetch through the process-wide slot.
pub async fn fetch(args: FetchArgs) -> Result<Response, FetchError> {
    fetch_with(fetch_slot(), args).await
}

/// Performs a fetch through a specific slot.
pub async fn fetch_with(slot: &FetchSlot, args: FetchArgs) -> Result<Response, FetchError> {
    let backend = slot
        .current()
        .ok_or_else(|| FetchError::new(FaultlineError::NoFetchBackend))?;
    backend.fetch(args).await
}
