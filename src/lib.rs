pub mod context;
pub mod error;
pub mod instrument;
pub mod net;
pub mod stacktrace;

pub use error::{FaultlineError, Result};

use std::sync::Arc;

/// Installs the default HTTP backend into the process-wide fetch slot.
///
/// Call once at SDK initialization, before subscribing handlers; the
/// instrumentation layer wraps whatever is mounted when the first handler
/// arrives.
pub fn init() {
    init_with_client(reqwest::Client::new());
}

/// Like [`init`], but reuses an existing [`reqwest::Client`] so the embedder
/// keeps its pool, proxy, and TLS configuration.
pub fn init_with_client(client: reqwest::Client) {
    net::set_fetch_backend(Arc::new(net::HttpFetch::with_client(client)));
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::context::{ContextLines, SourceCache};
    pub use crate::error::{FaultlineError, Result};
    pub use crate::instrument::{
        add_fetch_body_resolved_handler, add_fetch_handler, FetchObservation, HandlerRegistry,
        InstrumentKind,
    };
    pub use crate::net::{fetch, FetchArgs, FetchInit, FetchRequest, Response};
    pub use crate::stacktrace::{CallTrace, StackFrame};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The one test that exercises the process-wide slot and registry; all
    // other tests run against their own instances.
    #[tokio::test]
    async fn test_init_and_global_subscription_observe_a_fetch() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body("pong")
            .create_async()
            .await;

        init();
        assert!(net::fetch_slot().current().is_some());

        let observations = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&observations);
        instrument::add_fetch_handler(move |observation| {
            sink.lock().unwrap().push(observation.clone());
        });
        assert!(net::fetch_slot().is_intercepted());

        let response = net::fetch(net::FetchArgs::new(format!("{}/ping", server.url())))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "pong");

        let observations = observations.lock().unwrap();
        assert_eq!(observations.len(), 2);
        assert!(!observations[0].is_settled());
        assert!(observations[1].is_settled());
        assert_eq!(observations[1].method, "GET");
    }
}
