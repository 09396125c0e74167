//! Instrumentation of the process-wide fetch entry point.
//!
//! This module observes every fetch call exactly once regardless of how many
//! independent consumers subscribe, and fans the resulting observations out
//! to all of them.
//!
//! # Architecture
//!
//! - **HandlerRegistry**: per-kind subscriber lists plus the install-once
//!   guard that keeps the native wrap from ever being applied twice
//! - **InstrumentKind**: the two observable categories, `Fetch` (start and
//!   settlement) and `FetchBodyResolved` (streamed body completion)
//! - **FetchObservation**: the record delivered to handlers over a call's
//!   lifecycle
//! - **install_fetch_interceptor**: swaps the mounted fetch implementation
//!   for the observing wrapper
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use faultline::instrument::add_fetch_handler;
//!
//! add_fetch_handler(|observation| {
//!     println!("{}", observation.printable_summary());
//! });
//!
//! // Every fetch performed through faultline::net::fetch from here on
//! // publishes a start and a settlement observation to the handler.
//! ```
//!
//! Consumers correlate the start and settlement observations of one call by
//! argument identity and timing; observations deliberately carry no
//! correlation id.

pub mod fetch;
pub mod registry;

pub use fetch::{
    add_fetch_body_resolved_handler, add_fetch_handler, current_timestamp_ms,
    install_fetch_interceptor, FetchObservation, BODY_DRAIN_READ_TIMEOUT,
};
pub use registry::{registry, FetchHandler, HandlerRegistry, InstrumentKind};
