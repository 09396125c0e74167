//! Fetch observation demonstration.
//!
//! This example shows the instrumentation core end to end:
//! - init() mounting the HTTP backend into the process-wide fetch slot
//! - add_fetch_handler observing call starts and settlements
//! - add_fetch_body_resolved_handler observing streamed-body completion
//! - stack capture plus source-context enrichment of the resulting frames
//!
//! # Running the example
//!
//! ```bash
//! cargo run --example observe_fetch
//! ```
//!
//! The example performs real HTTP requests against httpbin.org.

use faultline::context::ContextLines;
use faultline::instrument::{add_fetch_body_resolved_handler, add_fetch_handler};
use faultline::net::{fetch, FetchArgs};
use faultline::stacktrace::{capture_raw, CallTrace};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("{}", "=".repeat(80));
    println!("Fetch Observation Demonstration");
    println!("{}", "=".repeat(80));
    println!();

    // Mount the HTTP backend before anyone subscribes.
    faultline::init();

    // Phase 1: base-mode observations, one start and one settlement per call.
    add_fetch_handler(|observation| {
        println!("  observed: {}", observation.printable_summary());
    });

    println!("Fetching with a start/settlement observer:");
    let response = fetch(FetchArgs::new("https://httpbin.org/get")).await?;
    println!("  caller saw status {}", response.status());
    println!("  caller read {} body bytes", response.bytes().await?.len());
    println!();

    // Phase 2: a body-resolved observer switches subsequent calls to drain
    // mode; the base start/settlement pair goes quiet and one body-resolved
    // observation fires after the stream completes.
    add_fetch_body_resolved_handler(|observation| {
        println!("  body resolved: {}", observation.printable_summary());
    });

    println!("Fetching with a body-resolved observer:");
    let response = fetch(FetchArgs::new("https://httpbin.org/stream/5")).await?;
    println!("  caller saw status {}", response.status());
    println!("  caller read {} body bytes", response.bytes().await?.len());

    // The drain task publishes in the background; give it a moment.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    println!();

    // Phase 3: enrich a captured trace with source context from this file.
    println!("Enriching a captured call trace:");
    let mut trace = CallTrace::resolve(capture_raw(), 0);
    ContextLines::new(2).enrich(&mut trace.frames);

    let enriched = trace
        .frames
        .iter()
        .find(|frame| frame.context_line.is_some());
    match enriched {
        Some(frame) => {
            println!(
                "  {}:{}",
                frame.filename.as_deref().unwrap_or("<unknown>"),
                frame.lineno.unwrap_or(0)
            );
            for line in frame.pre_context.iter().flatten() {
                println!("    {line}");
            }
            println!("  > {}", frame.context_line.as_deref().unwrap_or(""));
            for line in frame.post_context.iter().flatten() {
                println!("    {line}");
            }
        }
        None => println!("  no frame had readable source (release build or stripped paths)"),
    }

    Ok(())
}
