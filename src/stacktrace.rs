//! Stack frame model and call trace capture.
//!
//! The interceptor captures a [`RawTrace`] at every fetch invocation. Capture is
//! deliberately unresolved (addresses only) so the hot path stays cheap; symbol
//! resolution into [`StackFrame`]s happens only when a failing call actually
//! needs the trace.

use serde::{Deserialize, Serialize};

/// A single frame of a call trace, in outbound-payload shape.
///
/// All fields are optional: synthetic or unresolvable frames carry only what
/// is known. The `context_line`, `pre_context`, and `post_context` fields are
/// filled in by [`ContextLines`](crate::context::ContextLines) when source for
/// the frame is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_context: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_context: Option<Vec<String>>,
}

/// An unresolved stack snapshot, cheap to capture and to carry across awaits.
#[derive(Debug)]
pub struct RawTrace {
    backtrace: backtrace::Backtrace,
}

/// A resolved call trace attached to a [`FetchError`](crate::net::FetchError).
///
/// `frames_to_pop` counts leading frames that belong to instrumentation
/// machinery rather than application code; renderers should discard that many
/// frames from the top.
#[derive(Debug, Clone, Default)]
pub struct CallTrace {
    pub frames: Vec<StackFrame>,
    pub frames_to_pop: usize,
}

/// Captures the current call stack without resolving symbols.
pub fn capture_raw() -> RawTrace {
    RawTrace {
        backtrace: backtrace::Backtrace::new_unresolved(),
    }
}

impl CallTrace {
    /// Resolves a raw snapshot into displayable frames.
    ///
    /// # Arguments
    ///
    /// * `raw` - The snapshot taken at the instrumented call site
    /// * `frames_to_pop` - Leading instrumentation frames a renderer should drop
    pub fn resolve(mut raw: RawTrace, frames_to_pop: usize) -> Self {
        raw.backtrace.resolve();

        let mut frames = Vec::new();
        for frame in raw.backtrace.frames() {
            for symbol in frame.symbols() {
                frames.push(StackFrame {
                    function: symbol.name().map(|name| name.to_string()),
                    filename: symbol
                        .filename()
                        .map(|path| path.to_string_lossy().into_owned()),
                    lineno: symbol.lineno(),
                    colno: symbol.colno(),
                    ..Default::default()
                });
            }
        }

        CallTrace {
            frames,
            frames_to_pop,
        }
    }

    /// The frames a renderer should show, with instrumentation frames dropped.
    pub fn visible_frames(&self) -> &[StackFrame] {
        let start = self.frames_to_pop.min(self.frames.len());
        &self.frames[start..]
    }
}
