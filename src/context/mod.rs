//! Source context for stack frames.
//!
//! This module turns raw stack frames into enriched frames carrying the
//! source line they point at plus a symmetric window of surrounding lines,
//! reading each file at most once through a bounded cache.

pub mod cache;
pub mod enricher;

pub use cache::{file_cache, reset_file_cache, SourceCache, DEFAULT_CACHE_CAPACITY};
pub use enricher::{add_context_to_frame, ContextLines, DEFAULT_CONTEXT_LINES};
