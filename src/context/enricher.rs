//! In-place enrichment of stack frames with surrounding source lines.

use std::sync::Arc;

use crate::context::cache::{file_cache, SourceCache};
use crate::stacktrace::StackFrame;

/// Default number of source lines captured on each side of the target line.
pub const DEFAULT_CONTEXT_LINES: usize = 7;

/// Adds `context_line`, `pre_context`, and `post_context` to stack frames.
///
/// Source text comes through a [`SourceCache`], so frames referencing the
/// same file share one read, within a frame set and across them. A window of
/// 0 disables enrichment entirely and performs zero reads.
pub struct ContextLines {
    context_lines: usize,
    cache: Arc<SourceCache>,
}

impl ContextLines {
    /// An enricher with the given window size, backed by the process-wide
    /// source cache.
    pub fn new(context_lines: usize) -> Self {
        ContextLines {
            context_lines,
            cache: file_cache(),
        }
    }

    /// Swaps in a dedicated cache. Embedders running independent sessions
    /// use this to keep their reads isolated.
    pub fn with_cache(mut self, cache: Arc<SourceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Enriches every frame that carries both a filename and a line number.
    ///
    /// Frames are independent: an unreadable file skips its own frames and
    /// nothing else.
    pub fn enrich(&self, frames: &mut [StackFrame]) {
        if self.context_lines == 0 {
            return;
        }

        for frame in frames.iter_mut() {
            let filename = match (&frame.filename, frame.lineno) {
                (Some(filename), Some(_)) => filename.clone(),
                _ => continue,
            };

            if let Some(lines) = self.cache.get_lines(&filename) {
                add_context_to_frame(&lines, frame, self.context_lines);
            }
        }
    }
}

impl Default for ContextLines {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LINES)
    }
}

/// Fills a frame's context fields from already-split source lines.
///
/// The frame's 1-indexed line number is clamped into the file's bounds, then
/// up to `context_lines` lines are taken on each side, clipped at the file
/// boundaries. A frame without a line number is left untouched.
pub fn add_context_to_frame(lines: &[String], frame: &mut StackFrame, context_lines: usize) {
    let lineno = match frame.lineno {
        Some(lineno) => lineno as usize,
        None => return,
    };
    if lines.is_empty() {
        return;
    }

    let source_index = lineno.saturating_sub(1).min(lines.len() - 1);

    let pre_start = source_index.saturating_sub(context_lines);
    frame.pre_context = Some(lines[pre_start..source_index].to_vec());

    frame.context_line = Some(lines[source_index].clone());

    let post_start = (source_index + 1).min(lines.len());
    let post_end = (source_index + 1 + context_lines).min(lines.len());
    frame.post_context = Some(lines[post_start..post_end].to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_numbered_lines(dir: &TempDir, name: &str, count: usize) -> PathBuf {
        let path = dir.path().join(name);
        let contents: String = (1..=count).map(|i| format!("line {i}\n")).collect();
        fs::write(&path, contents).unwrap();
        path
    }

    fn frame_at(path: &Path, lineno: u32) -> StackFrame {
        StackFrame {
            filename: Some(path.to_string_lossy().into_owned()),
            lineno: Some(lineno),
            ..Default::default()
        }
    }

    fn isolated(context_lines: usize) -> (ContextLines, Arc<SourceCache>) {
        let cache = Arc::new(SourceCache::new());
        let enricher = ContextLines::new(context_lines).with_cache(Arc::clone(&cache));
        (enricher, cache)
    }

    #[test]
    fn test_window_of_seven_fills_both_sides() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_numbered_lines(&temp_dir, "app.rs", 20);
        let (enricher, _cache) = isolated(7);

        let mut frames = vec![frame_at(&path, 10)];
        enricher.enrich(&mut frames);

        let frame = &frames[0];
        assert_eq!(frame.context_line.as_deref(), Some("line 10"));

        let pre = frame.pre_context.as_ref().unwrap();
        assert_eq!(pre.len(), 7);
        assert_eq!(pre.first().map(String::as_str), Some("line 3"));
        assert_eq!(pre.last().map(String::as_str), Some("line 9"));

        let post = frame.post_context.as_ref().unwrap();
        assert_eq!(post.len(), 7);
        assert_eq!(post.first().map(String::as_str), Some("line 11"));
        assert_eq!(post.last().map(String::as_str), Some("line 17"));
    }

    #[test]
    fn test_first_line_has_empty_pre_context() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_numbered_lines(&temp_dir, "app.rs", 10);
        let (enricher, _cache) = isolated(7);

        let mut frames = vec![frame_at(&path, 1)];
        enricher.enrich(&mut frames);

        let frame = &frames[0];
        assert_eq!(frame.context_line.as_deref(), Some("line 1"));
        assert!(frame.pre_context.as_ref().unwrap().is_empty());
        assert_eq!(frame.post_context.as_ref().unwrap().len(), 7);
    }

    #[test]
    fn test_line_beyond_eof_clamps_to_last_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_numbered_lines(&temp_dir, "app.rs", 5);
        let (enricher, _cache) = isolated(7);

        let mut frames = vec![frame_at(&path, 999)];
        enricher.enrich(&mut frames);

        let frame = &frames[0];
        assert_eq!(frame.context_line.as_deref(), Some("line 5"));
        assert!(frame.post_context.as_ref().unwrap().is_empty());
        assert_eq!(frame.pre_context.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_frame_without_lineno_reads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_numbered_lines(&temp_dir, "app.rs", 10);
        let (enricher, cache) = isolated(7);

        let mut frames = vec![StackFrame {
            filename: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        }];
        enricher.enrich(&mut frames);

        assert_eq!(cache.file_read_count(), 0);
        assert!(frames[0].context_line.is_none());
    }

    #[test]
    fn test_window_zero_is_a_noop_with_zero_reads() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_numbered_lines(&temp_dir, "app.rs", 10);
        let (enricher, cache) = isolated(0);

        let mut frames = vec![frame_at(&path, 3), frame_at(&path, 5)];
        enricher.enrich(&mut frames);

        assert_eq!(cache.file_read_count(), 0);
        assert!(frames.iter().all(|frame| frame.context_line.is_none()));
    }

    #[test]
    fn test_frames_sharing_a_file_share_one_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_numbered_lines(&temp_dir, "app.rs", 10);
        let (enricher, cache) = isolated(2);

        let mut frames = vec![frame_at(&path, 2), frame_at(&path, 8)];
        enricher.enrich(&mut frames);

        assert_eq!(cache.file_read_count(), 1);
        assert_eq!(frames[0].context_line.as_deref(), Some("line 2"));
        assert_eq!(frames[1].context_line.as_deref(), Some("line 8"));
    }

    #[test]
    fn test_unreadable_file_skips_only_its_frames() {
        let temp_dir = TempDir::new().unwrap();
        let readable = write_numbered_lines(&temp_dir, "app.rs", 10);
        let missing = temp_dir.path().join("missing.rs");
        let (enricher, cache) = isolated(3);

        let mut frames = vec![frame_at(&missing, 4), frame_at(&readable, 4)];
        enricher.enrich(&mut frames);

        assert!(frames[0].context_line.is_none());
        assert_eq!(frames[1].context_line.as_deref(), Some("line 4"));
        assert_eq!(cache.file_read_count(), 2);
    }

    #[test]
    fn test_add_context_without_lineno_is_untouched() {
        let lines = vec!["only line".to_string()];
        let mut frame = StackFrame::default();

        add_context_to_frame(&lines, &mut frame, 7);

        assert!(frame.context_line.is_none());
        assert!(frame.pre_context.is_none());
        assert!(frame.post_context.is_none());
    }
}
