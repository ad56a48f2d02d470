use std::io::{self, Write};
use std::time::Instant;

/// Per-chunk progress sink: `(processed, total)` paragraphs, called after each chunk
/// has been written back.
pub type ProgressFn<'a> = &'a dyn Fn(usize, usize);

/// Progress sink that ignores every update.
pub fn no_progress(_processed: usize, _total: usize) {}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", msg.as_ref());
    }

    pub fn progress(&self, label: &str, current: usize, total: usize) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let line = format_progress(label, current, total);
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {line}");
    }

    /// Adapts this reporter to the per-chunk callback shape.
    pub fn reporter<'a>(&'a self, label: &'a str) -> impl Fn(usize, usize) + 'a {
        move |current, total| self.progress(label, current, total)
    }
}

fn format_progress(label: &str, current: usize, total: usize) -> String {
    if total == 0 {
        return format!("{label} 0/0 (100.0%)");
    }
    let current = current.min(total);
    let pct = (current as f64 / total as f64) * 100.0;
    format!("{label} {current}/{total} ({pct:5.1}%)")
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{fmt_elapsed, format_progress};

    #[test]
    fn progress_line_clamps_and_handles_empty_total() {
        assert_eq!(format_progress("doc", 30, 25), "doc 25/25 (100.0%)");
        assert_eq!(format_progress("doc", 5, 20), "doc 5/20 ( 25.0%)");
        assert_eq!(format_progress("doc", 0, 0), "doc 0/0 (100.0%)");
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(fmt_elapsed(65.4), "01:05");
        assert_eq!(fmt_elapsed(3723.0), "01:02:03");
    }
}
