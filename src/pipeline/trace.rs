use std::path::{Path, PathBuf};

use anyhow::Context;

/// Dumps what each chunk sent and received, one file per chunk and stage.
pub struct TraceWriter {
    dir: PathBuf,
    enabled: bool,
}

impl TraceWriter {
    pub fn new(dir: PathBuf, enabled: bool) -> anyhow::Result<Self> {
        if enabled {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create trace dir: {}", dir.display()))?;
        }
        Ok(Self { dir, enabled })
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_named_text(&self, name: &str, text: &str) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.dir.join(sanitize_filename(name));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }

    /// `<doc>.chunk_<start>-<end>.<kind>.txt`
    pub fn write_chunk_text(
        &self,
        doc: &str,
        start: usize,
        end: usize,
        kind: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let name = format!("{doc}.chunk_{start:06}-{end:06}.{kind}.txt");
        self.write_named_text(&name, text)
    }
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_chunk_files_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let trace_dir = dir.path().join("_trace");
        let t = TraceWriter::new(trace_dir.clone(), true).unwrap();
        t.write_chunk_text("report", 0, 25, "source", "Hello").unwrap();
        let written = std::fs::read_to_string(trace_dir.join("report.chunk_000000-000025.source.txt")).unwrap();
        assert_eq!(written, "Hello");

        let off = TraceWriter::disabled();
        off.write_chunk_text("x", 0, 1, "raw", "y").unwrap();
        assert!(!off.is_enabled());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_filename("a/b:c?.txt"), "a_b_c_.txt");
    }
}
