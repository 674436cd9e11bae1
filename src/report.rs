//! User-facing output
//!
//! Everything the user is meant to read goes through a [`Reporter`] that
//! owns an explicit writer. Diagnostic logging stays on `tracing`.

use std::io::Write;
use std::sync::{Arc, Mutex};

pub struct Reporter {
    sink: Mutex<Box<dyn Write + Send>>,
    quiet: bool,
}

impl Reporter {
    pub fn new(sink: Box<dyn Write + Send>, quiet: bool) -> Self {
        Self {
            sink: Mutex::new(sink),
            quiet,
        }
    }

    pub fn stdout(quiet: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), quiet)
    }

    /// Reporter writing into a buffer, for tests and embedding
    pub fn buffered(quiet: bool) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::new(Box::new(buffer.clone()), quiet), buffer)
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn write_line(&self, line: &str) {
        let mut sink = match self.sink.lock() {
            Ok(sink) => sink,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(sink, "{line}").and_then(|_| sink.flush()) {
            tracing::debug!("Failed to write output: {}", e);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.write_line(message);
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.write_line(&format!("⚠ {message}"));
        }
    }

    /// Errors are printed even in quiet mode
    pub fn error(&self, message: &str) {
        self.write_line(&format!("✖ {message}"));
    }

    /// Task output collected during the run; kept in quiet mode when it explains a failure
    pub fn output(&self, text: &str, failed: bool) {
        if failed || !self.quiet {
            self.write_line(text);
        }
    }

    pub fn started(&self, title: &str) {
        self.info(&format!("[STARTED] {title}"));
    }

    pub fn completed(&self, title: &str) {
        self.info(&format!("[COMPLETED] {title}"));
    }

    pub fn skipped(&self, title: &str, reason: &str) {
        self.info(&format!("[SKIPPED] {title}: {reason}"));
    }

    pub fn failed(&self, title: &str) {
        self.info(&format!("[FAILED] {title}"));
    }
}

/// Cloneable in-memory writer
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = match self.inner.lock() {
            Ok(bytes) => bytes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.inner.lock() {
            Ok(mut bytes) => bytes.extend_from_slice(buf),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_suppresses_info_but_not_errors() {
        let (reporter, buffer) = Reporter::buffered(true);

        reporter.info("hello");
        reporter.warn("careful");
        reporter.started("Running tasks");
        reporter.error("boom");

        assert_eq!(buffer.contents(), "✖ boom\n");
    }

    #[test]
    fn test_phase_lines() {
        let (reporter, buffer) = Reporter::buffered(false);

        reporter.started("Preparing");
        reporter.skipped("Applying modifications", "Skipped because of errors from tasks.");

        let output = buffer.contents();
        assert!(output.contains("[STARTED] Preparing\n"));
        assert!(output.contains(
            "[SKIPPED] Applying modifications: Skipped because of errors from tasks.\n"
        ));
    }
}
