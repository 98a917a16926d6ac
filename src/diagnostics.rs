//! Line-oriented sink for per-URL diagnostics
//!
//! The engine writes one line per outcome here. The sink is separate from the
//! process log: a failing sink is reported through `tracing` and otherwise
//! ignored, so it can never stall or abort probing.

use std::io::Write;
use std::sync::Mutex;
use tracing::error;

pub trait DiagnosticSink: Send + Sync {
    fn write_line(&self, line: &str) -> std::io::Result<()>;
}

/// Writes a line, logging instead of propagating a failure.
pub fn emit(sink: &dyn DiagnosticSink, line: &str) {
    if let Err(e) = sink.write_line(line) {
        error!("Failed to write diagnostic line: {}", e);
    }
}

/// Sink over any `Write`, serialized so concurrent lines never interleave.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> DiagnosticSink for WriterSink<W> {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn write_line(&self, _line: &str) -> std::io::Result<()> {
        Ok(())
    }
}
