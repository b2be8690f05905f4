//! Debug log sink.
//!
//! Every log record becomes one line on a diagnostic stream:
//!
//! ```text
//! [feedtree] WARNING (dnd.rs:42): Dragged item cannot cross accounts
//! ```
//!
//! The sink writes synchronously and never buffers or retries. A fatal
//! record terminates the process once its line is written.
//!
//! [`DebugLayer`] plugs the sink into `tracing_subscriber`. Tracing has no
//! fatal level, so an ERROR event carrying `fatal = true` is treated as one.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::APP_LOW_NAME;

/// Exit status used after a fatal record.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Warning,
    Critical,
    Fatal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Debug => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_tracing(level: Level, fatal: bool) -> Self {
        match level {
            Level::ERROR if fatal => Severity::Fatal,
            Level::ERROR => Severity::Critical,
            Level::WARN => Severity::Warning,
            _ => Severity::Debug,
        }
    }
}

/// Formats one sink line. Only the last component of `file` is kept.
pub fn format_line(severity: Severity, file: &str, line: u32, message: &str) -> String {
    let file = file.rsplit(['/', '\\']).next().unwrap_or(file);
    format!(
        "[{}] {} ({}:{}): {}\n",
        APP_LOW_NAME,
        severity.label(),
        file,
        line,
        message
    )
}

/// Line-oriented sink over any writer.
pub struct DebugSink {
    writer: Mutex<Box<dyn Write + Send>>,
    exit: fn(i32) -> !,
}

impl DebugSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            exit: std::process::exit,
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Replaces the process exit used for fatal records.
    pub fn with_exit(mut self, exit: fn(i32) -> !) -> Self {
        self.exit = exit;
        self
    }

    /// Writes the record; on [`Severity::Fatal`] then exits with
    /// [`EXIT_FAILURE`].
    pub fn handle(&self, severity: Severity, file: &str, line: u32, message: &str) {
        let formatted = format_line(severity, file, line, message);
        {
            let mut writer = self
                .writer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Nowhere left to report a failing diagnostic stream.
            let _ = writer.write_all(formatted.as_bytes());
            let _ = writer.flush();
        }

        if severity == Severity::Fatal {
            (self.exit)(EXIT_FAILURE);
        }
    }
}

impl fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugSink").finish_non_exhaustive()
    }
}

/// `tracing_subscriber` layer that routes every event through a [`DebugSink`].
#[derive(Debug)]
pub struct DebugLayer {
    sink: DebugSink,
}

impl DebugLayer {
    pub fn new(sink: DebugSink) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for DebugLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.sink.handle(
            Severity::from_tracing(*metadata.level(), visitor.fatal),
            metadata.file().unwrap_or("unknown"),
            metadata.line().unwrap_or(0),
            &visitor.into_message(),
        );
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<String>,
    fatal: bool,
}

impl EventVisitor {
    fn into_message(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        format!("{} {}", self.message, self.fields.join(" "))
    }
}

impl Visit for EventVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "fatal" {
            self.fatal = value;
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn fake_exit(code: i32) -> ! {
        panic!("exit({code})");
    }

    #[test]
    fn test_format_line_keeps_file_name_only() {
        let line = format_line(Severity::Warning, "src/model/dnd.rs", 42, "cross account");
        assert_eq!(line, "[feedtree] WARNING (dnd.rs:42): cross account\n");

        let line = format_line(Severity::Debug, r"C:\src\main.rs", 7, "hi");
        assert_eq!(line, "[feedtree] INFO (main.rs:7): hi\n");
    }

    #[test]
    fn test_sink_writes_each_severity() {
        let buffer = SharedBuffer::default();
        let sink = DebugSink::new(Box::new(buffer.clone())).with_exit(fake_exit);
        sink.handle(Severity::Debug, "a.rs", 1, "one");
        sink.handle(Severity::Critical, "b.rs", 2, "two");

        assert_eq!(
            buffer.contents(),
            "[feedtree] INFO (a.rs:1): one\n[feedtree] CRITICAL (b.rs:2): two\n"
        );
    }

    #[test]
    #[should_panic(expected = "exit(1)")]
    fn test_fatal_terminates_after_writing() {
        let sink = DebugSink::new(Box::new(std::io::sink())).with_exit(fake_exit);
        sink.handle(Severity::Fatal, "main.rs", 1, "boom");
    }

    #[test]
    fn test_layer_maps_tracing_levels() {
        let buffer = SharedBuffer::default();
        let layer = DebugLayer::new(DebugSink::new(Box::new(buffer.clone())).with_exit(fake_exit));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("quiet");
            tracing::warn!(items = 3, "loud");
            tracing::error!("broken");
        });

        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[feedtree] INFO (debugging.rs:"));
        assert!(lines[0].ends_with("): quiet"));
        assert!(lines[1].contains("WARNING"));
        assert!(lines[1].ends_with("): loud items=3"));
        assert!(lines[2].contains("CRITICAL"));
    }

    #[test]
    #[should_panic(expected = "exit(1)")]
    fn test_layer_fatal_field_terminates() {
        let layer = DebugLayer::new(DebugSink::new(Box::new(std::io::sink())).with_exit(fake_exit));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(fatal = true, "cannot continue");
        });
    }
}
