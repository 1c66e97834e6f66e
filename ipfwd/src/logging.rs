//! A small `tracing` subscriber that prints one line per event.
//!
//! Lines look like `DEBUG ipfwd::router: handled frame iface=if0 verdict=TimeExceeded`. Spans are
//! given ids but otherwise ignored; the engine only emits events.

use std::fmt::{self, Debug, Write as _};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::event::Event;
use tracing::field::{Field, Visit};
use tracing::{span, Id, Level, Metadata, Subscriber};

pub struct StderrSubscriber<W = io::Stderr> {
    ids: AtomicUsize,
    max_level: Level,
    writer: Mutex<W>,
}

impl StderrSubscriber {
    pub fn new(max_level: Level) -> Self {
        StderrSubscriber::with_writer(max_level, io::stderr())
    }
}

impl<W: Write> StderrSubscriber<W> {
    pub fn with_writer(max_level: Level, writer: W) -> Self {
        StderrSubscriber {
            ids: AtomicUsize::new(1),
            max_level,
            writer: Mutex::new(writer),
        }
    }
}

/// INFO by default, DEBUG with one `-v`, TRACE with more.
pub fn level_for_verbosity(occurrences: u64) -> Level {
    match occurrences {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn verbosity(level: &Level) -> u8 {
    if *level == Level::ERROR {
        0
    } else if *level == Level::WARN {
        1
    } else if *level == Level::INFO {
        2
    } else if *level == Level::DEBUG {
        3
    } else {
        4
    }
}

impl<W: Write + Send + 'static> Subscriber for StderrSubscriber<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        verbosity(metadata.level()) <= verbosity(&self.max_level)
    }

    fn new_span(&self, _span: &span::Attributes) -> Id {
        let id = self.ids.fetch_add(1, Ordering::SeqCst);
        Id::from_u64(id as u64)
    }

    fn record(&self, _span: &Id, _values: &span::Record) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let level = metadata.level().to_string();
        if let Ok(mut writer) = self.writer.lock() {
            // Nowhere left to report a failed log write.
            let _ = writeln!(
                writer,
                "{:>5} {}: {}{}",
                level,
                metadata.target(),
                visitor.message,
                visitor.fields
            );
        }
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        let written: fmt::Result = if field.name() == "message" {
            write!(self.message, "{:?}", value)
        } else {
            write!(self.fields, " {}={:?}", field.name(), value)
        };
        debug_assert!(written.is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing::{debug, info, warn};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn prints_enabled_events() {
        let buffer = SharedBuffer::default();
        let subscriber = StderrSubscriber::with_writer(Level::INFO, buffer.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(next_hop = %"10.0.0.2", flushed = 3, "resolved");
            debug!("not shown at INFO");
            warn!("queue full");
        });

        assert_eq!(
            buffer.contents(),
            " INFO ipfwd::logging::tests: resolved next_hop=10.0.0.2 flushed=3\n \
             WARN ipfwd::logging::tests: queue full\n"
        );
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), Level::INFO);
        assert_eq!(level_for_verbosity(1), Level::DEBUG);
        assert_eq!(level_for_verbosity(2), Level::TRACE);
        assert_eq!(level_for_verbosity(7), Level::TRACE);
        assert!(verbosity(&Level::ERROR) < verbosity(&Level::WARN));
        assert!(verbosity(&Level::DEBUG) < verbosity(&Level::TRACE));
    }
}
