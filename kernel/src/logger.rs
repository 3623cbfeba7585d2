//! Logging glue: a [`LogSink`] trait decouples `log`'s facade from the
//! concrete output device, per the "function-pointer output override"
//! design note — the serial port itself is an external collaborator,
//! not core logic, so only a thin adapter lives here.

use core::fmt::Write;
use spin::Mutex;

/// Anything that can accept formatted log text. Tests inject a capturing
/// sink; the boot binary injects the serial backend.
pub trait LogSink: Send {
    fn write_str(&mut self, s: &str);
}

static LOGGER: Mutex<Option<&'static mut dyn LogSink>> = Mutex::new(None);

struct FacadeLogger;

impl log::Log for FacadeLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Some(sink) = LOGGER.lock().as_deref_mut() {
            let _ = write!(LineWriter(sink), "[{}] {}\n", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

struct LineWriter<'a>(&'a mut dyn LogSink);

impl core::fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

static FACADE: FacadeLogger = FacadeLogger;

/// Install `sink` as the global logging backend and raise `log`'s max
/// level to `Trace`. Must be called exactly once, early in boot.
pub fn init(sink: &'static mut dyn LogSink) {
    *LOGGER.lock() = Some(sink);
    log::set_logger(&FACADE)
        .map(|()| log::set_max_level(log::LevelFilter::Trace))
        .expect("logger already initialized");
}

/// A [`LogSink`] that accumulates into a growable buffer, used by tests
/// that want to assert on emitted log text instead of just exercising
/// the code path.
#[cfg(any(test, feature = "testing"))]
pub struct CapturingSink {
    pub buffer: alloc::string::String,
}

#[cfg(any(test, feature = "testing"))]
impl CapturingSink {
    pub fn new() -> Self {
        Self {
            buffer: alloc::string::String::new(),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl LogSink for CapturingSink {
    fn write_str(&mut self, s: &str) {
        self.buffer.push_str(s);
    }
}
