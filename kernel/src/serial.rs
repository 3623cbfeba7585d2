//! UART 16550 backend for [`crate::logger::LogSink`].
//!
//! The serial debug port is explicitly out of scope as core logic; this
//! is the minimal external-collaborator implementation needed to see
//! boot and test output, not a place the interesting design lives.

use crate::logger::LogSink;
use spin::Mutex;
use uart_16550::SerialPort;

const COM1_PORT: u16 = 0x3F8;

static SERIAL1: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1_PORT) });

/// Initialize the COM1 UART. Must run before any log output.
pub fn init() {
    SERIAL1.lock().init();
}

/// A [`LogSink`] that writes to COM1.
pub struct SerialSink;

impl LogSink for SerialSink {
    fn write_str(&mut self, s: &str) {
        use core::fmt::Write;
        let _ = SERIAL1.lock().write_str(s);
    }
}

static mut SERIAL_SINK: SerialSink = SerialSink;

/// Installs the COM1 serial sink as the global log backend. Must run
/// once, after [`init`].
pub fn install_logger() {
    // SAFETY: called exactly once at boot, before any other code takes
    // a reference to `SERIAL_SINK`.
    #[allow(static_mut_refs)]
    crate::logger::init(unsafe { &mut SERIAL_SINK });
}

/// Write straight to the UART, bypassing the logger. Used by the panic
/// handler, which must not depend on the logger lock being free.
pub fn emergency_print(s: &str) {
    use core::fmt::Write;
    // SAFETY: panic path only; a stuck lock here means we were already
    // mid-panic holding it, so force past it.
    unsafe {
        let mut port = SerialPort::new(COM1_PORT);
        let _ = port.write_str(s);
    }
}
