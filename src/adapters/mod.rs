//! Byte-level links to the controller.
//!
//! A [`SerialLink`] is anything the session can write frames to and read
//! replies from: a real serial port, or the simulated MP-285 used in tests and
//! dry runs.

pub mod mock;
pub mod serial_adapter;

use std::io::{Read, Write};

pub use mock::{Fault, SimHandle, SimulatedMp285};
pub use serial_adapter::SerialSettings;
#[cfg(feature = "instrument_serial")]
pub use serial_adapter::SerialPortLink;

/// Blocking, half-duplex byte link.
///
/// `read` must return within the link's own poll interval, reporting
/// `ErrorKind::TimedOut` when nothing arrived; the session enforces the overall
/// deadline on top of that.
pub trait SerialLink: Read + Write + Send {
    /// Discard any bytes received but not yet read.
    fn clear_input(&mut self) -> std::io::Result<()>;

    /// Human-readable name for log messages.
    fn name(&self) -> String;
}
