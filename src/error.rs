//! Error types for the MP-285 client.
//!
//! `Mp285Error` is the single error type returned by every device-facing
//! operation. It is built with `thiserror` so that underlying errors convert
//! with `?`.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: the serial port could not be opened.
//! - **`Timeout`**: the device sent nothing back within the read timeout.
//! - **`Protocol`**: a reply arrived but was malformed (short, or with the wrong
//!   terminator). See [`ProtocolError`].
//! - **`OutOfRange`**: a micron coordinate does not map onto the signed 32-bit
//!   step range of the controller.
//! - **`SessionClosed`**: a command was issued after [`close`](crate::Session::close).
//! - **`Config`** / **`Configuration`**: settings failed to load or to validate.
//!
//! Failures of the move log are kept apart in [`MoveLogError`]: by the time the
//! log is written the stage has already moved, so they never turn a successful
//! move into an `Err`.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the device error type.
pub type Mp285Result<T> = std::result::Result<T, Mp285Error>;

/// Errors returned by [`Session`](crate::Session) and its supporting types.
#[derive(Error, Debug)]
pub enum Mp285Error {
    /// The serial port could not be opened.
    #[error("Failed to open serial port '{port}': {reason}")]
    Connection {
        /// Port name as given by the caller.
        port: String,
        /// Reason reported by the operating system.
        reason: String,
    },

    /// No reply byte arrived before the deadline.
    #[error("No reply from MP-285 within {0:?}")]
    Timeout(Duration),

    /// A reply arrived but was malformed.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A micron coordinate maps to more steps than an `i32` holds.
    #[error("{axis} = {value} um is outside the controller step range")]
    OutOfRange {
        /// `'x'`, `'y'` or `'z'`.
        axis: char,
        /// Requested coordinate in microns.
        value: f64,
    },

    /// The session was closed before the command.
    #[error("Session is closed")]
    SessionClosed,

    /// Reading or writing the serial link failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds an invalid value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The operation needs a Cargo feature this build lacks.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for Mp285Error {
    fn from(err: figment::Error) -> Self {
        Mp285Error::Config(Box::new(err))
    }
}

/// A reply frame that does not match the wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than the frame length arrived before the deadline.
    #[error("reply too short: expected {expected} bytes, received {received}")]
    ShortReply {
        /// Frame length in bytes.
        expected: usize,
        /// Bytes actually read.
        received: usize,
    },

    /// The last byte of the reply was not a carriage return.
    #[error("missing terminator: expected 0x0D, found {found:#04x}")]
    MissingTerminator {
        /// Byte found in the terminator position.
        found: u8,
    },
}

/// Failure to append a row to the move log.
#[derive(Error, Debug)]
pub enum MoveLogError {
    /// Opening, writing or flushing the file failed.
    #[error("move log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV writer rejected a row.
    #[cfg(feature = "storage_csv")]
    #[error("move log CSV error: {0}")]
    Csv(#[from] csv::Error),
}
