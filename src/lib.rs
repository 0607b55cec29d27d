//! Serial client for the Sutter Instruments MP-285 micromanipulator.
//!
//! This library opens a serial connection to one controller, moves the stage
//! to absolute XYZ positions, reads back the current position, and records
//! every completed move through an injectable [`MoveLogger`]. It is used by
//! the `mp285` command-line tool.

pub mod adapters;
pub mod config;
pub mod error;
pub mod move_log;
pub mod protocol;
pub mod session;
pub mod units;

pub use error::{MoveLogError, Mp285Error, Mp285Result, ProtocolError};
pub use move_log::{CsvMoveLog, MoveLogger, NullMoveLog};
pub use session::Session;
pub use units::{MicronPosition, Position, StepScale};
