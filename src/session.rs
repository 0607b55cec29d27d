//! Device session for one MP-285 on one serial line.
//!
//! The session is strictly request/response: every command is written, then the
//! session blocks until the complete reply has arrived or the read timeout has
//! elapsed. There is never more than one command in flight.
//!
//! # Example Usage
//!
//! ```no_run
//! use sutter_mp285::{CsvMoveLog, MicronPosition, Session};
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut stage = Session::open("/dev/ttyUSB0", 9600, Duration::from_secs(10))?
//!         .with_logger(Box::new(CsvMoveLog::open("moves.csv")?));
//!
//!     stage.move_to(MicronPosition::new(3625.0, 4108.0, 9000.0))?;
//!     println!("Position: {}", stage.position_microns()?);
//!
//!     stage.close();
//!     Ok(())
//! }
//! ```

use crate::adapters::{SerialLink, SerialSettings};
use crate::error::{MoveLogError, Mp285Error, Mp285Result, ProtocolError};
use crate::move_log::{MoveLogger, NullMoveLog};
use crate::protocol::{self, ACK_LEN, POSITION_REPLY_LEN};
use crate::units::{MicronPosition, Position, StepScale};
use chrono::Local;
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An open connection to a single MP-285 controller.
///
/// Commands take `&mut self`, so one session cannot have two exchanges in
/// flight. Dropping the session closes the port.
pub struct Session {
    link: Option<Box<dyn SerialLink>>,
    link_name: String,
    timeout: Duration,
    scale: StepScale,
    logger: Box<dyn MoveLogger>,
    last_log_error: Option<MoveLogError>,
}

impl Session {
    /// Open a serial port and start a session on it.
    ///
    /// # Arguments
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM5" on Windows)
    /// * `baud_rate` - Must match the controller's DIP switch setting
    /// * `timeout` - Longest wait for any single reply, including a move's completion
    ///
    /// # Errors
    /// Returns [`Mp285Error::Connection`] if the port cannot be opened.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Mp285Result<Self> {
        Self::open_with(&SerialSettings::new(port, baud_rate, timeout))
    }

    /// Open the port described by `settings` and start a session on it.
    pub fn open_with(settings: &SerialSettings) -> Mp285Result<Self> {
        let link = settings.open()?;
        Ok(Self::with_link(link, settings.timeout))
    }

    /// Start a session over an already-open link.
    pub fn with_link(link: Box<dyn SerialLink>, timeout: Duration) -> Self {
        let link_name = link.name();
        info!("MP-285 session opened on {}", link_name);
        Self {
            link: Some(link),
            link_name,
            timeout,
            scale: StepScale::default(),
            logger: Box::new(NullMoveLog),
            last_log_error: None,
        }
    }

    /// Record every completed move with `logger` instead of discarding it.
    pub fn with_logger(mut self, logger: Box<dyn MoveLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Use `scale` for micron conversions.
    pub fn with_scale(mut self, scale: StepScale) -> Self {
        self.scale = scale;
        self
    }

    /// Step scale used by [`move_to`](Self::move_to) and
    /// [`position_microns`](Self::position_microns).
    pub fn scale(&self) -> StepScale {
        self.scale
    }

    /// Reply timeout applied to every exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `false` once [`close`](Self::close) has run.
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Read the current position in steps.
    pub fn get_position(&mut self) -> Mp285Result<Position> {
        let reply = self.exchange(&protocol::encode_get_position(), POSITION_REPLY_LEN)?;
        let position = protocol::decode_position_reply(&reply)?;
        debug!("[{}] Current position: {}", self.link_name, position);
        Ok(position)
    }

    /// Move to an absolute position in steps and wait for the controller to
    /// report completion.
    ///
    /// On success the move is handed to the move logger. A logging failure is
    /// reported through `tracing` and [`take_log_error`](Self::take_log_error);
    /// it does not make this call fail, since the stage has already moved.
    pub fn set_position(&mut self, position: Position) -> Mp285Result<()> {
        let microns = self.scale.to_microns(position);
        self.set_position_logged(position, microns)
    }

    /// Move to an absolute position in microns.
    ///
    /// The stage goes to the nearest whole step; the move log records `target`
    /// as given.
    pub fn move_to(&mut self, target: MicronPosition) -> Mp285Result<()> {
        let steps = self.scale.to_steps(target)?;
        self.set_position_logged(steps, target)
    }

    fn set_position_logged(
        &mut self,
        position: Position,
        requested: MicronPosition,
    ) -> Mp285Result<()> {
        info!("[{}] Moving to {}", self.link_name, position);
        let reply = self.exchange(&protocol::encode_move(position), ACK_LEN)?;
        protocol::check_ack(&reply)?;

        if let Err(e) = self.logger.record(&requested, Local::now()) {
            warn!(
                "[{}] Move to {} completed but was not logged: {}",
                self.link_name, requested, e
            );
            self.last_log_error = Some(e);
        }
        Ok(())
    }

    /// Read the current position in microns.
    pub fn position_microns(&mut self) -> Mp285Result<MicronPosition> {
        let steps = self.get_position()?;
        Ok(self.scale.to_microns(steps))
    }

    /// The most recent move-log failure, if any, clearing it.
    pub fn take_log_error(&mut self) -> Option<MoveLogError> {
        self.last_log_error.take()
    }

    /// Release the serial port. Calling this more than once is harmless.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            info!("MP-285 session on {} closed", self.link_name);
        }
    }

    /// Write one command and read a reply of exactly `reply_len` bytes.
    fn exchange(&mut self, command: &[u8], reply_len: usize) -> Mp285Result<Vec<u8>> {
        let timeout = self.timeout;
        let link = self.link.as_mut().ok_or(Mp285Error::SessionClosed)?;

        // Leftover bytes from an earlier timed-out exchange would misalign this reply.
        link.clear_input()?;
        link.write_all(command)?;
        link.flush()?;
        debug!("[{}] Sent {:02X?}", self.link_name, command);

        let reply = read_reply(&mut **link, reply_len, timeout)?;
        debug!("[{}] Received {:02X?}", self.link_name, reply);
        Ok(reply)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read exactly `len` bytes before `timeout` elapses.
///
/// Nothing at all is a [`Mp285Error::Timeout`]; a partial reply is a
/// [`ProtocolError::ShortReply`].
fn read_reply(link: &mut dyn SerialLink, len: usize, timeout: Duration) -> Mp285Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; len];
    let mut filled = 0;

    while filled < len && Instant::now() < deadline {
        match link.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Mp285Error::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "serial link closed",
                )))
            }
            Ok(n) => filled += n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => return Err(e.into()),
        }
    }

    match filled {
        0 => Err(Mp285Error::Timeout(timeout)),
        n if n < len => Err(ProtocolError::ShortReply {
            expected: len,
            received: n,
        }
        .into()),
        _ => Ok(buf),
    }
}
