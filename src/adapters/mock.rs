//! Simulated MP-285 controller
//!
//! Speaks the binary wire protocol without hardware. It provides:
//! - Position state updated by move commands
//! - Controllable fault injection (silence, truncated replies, bad terminators)
//! - A log of every frame written, for test verification
//!
//! # Example
//!
//! ```
//! use sutter_mp285::adapters::SimulatedMp285;
//! use sutter_mp285::Position;
//!
//! let sim = SimulatedMp285::new();
//! let handle = sim.handle();
//! handle.set_position(Position::new(10, 20, 30));
//! assert_eq!(handle.position(), Position::new(10, 20, 30));
//! ```

use super::SerialLink;
use crate::protocol::{self, GET_POSITION_CMD, MOVE_CMD, MOVE_FRAME_LEN, TERMINATOR};
use crate::units::Position;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Fault to inject into the simulated controller's replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Answer every command correctly.
    #[default]
    None,
    /// Accept commands but never answer.
    Silent,
    /// Send only the first `n` bytes of each reply.
    TruncateReply(usize),
    /// Replace the final byte of each reply.
    BadTerminator(u8),
}

#[derive(Debug, Default)]
struct SimState {
    position: Position,
    fault: Fault,
    rx: Vec<u8>,
    tx: VecDeque<u8>,
    frames: Vec<Vec<u8>>,
    clears: usize,
}

impl SimState {
    /// Consume complete commands from the receive buffer.
    fn process(&mut self) {
        loop {
            let Some(&code) = self.rx.first() else {
                return;
            };
            match code {
                GET_POSITION_CMD => {
                    if self.rx.len() < 2 {
                        return;
                    }
                    let frame: Vec<u8> = self.rx.drain(..2).collect();
                    self.frames.push(frame);
                    let mut reply = protocol::encode_xyz(self.position).to_vec();
                    reply.push(TERMINATOR);
                    self.reply(reply);
                }
                MOVE_CMD => {
                    if self.rx.len() < MOVE_FRAME_LEN {
                        return;
                    }
                    let frame: Vec<u8> = self.rx.drain(..MOVE_FRAME_LEN).collect();
                    if let Ok(target) = protocol::decode_move_payload(&frame[1..]) {
                        self.position = target;
                    }
                    self.frames.push(frame);
                    self.reply(vec![TERMINATOR]);
                }
                _ => {
                    // The controller ignores bytes it does not recognise.
                    self.rx.remove(0);
                }
            }
        }
    }

    fn reply(&mut self, mut reply: Vec<u8>) {
        match self.fault {
            Fault::None => {}
            Fault::Silent => return,
            Fault::TruncateReply(n) => reply.truncate(n),
            Fault::BadTerminator(byte) => {
                if let Some(last) = reply.last_mut() {
                    *last = byte;
                }
            }
        }
        self.tx.extend(reply);
    }
}

/// In-process stand-in for an MP-285 on a serial line.
pub struct SimulatedMp285 {
    state: Arc<Mutex<SimState>>,
    poll_interval: Duration,
}

/// Shared view of a [`SimulatedMp285`] that stays usable after the link is
/// moved into a session.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedMp285 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMp285 {
    /// Controller at the origin with no fault.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Start at a given step position.
    pub fn with_position(self, position: Position) -> Self {
        lock(&self.state).position = position;
        self
    }

    /// Start with `fault` injected.
    pub fn with_fault(self, fault: Fault) -> Self {
        lock(&self.state).fault = fault;
        self
    }

    /// Handle for inspecting the simulator once it is owned by a session.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SimHandle {
    /// Position after the last accepted move.
    pub fn position(&self) -> Position {
        lock(&self.state).position
    }

    /// Move the stage without a command, as a manual joystick move would.
    pub fn set_position(&self, position: Position) {
        lock(&self.state).position = position;
    }

    /// Change the fault applied to later replies.
    pub fn set_fault(&self, fault: Fault) {
        lock(&self.state).fault = fault;
    }

    /// Every complete command frame received, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        lock(&self.state).frames.clone()
    }

    /// Queue unsolicited bytes, as left behind by an earlier exchange.
    pub fn inject_stale_bytes(&self, bytes: &[u8]) {
        lock(&self.state).tx.extend(bytes.iter().copied());
    }

    /// Number of times the input buffer was cleared.
    pub fn clear_count(&self) -> usize {
        lock(&self.state).clears
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    // Tests may panic while holding the guard.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Read for SimulatedMp285 {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut state = lock(&self.state);
            if !state.tx.is_empty() {
                let n = buf.len().min(state.tx.len());
                for (slot, byte) in buf.iter_mut().zip(state.tx.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }
        std::thread::sleep(self.poll_interval);
        Err(io::Error::new(io::ErrorKind::TimedOut, "no data from simulated MP-285"))
    }
}

impl Write for SimulatedMp285 {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        state.rx.extend_from_slice(buf);
        state.process();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for SimulatedMp285 {
    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.tx.clear();
        state.clears += 1;
        Ok(())
    }

    fn name(&self) -> String {
        "simulated MP-285".to_string()
    }
}
