//! MP-285 binary wire format.
//!
//! Reference: Sutter MP-285 operation manual, "External Control" chapter.
//!
//! Protocol Overview:
//! - Commands are a single ASCII code byte, optional binary payload, then CR
//! - Positions are three signed 32-bit integers, little-endian, in microsteps
//! - Timing: half-duplex, one command in flight at a time
//!
//! ```text
//! move:          'm' | X:i32le | Y:i32le | Z:i32le | CR   -> CR
//! get position:  'c' | CR                                  -> X:i32le | Y:i32le | Z:i32le | CR
//! ```

use crate::error::ProtocolError;
use crate::units::Position;

/// Frame terminator (carriage return).
pub const TERMINATOR: u8 = 0x0D;

/// Move to absolute position.
pub const MOVE_CMD: u8 = b'm';

/// Get current position.
pub const GET_POSITION_CMD: u8 = b'c';

/// Length of an encoded move command.
pub const MOVE_FRAME_LEN: usize = 1 + 12 + 1;

/// Length of a position reply.
pub const POSITION_REPLY_LEN: usize = 12 + 1;

/// Length of the move acknowledgment.
pub const ACK_LEN: usize = 1;

/// Encode an absolute move command.
pub fn encode_move(position: Position) -> [u8; MOVE_FRAME_LEN] {
    let mut frame = [0u8; MOVE_FRAME_LEN];
    frame[0] = MOVE_CMD;
    frame[1..13].copy_from_slice(&encode_xyz(position));
    frame[13] = TERMINATOR;
    frame
}

/// Encode the get-position command.
pub fn encode_get_position() -> [u8; 2] {
    [GET_POSITION_CMD, TERMINATOR]
}

/// Decode the payload of a move command (everything after the command byte).
///
/// Used by the simulated controller to interpret what the session wrote.
pub fn decode_move_payload(payload: &[u8]) -> Result<Position, ProtocolError> {
    decode_xyz_frame(payload)
}

/// Decode a position reply: 12 bytes of coordinates followed by CR.
pub fn decode_position_reply(reply: &[u8]) -> Result<Position, ProtocolError> {
    decode_xyz_frame(reply)
}

/// Check the single-byte acknowledgment sent when a move completes.
pub fn check_ack(reply: &[u8]) -> Result<(), ProtocolError> {
    match reply.first() {
        None => Err(ProtocolError::ShortReply {
            expected: ACK_LEN,
            received: 0,
        }),
        Some(&TERMINATOR) => Ok(()),
        Some(&other) => Err(ProtocolError::MissingTerminator { found: other }),
    }
}

/// Pack three coordinates as little-endian `i32`s, X first.
pub fn encode_xyz(position: Position) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..4].copy_from_slice(&position.x.to_le_bytes());
    out[4..8].copy_from_slice(&position.y.to_le_bytes());
    out[8..12].copy_from_slice(&position.z.to_le_bytes());
    out
}

fn decode_xyz_frame(frame: &[u8]) -> Result<Position, ProtocolError> {
    if frame.len() < POSITION_REPLY_LEN {
        return Err(ProtocolError::ShortReply {
            expected: POSITION_REPLY_LEN,
            received: frame.len(),
        });
    }
    if frame[12] != TERMINATOR {
        return Err(ProtocolError::MissingTerminator { found: frame[12] });
    }

    let axis = |i: usize| i32::from_le_bytes([frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]);
    Ok(Position::new(axis(0), axis(4), axis(8)))
}
