//! End-to-end tests of the session against the simulated MP-285.
//!
//! Run with: cargo test --test simulated_session

use std::time::{Duration, Instant};
use sutter_mp285::adapters::{Fault, SimulatedMp285};
use sutter_mp285::protocol::{MOVE_CMD, TERMINATOR};
use sutter_mp285::{
    CsvMoveLog, MicronPosition, Mp285Error, Position, ProtocolError, Session, StepScale,
};

const TIMEOUT: Duration = Duration::from_millis(150);

fn session_over(sim: SimulatedMp285) -> Session {
    Session::with_link(Box::new(sim), TIMEOUT)
}

#[test]
fn set_then_get_returns_the_position_just_set() {
    let mut session = session_over(SimulatedMp285::new());

    for target in [
        Position::new(0, 0, 0),
        Position::new(58_000, 102_700, 225_000),
        Position::new(-1, -250_000, 7),
        Position::new(i32::MAX, i32::MIN, 0),
    ] {
        session.set_position(target).unwrap();
        assert_eq!(session.get_position().unwrap(), target);
    }
}

#[test]
fn micron_moves_round_trip_within_one_step() {
    let scale = StepScale::new(16.0).unwrap();
    let mut session = session_over(SimulatedMp285::new()).with_scale(scale);

    let target = MicronPosition::new(3625.03, -4108.5, 9000.0);
    session.move_to(target).unwrap();
    let reached = session.position_microns().unwrap();

    let tolerance = 1.0 / scale.steps_per_micron();
    assert!((reached.x - target.x).abs() <= tolerance);
    assert!((reached.y - target.y).abs() <= tolerance);
    assert!((reached.z - target.z).abs() <= tolerance);
}

#[test]
fn move_scenario_writes_frame_and_one_log_row() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("moves.csv");

    let sim = SimulatedMp285::new();
    let handle = sim.handle();
    let scale = StepScale::default();
    let mut session = session_over(sim)
        .with_scale(scale)
        .with_logger(Box::new(CsvMoveLog::open(&log_path).unwrap()));

    let before = std::fs::read_to_string(&log_path).unwrap();
    session
        .move_to(MicronPosition::new(100.0, 100.0, 100.0))
        .unwrap();
    let after = std::fs::read_to_string(&log_path).unwrap();

    let steps = (100.0 * scale.steps_per_micron()) as i32;
    let mut expected = vec![MOVE_CMD];
    for _ in 0..3 {
        expected.extend_from_slice(&steps.to_le_bytes());
    }
    expected.push(TERMINATOR);
    assert_eq!(handle.frames(), vec![expected]);

    assert_eq!(after.lines().count(), before.lines().count() + 1);
    let row = after.lines().last().unwrap();
    let fields: Vec<&str> = row.split(',').collect();
    assert_eq!(fields.len(), 4);
    assert!(chrono::NaiveDateTime::parse_from_str(fields[0], "%Y-%m-%dT%H:%M:%S%.3f").is_ok());
    assert_eq!(&fields[1..], &["100", "100", "100"]);
}

#[test]
fn off_grid_move_logs_the_requested_microns() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("moves.csv");

    let sim = SimulatedMp285::new();
    let handle = sim.handle();
    let mut session = session_over(sim)
        .with_scale(StepScale::default())
        .with_logger(Box::new(CsvMoveLog::open(&log_path).unwrap()));

    session
        .move_to(MicronPosition::new(100.03, 0.01, 3625.5))
        .unwrap();

    assert_eq!(handle.position(), Position::new(2501, 0, 90638));
    let log = std::fs::read_to_string(&log_path).unwrap();
    let row = log.lines().last().unwrap();
    assert!(row.ends_with(",100.03,0.01,3625.5"), "logged row: {row}");
}

#[test]
fn short_position_reply_is_a_protocol_error() {
    let sim = SimulatedMp285::new().with_fault(Fault::TruncateReply(6));
    let mut session = session_over(sim);

    match session.get_position() {
        Err(Mp285Error::Protocol(ProtocolError::ShortReply { expected, received })) => {
            assert_eq!(expected, 13);
            assert_eq!(received, 6);
        }
        other => panic!("expected a short reply error, got {:?}", other),
    }
}

#[test]
fn missing_terminator_is_a_protocol_error() {
    let sim = SimulatedMp285::new().with_fault(Fault::BadTerminator(b'\n'));
    let mut session = session_over(sim);

    assert!(matches!(
        session.get_position(),
        Err(Mp285Error::Protocol(ProtocolError::MissingTerminator { found: b'\n' }))
    ));
}

#[test]
fn silent_device_times_out_instead_of_hanging() {
    let sim = SimulatedMp285::new().with_fault(Fault::Silent);
    let mut session = session_over(sim);

    let start = Instant::now();
    let err = session.get_position().unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, Mp285Error::Timeout(t) if t == TIMEOUT));
    assert!(elapsed >= TIMEOUT);
    assert!(elapsed < TIMEOUT * 10, "took {:?}", elapsed);

    let err = session.set_position(Position::new(1, 1, 1)).unwrap_err();
    assert!(matches!(err, Mp285Error::Timeout(_)));
}

#[test]
fn failed_move_is_not_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("moves.csv");

    let sim = SimulatedMp285::new().with_fault(Fault::Silent);
    let mut session = session_over(sim).with_logger(Box::new(CsvMoveLog::open(&log_path).unwrap()));

    assert!(session.move_to(MicronPosition::new(1.0, 2.0, 3.0)).is_err());
    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(contents.lines().count(), 1);
}

#[test]
fn session_recovers_after_a_timeout() {
    let sim = SimulatedMp285::new().with_position(Position::new(5, 6, 7));
    let handle = sim.handle();
    let mut session = session_over(sim);

    handle.set_fault(Fault::Silent);
    assert!(session.get_position().is_err());

    handle.set_fault(Fault::None);
    assert_eq!(session.get_position().unwrap(), Position::new(5, 6, 7));
}

#[test]
fn out_of_range_move_never_reaches_the_wire() {
    let sim = SimulatedMp285::new();
    let handle = sim.handle();
    let mut session = session_over(sim);

    let err = session
        .move_to(MicronPosition::new(0.0, 0.0, 1.0e12))
        .unwrap_err();
    assert!(matches!(err, Mp285Error::OutOfRange { axis: 'Z', .. }));
    assert!(handle.frames().is_empty());
}

#[test]
fn commands_after_close_fail() {
    let mut session = session_over(SimulatedMp285::new());
    session.close();
    session.close();

    assert!(matches!(
        session.set_position(Position::new(1, 2, 3)),
        Err(Mp285Error::SessionClosed)
    ));
}
