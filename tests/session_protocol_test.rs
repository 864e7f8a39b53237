//! Command/response behaviour of `DeviceSession` against the simulated controller.

use magnet_positioner::read_policy::ReadPolicy;
use magnet_positioner::transport::{MockLog, MockTransport};
use magnet_positioner::{
    Axis, AxisTable, DeviceSession, ErrorKind, PositionerError, SessionOptions, SessionState,
};
use std::time::Duration;

fn open_with(
    mock: MockTransport,
    options: SessionOptions,
) -> (DeviceSession<MockTransport>, MockLog) {
    let log = mock.log();
    let mut session = DeviceSession::new(mock, AxisTable::default(), options).unwrap();
    session.open().unwrap();
    (session, log)
}

fn open_mock(mock: MockTransport) -> (DeviceSession<MockTransport>, MockLog) {
    open_with(mock, SessionOptions::immediate())
}

// =============================================================================
// Conversion through the wire
// =============================================================================

#[test]
fn test_set_x_ten_mm_sends_inverted_steps() {
    let (mut session, log) = open_mock(MockTransport::new());

    session.set_axis_mm(Axis::X, 10.0).unwrap();
    assert_eq!(log.writes(), vec!["x-2000".to_string()]);

    assert_eq!(session.steps(Axis::X).unwrap(), -2000);
    assert!((session.axis_mm(Axis::X).unwrap() - 10.0).abs() < 1e-9);
}

#[test]
fn test_sub_step_request_commands_zero() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.set_axis_mm(Axis::Y, 0.004).unwrap();
    assert_eq!(log.writes(), vec!["y0".to_string()]);
}

#[test]
fn test_z_axis_is_not_inverted() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.set_axis_mm(Axis::Z, 100.0).unwrap();
    assert_eq!(log.writes(), vec!["z10000".to_string()]);
    assert!((session.axis_mm(Axis::Z).unwrap() - 100.0).abs() < 1e-9);
}

#[test]
fn test_position_reads_x_y_z_in_order() {
    let (mut session, log) = open_mock(MockTransport::new().with_steps(-2000, 400, 5000));

    let position = session.position().unwrap();
    assert_eq!(
        log.writes(),
        vec!["x?".to_string(), "y?".to_string(), "z?".to_string()]
    );
    assert!((position.x - 10.0).abs() < 1e-9);
    assert!((position.y + 2.0).abs() < 1e-9);
    assert!((position.z - 50.0).abs() < 1e-9);
    assert_eq!(position.get(Axis::Y), position.y);
}

#[test]
fn test_raw_steps_bypass_conversion() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.set_steps(Axis::Z, -123).unwrap();
    assert_eq!(session.steps(Axis::Z).unwrap(), -123);
    assert_eq!(log.writes(), vec!["z-123".to_string(), "z?".to_string()]);
}

// =============================================================================
// Bounds
// =============================================================================

#[test]
fn test_z_above_bound_rejected_without_io() {
    let (mut session, log) = open_mock(MockTransport::new());

    let err = session.set_axis_mm(Axis::Z, 551.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    assert!(log.writes().is_empty());

    session.set_axis_mm(Axis::Z, 550.0).unwrap();
    assert_eq!(log.writes(), vec!["z55000".to_string()]);
}

#[test]
fn test_out_of_range_on_every_axis_writes_nothing() {
    let (mut session, log) = open_mock(MockTransport::new());

    for (axis, mm) in [
        (Axis::X, 255.5),
        (Axis::X, -300.0),
        (Axis::Y, 60.01),
        (Axis::Y, -61.0),
        (Axis::Z, -0.1),
        (Axis::Z, f64::NAN),
        (Axis::X, f64::INFINITY),
    ] {
        let err = session.set_axis_mm(axis, mm).unwrap_err();
        assert!(
            matches!(err, PositionerError::Range { axis: a, .. } if a == axis),
            "{:?} {} gave {:?}",
            axis,
            mm,
            err
        );
    }
    assert!(log.writes().is_empty());
}

#[test]
fn test_bounds_are_inclusive() {
    let (mut session, _log) = open_mock(MockTransport::new());
    session.set_axis_mm(Axis::X, -255.0).unwrap();
    session.set_axis_mm(Axis::X, 255.0).unwrap();
    session.set_axis_mm(Axis::Y, -60.0).unwrap();
    session.set_axis_mm(Axis::Z, 0.0).unwrap();
}

#[test]
fn test_relative_move_checks_target_bounds() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.set_axis_mm(Axis::Y, 59.0).unwrap();
    log.clear();

    let err = session.move_by_mm(Axis::Y, 2.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    // Only the position query went out
    assert_eq!(log.writes(), vec!["y?".to_string()]);
}

// =============================================================================
// Connection state
// =============================================================================

#[test]
fn test_closed_session_refuses_commands_without_writing() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.close().unwrap();

    let err = session.steps(Axis::X).unwrap_err();
    assert!(matches!(err, PositionerError::NotConnected));
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(log.writes().is_empty());
}

#[test]
fn test_close_is_idempotent() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.close().unwrap();
    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(log.snapshot().closes, 1);
}

#[test]
fn test_drop_closes_connection() {
    let (session, log) = open_mock(MockTransport::new());
    drop(session);
    assert_eq!(log.snapshot().closes, 1);
}

#[test]
fn test_run_closes_on_error_path() {
    let mock = MockTransport::new();
    let log = mock.log();
    let session =
        DeviceSession::new(mock, AxisTable::default(), SessionOptions::immediate()).unwrap();

    let result = session.run(|stage| {
        stage.set_led(1)?;
        stage.set_axis_mm(Axis::Z, 900.0)
    });

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Range);
    let record = log.snapshot();
    assert_eq!(record.opens, 1);
    assert_eq!(record.closes, 1);
    assert_eq!(record.writes, vec!["L1".to_string()]);
}

#[test]
fn test_run_returns_value_and_closes() {
    let mock = MockTransport::new().with_steps(0, 0, 2500);
    let log = mock.log();
    let session =
        DeviceSession::new(mock, AxisTable::default(), SessionOptions::immediate()).unwrap();

    let z = session.run(|stage| stage.axis_mm(Axis::Z)).unwrap();
    assert!((z - 25.0).abs() < 1e-9);
    assert_eq!(log.snapshot().closes, 1);
}

// =============================================================================
// Read loop
// =============================================================================

#[test]
fn test_empty_lines_are_retried_until_reply() {
    let blanks = 4;
    let (mut session, log) =
        open_mock(MockTransport::new().with_steps(-2000, 0, 0).with_blank_reads(blanks));

    assert_eq!(session.steps(Axis::X).unwrap(), -2000);
    assert_eq!(log.reads(), blanks + 1);
}

#[test]
fn test_silent_controller_exhausts_attempt_budget() {
    let options =
        SessionOptions::immediate().with_read_policy(ReadPolicy::MaxAttempts { attempts: 5 });
    let (mut session, log) = open_with(MockTransport::new().silent(), options);

    let err = session.led().unwrap_err();
    match &err {
        PositionerError::NoReply {
            command, attempts, ..
        } => {
            assert_eq!(command, "L?");
            assert_eq!(*attempts, 5);
        }
        other => panic!("expected NoReply, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(log.reads(), 5);
}

#[test]
fn test_silent_controller_exhausts_deadline() {
    let options = SessionOptions {
        poll_interval: Duration::from_millis(1),
        ..SessionOptions::immediate().with_read_policy(ReadPolicy::Deadline {
            timeout: Duration::from_millis(20),
        })
    };
    let (mut session, _log) = open_with(MockTransport::new().silent(), options);

    let err = session.steps(Axis::Y).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[test]
fn test_blank_reads_within_budget_succeed() {
    let options =
        SessionOptions::immediate().with_read_policy(ReadPolicy::MaxAttempts { attempts: 3 });
    let (mut session, _log) = open_with(MockTransport::new().with_blank_reads(2), options);
    assert_eq!(session.led().unwrap(), 0);
}

#[test]
fn test_unbounded_policy_tolerates_long_silence() {
    let options = SessionOptions::immediate().with_read_policy(ReadPolicy::Unbounded);
    let (mut session, log) = open_with(MockTransport::new().with_blank_reads(500), options);
    assert_eq!(session.steps(Axis::Z).unwrap(), 0);
    assert_eq!(log.reads(), 501);
}

#[test]
fn test_garbled_reply_is_protocol_error() {
    let mut mock = MockTransport::new();
    mock.push_reply("x?err");
    let (mut session, _log) = open_mock(mock);

    let err = session.axis_mm(Axis::X).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[test]
fn test_set_acknowledgement_not_interpreted() {
    let mut mock = MockTransport::new();
    mock.push_reply("whatever");
    let (mut session, _log) = open_mock(mock);
    session.set_axis_mm(Axis::X, 1.0).unwrap();
}

// =============================================================================
// Tare and LED
// =============================================================================

#[test]
fn test_tare_defaults_to_all_axes() {
    let (mut session, log) = open_mock(MockTransport::new().with_steps(10, 20, 30));
    session.tare("xyz").unwrap();
    assert_eq!(
        log.writes(),
        vec!["tx".to_string(), "ty".to_string(), "tz".to_string()]
    );
    assert_eq!(session.steps(Axis::Y).unwrap(), 0);
}

#[test]
fn test_tare_is_case_insensitive() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.tare("Zx").unwrap();
    assert_eq!(log.writes(), vec!["tz".to_string(), "tx".to_string()]);
}

#[test]
fn test_tare_invalid_label_sends_nothing() {
    let (mut session, log) = open_mock(MockTransport::new());

    let err = session.tare("q").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAxis);

    // Valid labels ahead of a bad one are not sent either
    let err = session.tare("xyq").unwrap_err();
    assert!(matches!(err, PositionerError::InvalidAxis(ref l) if l == "q"));
    assert!(log.writes().is_empty());
}

#[test]
fn test_tare_all_zeroes_counters() {
    let (mut session, _log) = open_mock(MockTransport::new().with_steps(1, 2, 3));
    session.tare_all().unwrap();
    let position = session.position().unwrap();
    assert_eq!((position.x, position.y, position.z), (0.0, 0.0, 0.0));
}

#[test]
fn test_led_round_trip() {
    let (mut session, log) = open_mock(MockTransport::new());
    session.set_led(1).unwrap();
    assert_eq!(session.led().unwrap(), 1);
    assert_eq!(log.writes(), vec!["L1".to_string(), "L?".to_string()]);
}
