//! Gateway protocol tests
//!
//! Pins the wire contract of the WebSocket gateway: the JSON commands
//! clients send and the room events they receive back.

use chrono::{TimeZone, Utc};

use mentora_types::{Amount, RoomEvent, SessionCommand, SessionId, UserId};

const ADVISOR: &str = "7b6f1d52-8a3e-4f0b-9c2d-5e4a6b7c8d9e";
const CLIENT: &str = "1a2b3c4d-5e6f-4a8b-9c0d-e1f2a3b4c5d6";

/// Parse an inbound gateway command exactly as the socket loop does
fn parse_command(json: &str) -> Result<SessionCommand, serde_json::Error> {
    serde_json::from_str(json)
}

// ============================================================================
// Inbound Commands
// ============================================================================

#[test]
fn test_join_room_command_parses() {
    let cmd = parse_command(r#"{"type":"join_room","sessionId":"room-99"}"#).unwrap();
    match cmd {
        SessionCommand::JoinRoom { session_id } => {
            assert_eq!(session_id, SessionId::new("room-99"));
        }
        other => panic!("Expected JoinRoom, got: {other:?}"),
    }
}

#[test]
fn test_billing_start_command_parses() {
    let json = format!(
        r#"{{
            "type": "billing_start",
            "sessionId": "room-1",
            "advisorId": "{ADVISOR}",
            "clientId": "{CLIENT}",
            "ratePerMinute": 150,
            "startTime": "2026-03-14T09:00:00Z"
        }}"#
    );
    let cmd = parse_command(&json).unwrap();
    match cmd {
        SessionCommand::BillingStart {
            session_id,
            advisor_id,
            client_id,
            rate_per_minute,
            start_time,
        } => {
            assert_eq!(session_id, SessionId::new("room-1"));
            assert_eq!(advisor_id, UserId::parse(ADVISOR).unwrap());
            assert_eq!(client_id, UserId::parse(CLIENT).unwrap());
            assert_eq!(rate_per_minute, Amount::from_cents(150));
            assert_eq!(
                start_time,
                Some(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap())
            );
        }
        other => panic!("Expected BillingStart, got: {other:?}"),
    }
}

#[test]
fn test_billing_start_without_start_time() {
    let json = format!(
        r#"{{
            "type": "billing_start",
            "sessionId": "room-1",
            "advisorId": "{ADVISOR}",
            "clientId": "{CLIENT}",
            "ratePerMinute": 200
        }}"#
    );
    let cmd = parse_command(&json).unwrap();
    match cmd {
        SessionCommand::BillingStart { start_time, .. } => assert_eq!(start_time, None),
        other => panic!("Expected BillingStart, got: {other:?}"),
    }
}

#[test]
fn test_billing_stop_command_parses() {
    let cmd = parse_command(r#"{"type":"billing_stop","sessionId":"room-1"}"#).unwrap();
    match cmd {
        SessionCommand::BillingStop { session_id } => {
            assert_eq!(session_id, SessionId::new("room-1"));
        }
        other => panic!("Expected BillingStop, got: {other:?}"),
    }
}

#[test]
fn test_session_ended_command_parses() {
    let cmd = parse_command(r#"{"type":"session_ended","sessionId":"room-1"}"#).unwrap();
    match cmd {
        SessionCommand::SessionEnded { session_id } => {
            assert_eq!(session_id, SessionId::new("room-1"));
        }
        other => panic!("Expected SessionEnded, got: {other:?}"),
    }
}

#[test]
fn test_unknown_command_type_is_rejected() {
    assert!(parse_command(r#"{"type":"open_the_pod_bay_doors","sessionId":"room-1"}"#).is_err());
}

#[test]
fn test_missing_session_id_is_rejected() {
    assert!(parse_command(r#"{"type":"billing_stop"}"#).is_err());
}

#[test]
fn test_negative_rate_parses_and_is_left_to_the_engine() {
    // the gateway forwards it; the engine refuses it as an invalid rate
    let json = format!(
        r#"{{
            "type": "billing_start",
            "sessionId": "room-1",
            "advisorId": "{ADVISOR}",
            "clientId": "{CLIENT}",
            "ratePerMinute": -50
        }}"#
    );
    let cmd = parse_command(&json).unwrap();
    match cmd {
        SessionCommand::BillingStart { rate_per_minute, .. } => {
            assert!(rate_per_minute.is_negative());
        }
        other => panic!("Expected BillingStart, got: {other:?}"),
    }
}

// ============================================================================
// Outbound Events
// ============================================================================

#[test]
fn test_billing_update_wire_shape() {
    let event = RoomEvent::BillingUpdate {
        session_id: SessionId::new("room-1"),
        duration: 120,
        amount_billed: Amount::from_cents(300),
        current_balance: Amount::from_cents(700),
    };
    let wire: serde_json::Value = serde_json::to_value(&event).unwrap();

    assert_eq!(wire["type"], "billing_update");
    assert_eq!(wire["sessionId"], "room-1");
    assert_eq!(wire["duration"], 120);
    assert_eq!(wire["amountBilled"], 300);
    assert_eq!(wire["currentBalance"], 700);
}

#[test]
fn test_insufficient_funds_wire_shape() {
    let event = RoomEvent::InsufficientFunds {
        session_id: SessionId::new("room-1"),
    };
    let wire: serde_json::Value = serde_json::to_value(&event).unwrap();

    assert_eq!(wire["type"], "insufficient_funds");
    assert_eq!(wire["sessionId"], "room-1");
}

#[test]
fn test_session_ended_wire_shape() {
    let event = RoomEvent::SessionEnded {
        session_id: SessionId::new("room-1"),
    };
    let wire: serde_json::Value = serde_json::to_value(&event).unwrap();

    assert_eq!(wire["type"], "session_ended");
    assert_eq!(wire["sessionId"], "room-1");
}

#[test]
fn test_session_ended_event_parses_back_as_a_command() {
    // the platform may echo a room's session_ended event into the gateway;
    // the same JSON must be readable as the end-session command
    let event = RoomEvent::SessionEnded {
        session_id: SessionId::new("room-1"),
    };
    let json = serde_json::to_string(&event).unwrap();
    match parse_command(&json).unwrap() {
        SessionCommand::SessionEnded { session_id } => {
            assert_eq!(session_id, SessionId::new("room-1"));
        }
        other => panic!("Expected SessionEnded, got: {other:?}"),
    }
}
