//! Unit tests for wire event schemas: envelope decoding and payload shapes.

use cellbook::channel::events::{
    decode_inbound, CellOutputPayload, CellUpdatedPayload, DepsValidateResponsePayload,
    OutboundEnvelope, OutputChunk, OutputStream,
};
use cellbook::channel::{Command, Notification};
use cellbook::models::Cell;

#[test]
fn decodes_cell_exec() {
    let envelope = decode_inbound(
        r#"{"topic":"session:s1","event":"cell:exec","payload":{"sessionId":"s1","cellId":"c1"}}"#,
    )
    .expect("valid frame decodes");
    match envelope.command {
        Command::CellExec(payload) => {
            assert_eq!(payload.session_id, "s1");
            assert_eq!(payload.cell_id, "c1");
        }
        other => panic!("wrong command: {other:?}"),
    }
}

#[test]
fn decodes_cell_stdin_with_data() {
    let envelope = decode_inbound(
        r#"{"topic":"session:s1","event":"cell:stdin","payload":{"sessionId":"s1","cellId":"c1","stdin":"y\n"}}"#,
    )
    .expect("valid frame decodes");
    match envelope.command {
        Command::CellStdin(payload) => assert_eq!(payload.stdin, "y\n"),
        other => panic!("wrong command: {other:?}"),
    }
}

#[test]
fn decodes_deps_install_without_packages() {
    let envelope = decode_inbound(
        r#"{"topic":"session:s1","event":"deps:install","payload":{"sessionId":"s1"}}"#,
    )
    .expect("valid frame decodes");
    match envelope.command {
        Command::DepsInstall(payload) => assert!(payload.packages.is_none()),
        other => panic!("wrong command: {other:?}"),
    }
}

#[test]
fn rejects_unknown_event() {
    let result = decode_inbound(
        r#"{"topic":"session:s1","event":"cell:teleport","payload":{"sessionId":"s1"}}"#,
    );
    assert!(result.is_err());
}

#[test]
fn rejects_unknown_payload_field() {
    let result = decode_inbound(
        r#"{"topic":"session:s1","event":"cell:exec","payload":{"sessionId":"s1","cellId":"c1","extra":true}}"#,
    );
    assert!(result.is_err());
}

#[test]
fn rejects_missing_payload_field() {
    let result =
        decode_inbound(r#"{"topic":"session:s1","event":"cell:exec","payload":{"sessionId":"s1"}}"#);
    assert!(result.is_err());
}

#[test]
fn rejects_topic_session_mismatch() {
    let result = decode_inbound(
        r#"{"topic":"session:other","event":"cell:exec","payload":{"sessionId":"s1","cellId":"c1"}}"#,
    );
    assert!(result.is_err());
}

#[test]
fn rejects_malformed_json() {
    assert!(decode_inbound("{not json").is_err());
}

#[test]
fn command_event_names_match_wire_names() {
    let envelope = decode_inbound(
        r#"{"topic":"session:s1","event":"deps:validate","payload":{"sessionId":"s1"}}"#,
    )
    .expect("valid frame decodes");
    assert_eq!(envelope.command.event_name(), "deps:validate");
    assert_eq!(envelope.command.session_id(), "s1");
}

#[test]
fn cell_output_serializes_with_stream_type() {
    let envelope = OutboundEnvelope {
        topic: "session:s1".into(),
        notification: Notification::CellOutput(CellOutputPayload {
            cell_id: "c1".into(),
            output: OutputChunk {
                stream: OutputStream::Stdout,
                data: "hi\n".into(),
            },
        }),
    };
    let json = serde_json::to_value(&envelope).expect("serialize");
    assert_eq!(json["event"], "cell:output");
    assert_eq!(json["payload"]["cellId"], "c1");
    assert_eq!(json["payload"]["output"]["type"], "stdout");
    assert_eq!(json["payload"]["output"]["data"], "hi\n");
}

#[test]
fn deps_response_omits_absent_package_list() {
    let json = serde_json::to_value(Notification::DepsValidateResponse(
        DepsValidateResponsePayload { packages: None },
    ))
    .expect("serialize");
    assert_eq!(json["event"], "deps:validate:response");
    assert!(json["payload"].as_object().is_some_and(serde_json::Map::is_empty));
}

#[test]
fn cell_updated_embeds_the_full_cell() {
    let cell = Cell::new_code("a.js", "1 + 1");
    let json = serde_json::to_value(Notification::CellUpdated(CellUpdatedPayload {
        cell: cell.clone(),
    }))
    .expect("serialize");
    assert_eq!(json["event"], "cell:updated");
    assert_eq!(json["payload"]["cell"]["id"], cell.id());
    assert_eq!(json["payload"]["cell"]["type"], "code");
}

#[test]
fn outbound_envelope_round_trips() {
    let envelope = OutboundEnvelope {
        topic: "session:s1".into(),
        notification: Notification::DepsValidateResponse(DepsValidateResponsePayload {
            packages: Some(vec!["express".into()]),
        }),
    };
    let json = serde_json::to_string(&envelope).expect("serialize");
    let back: OutboundEnvelope = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, envelope);
}
