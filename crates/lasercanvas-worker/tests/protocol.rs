use std::collections::BTreeMap;

use lasercanvas_worker::{
    decode, encode, ElementDef, ElementJson, ElementKind, Matrix2x2, ProtocolError,
    SystemSnapshot, WorkerMessage, WorkerReply, MAX_MESSAGE_BYTES, REGISTRY_VERSION,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn messages_use_type_and_params() {
    let init = WorkerMessage::Init(vec![ElementDef::new(ElementKind::Mirror)]);
    assert_eq!(
        serde_json::to_value(&init).unwrap(),
        json!({ "type": "init", "params": [{ "type": "mirror", "version": REGISTRY_VERSION }] })
    );
    assert_eq!(
        serde_json::to_value(&WorkerMessage::Test).unwrap(),
        json!({ "type": "test" })
    );
    let variables = WorkerMessage::Variables(BTreeMap::from([("x".to_string(), 0.25)]));
    assert_eq!(
        serde_json::to_value(&variables).unwrap(),
        json!({ "type": "variables", "params": { "x": 0.25 } })
    );
}

#[test]
fn legacy_init_fields_are_ignored() {
    let message: WorkerMessage = decode(
        r#"{"type":"init","params":[{"type":"lens","getStr":"function(){}","elementAbcdStr":"function(){}"}]}"#,
    )
    .unwrap();
    assert_eq!(
        message,
        WorkerMessage::Init(vec![ElementDef {
            kind: "lens".to_string(),
            version: REGISTRY_VERSION,
        }])
    );
}

#[test]
fn system_snapshot_accepts_numbers_and_expressions() {
    let message: WorkerMessage = decode(
        r#"{
            "type": "system",
            "params": {
                "prop": {"name": "cavity"},
                "elements": [
                    {"type": "mirror", "name": "M1", "loc": {"x": 0, "y": 0},
                     "prop": {"radiusOfCurvature": 100, "angleOfIncidence": "x * 10",
                              "distanceToNext": {"number": 50, "expression": null}}}
                ]
            }
        }"#,
    )
    .unwrap();
    let WorkerMessage::System(snapshot) = message else {
        panic!("expected a system message");
    };
    let mirror = &snapshot.elements[0];
    assert_eq!(mirror.kind, "mirror");
    assert_eq!(mirror.name, "M1");
    assert_eq!(mirror.prop["radiusOfCurvature"].number(), Some(100.0));
    assert_eq!(mirror.prop["angleOfIncidence"].expression(), Some("x * 10"));
    assert_eq!(mirror.prop["distanceToNext"].number(), Some(50.0));
}

#[test]
fn non_equation_properties_are_dropped() {
    let element: ElementJson = serde_json::from_str(
        r#"{"type":"mirror","prop":{"startOptic":true,"endOptic":false,"tags":[1,2],"radiusOfCurvature":"2 * pi"}}"#,
    )
    .unwrap();
    assert_eq!(
        element.prop.keys().collect::<Vec<_>>(),
        vec!["radiusOfCurvature"]
    );
    assert_eq!(element.prop["radiusOfCurvature"].expression(), Some("2 * pi"));
}

#[test]
fn snapshot_round_trips() {
    let snapshot = SystemSnapshot::new(vec![
        ElementJson::new(ElementKind::Lens, "L1")
            .with_prop("focalLength", "100 + x")
            .with_prop("distanceToNext", 20.0),
        ElementJson::new(ElementKind::Screen, "S"),
    ]);
    let message = WorkerMessage::System(snapshot);
    let decoded: WorkerMessage = decode(&encode(&message).unwrap()).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn replies_are_tagged_by_type() {
    let reply = WorkerReply::Abcd {
        element: "L1".to_string(),
        sagittal: Matrix2x2::thin(-0.01),
        tangential: Matrix2x2::IDENTITY,
    };
    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({
            "type": "abcd",
            "element": "L1",
            "sagittal": [[1.0, 0.0], [-0.01, 1.0]],
            "tangential": [[1.0, 0.0], [0.0, 1.0]],
        })
    );
    assert_eq!(
        serde_json::to_value(WorkerReply::Pong).unwrap(),
        json!({ "type": "pong" })
    );
}

#[test]
fn malformed_and_oversized_messages_are_errors() {
    assert!(matches!(
        decode::<WorkerMessage>(r#"{"type":"launch"}"#),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(
        decode::<WorkerMessage>("not json"),
        Err(ProtocolError::Malformed(_))
    ));
    let huge = format!(r#"{{"type":"test","pad":"{}"}}"#, "a".repeat(MAX_MESSAGE_BYTES));
    assert!(matches!(
        decode::<WorkerMessage>(&huge),
        Err(ProtocolError::TooLarge(_))
    ));
}
