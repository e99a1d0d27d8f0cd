use catalyst_news::{plan_from_payload, Error};

#[test]
fn test_plan_collects_targets_across_commits() {
    let payload = r#"[
        {
            "id": "4f2a1c9",
            "message": "feat: checkout flow",
            "added": ["functions/checkout/index.js"],
            "modified": ["functions/cart/lib/db.js", "docs/setup.md"]
        },
        {
            "id": "9b0d7e2",
            "message": "ui polish",
            "modified": ["client/src/app.js", "functions/checkout/handler.js"]
        }
    ]"#;

    let plan = plan_from_payload(payload).expect("payload should classify");
    assert_eq!(plan.functions, vec!["checkout", "cart"]);
    assert!(plan.client);
}

#[test]
fn test_plan_tolerates_null_change_arrays() {
    let payload = r#"[
        {"id": "c1", "message": "noop", "added": null, "removed": null},
        {"id": "c2", "message": "feat", "added": ["functions/foo/index.js"]}
    ]"#;

    let plan = plan_from_payload(payload).expect("payload should classify");
    assert_eq!(plan.functions, vec!["foo"]);
    assert!(!plan.client);
}

#[test]
fn test_plan_rejects_non_array_payload() {
    let err = plan_from_payload(r#"{"id": "c1"}"#).expect_err("payload should be rejected");
    assert!(matches!(err, Error::PayloadShapeError(_)));
}

#[test]
fn test_plan_serializes_for_pipeline_consumers() {
    let payload = r#"[{"id": "c1", "message": "feat", "added": ["functions/foo/index.js"]}]"#;
    let plan = plan_from_payload(payload).expect("payload should classify");

    let json = serde_json::to_string(&plan).expect("plan should serialize");
    assert_eq!(json, r#"{"functions":["foo"],"client":false}"#);
}
