use proptest::prelude::*;
use sdk::errors::{ClientError, ClientErrorExt, TransportError};
use sdk::types::{ResearchStatus, Snapshot};
use serde_json::{json, Value};

// Every error the client can show carries a non-empty, static hint
proptest! {
    #[test]
    fn test_error_user_hint_completeness(message in "\\PC*", status in 100u16..600) {
        let errs = vec![
            ClientError::from(TransportError::Network(message.clone())),
            ClientError::from(TransportError::Status { status, body: message.clone() }),
            ClientError::from(TransportError::MalformedResponse(message.clone())),
            ClientError::InvalidState(message.clone()),
            ClientError::Config(message.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            if message.len() > 8 {
                prop_assert!(!hint.contains(&message));
            }
            prop_assert_eq!(err.is_recoverable(), err.is_transport());
        }
    }
}

// Status strings the client has never seen still decode, and only the three
// known terminal strings stop a session
proptest! {
    #[test]
    fn test_any_status_string_decodes(raw in "[a-z_]{0,24}") {
        let snapshot: Snapshot = serde_json::from_value(json!({ "status": raw })).unwrap();
        let terminal = ["completed", "error", "cancelled"].contains(&raw.as_str());
        prop_assert_eq!(snapshot.status.is_terminal(), terminal);
        if snapshot.status != ResearchStatus::Unknown {
            prop_assert_eq!(snapshot.status.as_str(), raw.as_str());
        }
    }
}

fn optional(value: Value) -> impl Strategy<Value = Option<Value>> {
    prop_oneof![Just(None), Just(Some(Value::Null)), Just(Some(value))]
}

// Every optional snapshot field may be missing or null
proptest! {
    #[test]
    fn test_snapshot_fields_may_be_missing_or_null(
        progress in optional(json!(42)),
        plan in optional(json!("## plan")),
        steps in optional(json!([{ "title": "step", "search_results": null }])),
        report in optional(json!("# report")),
        error in optional(json!("boom")),
        current_step in optional(json!("searching")),
    ) {
        let mut body = serde_json::Map::new();
        body.insert("status".into(), json!("researching"));
        for (key, value) in [
            ("progress", &progress),
            ("plan", &plan),
            ("research_steps", &steps),
            ("report", &report),
            ("error", &error),
            ("current_step", &current_step),
        ] {
            if let Some(value) = value {
                body.insert(key.into(), value.clone());
            }
        }

        let snapshot: Snapshot = serde_json::from_value(Value::Object(body)).unwrap();
        prop_assert_eq!(snapshot.status, ResearchStatus::Researching);
        prop_assert_eq!(snapshot.progress, if progress.as_ref().is_some_and(|v| !v.is_null()) { 42 } else { 0 });
        prop_assert_eq!(snapshot.plan().is_some(), plan.as_ref().is_some_and(|v| !v.is_null()));
        prop_assert_eq!(snapshot.steps().is_some(), steps.as_ref().is_some_and(|v| !v.is_null()));
        prop_assert_eq!(snapshot.report().is_some(), report.as_ref().is_some_and(|v| !v.is_null()));
    }
}
