// Copyright 2025 LinkRPC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tests for the protocol module
//!
//! These tests cover envelope construction, id generation, the wire field
//! names and envelope validation.

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::transport::JsonCodec;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_request_creation() {
        let req = Request::new("echo", vec![json!("hi")]);
        assert_eq!(req.method, "echo");
        assert_eq!(req.params, vec![json!("hi")]);
        assert!(!req.id.is_empty());
        assert!(req.timestamp > 0);
    }

    #[test]
    fn test_request_id_uniqueness() {
        let ids: HashSet<_> = (0..1000).map(|_| Request::new("test", vec![]).id).collect();
        assert_eq!(ids.len(), 1000, "All message ids should be unique");
    }

    #[test]
    fn test_request_id_uniqueness_under_stress() {
        use std::sync::{Arc, Mutex};
        use std::thread;

        let ids = Arc::new(Mutex::new(HashSet::new()));
        let mut handles = vec![];

        for _ in 0..8 {
            let ids = Arc::clone(&ids);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    let id = generate_message_id();
                    assert!(ids.lock().unwrap().insert(id.clone()), "Duplicate id: {}", id);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ids.lock().unwrap().len(), 4000);
    }

    #[test]
    fn test_message_id_is_uuid() {
        let id = generate_message_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }

    #[test]
    fn test_request_wire_field_names() {
        let req = Request::with_id("abc", "calculate", vec![json!([3, 4])]);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["messageId"], "abc");
        assert_eq!(value["method"], "calculate");
        assert_eq!(value["params"], json!([[3, 4]]));
        assert!(value["timestamp"].is_u64());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_request_params_default_to_empty() {
        let req: Request =
            serde_json::from_value(json!({"messageId": "x", "timestamp": 1, "method": "m"})).unwrap();
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_request_validation() {
        assert!(Request::with_id("a", "echo", vec![]).validate().is_ok());
        assert!(matches!(
            Request::with_id("a", "", vec![]).validate(),
            Err(LinkrpcError::Decode(_))
        ));
        assert!(matches!(
            Request::with_id("", "echo", vec![]).validate(),
            Err(LinkrpcError::Decode(_))
        ));
    }

    #[test]
    fn test_response_success() {
        let resp = Response::success("a", json!({"result": "ok"}));
        assert!(resp.success);
        assert_eq!(resp.id, "a");
        assert_eq!(resp.result, Some(json!({"result": "ok"})));
        assert!(resp.error.is_none());
        assert!(resp.validate().is_ok());
    }

    #[test]
    fn test_response_error() {
        let resp = Response::error("b", "something failed");
        assert!(!resp.success);
        assert_eq!(resp.error, Some("something failed".to_string()));
        assert!(resp.result.is_none());
        assert!(resp.validate().is_ok());
    }

    #[test]
    fn test_error_response_omits_result_on_the_wire() {
        let value = serde_json::to_value(Response::error("b", "nope")).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["success"], false);
        assert_eq!(value["messageId"], "b");
    }

    #[test]
    fn test_null_result_survives_serialization() {
        let resp = Response::success("n", serde_json::Value::Null);
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("\"result\":null"));
        let back: Response = serde_json::from_str(&text).unwrap();
        assert_eq!(back.result, Some(serde_json::Value::Null));
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_response_validation_rejects_inconsistent_flag() {
        let resp: Response = serde_json::from_value(
            json!({"messageId": "x", "timestamp": 1, "error": "bad", "success": true}),
        )
        .unwrap();
        assert!(matches!(resp.validate(), Err(LinkrpcError::Decode(_))));
    }

    #[test]
    fn test_response_validation_rejects_missing_result_and_error() {
        let resp: Response =
            serde_json::from_value(json!({"messageId": "x", "timestamp": 1, "success": true})).unwrap();
        assert_eq!(resp.result, None);
        assert!(matches!(resp.validate(), Err(LinkrpcError::Decode(_))));

        let text = r#"{"messageId":"x","timestamp":1,"success":true}"#;
        assert!(matches!(
            JsonCodec::decode_response(text.as_bytes()),
            Err(LinkrpcError::Decode(_))
        ));
    }

    #[test]
    fn test_response_validation_rejects_result_and_error() {
        let resp: Response = serde_json::from_value(
            json!({"messageId": "x", "timestamp": 1, "result": 1, "error": "bad", "success": false}),
        )
        .unwrap();
        assert!(matches!(resp.validate(), Err(LinkrpcError::Decode(_))));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(Response::success("a", json!(7)).into_result().unwrap(), json!(7));
        match Response::error("a", "Unknown method: ghost").into_result() {
            Err(LinkrpcError::Application(msg)) => assert_eq!(msg, "Unknown method: ghost"),
            other => panic!("expected application error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_outcome() {
        assert!(Response::from_outcome("a", Ok(json!(1))).success);
        let failed = Response::from_outcome("a", Err("boom".to_string()));
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
