//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd project team.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ladle::batch::{
    LdBatchClient, LdBatchRequest, LdBatchResult, LdHttpResponse, LdSleeper, LdTransport,
};
use ladle::errors::LdErrorKind;
use serde_json::{json, Value};

type Reply = Result<LdHttpResponse, String>;

/// Plays back scripted replies, or echoes the payload once the script runs out.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    payloads: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            payloads: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

impl LdTransport for ScriptedTransport {
    fn post_json(
        &self,
        _url: &str,
        _query: &[(String, String)],
        _headers: &[(String, String)],
        payload: &Value,
        _timeout: Duration,
    ) -> Result<LdHttpResponse, String> {
        self.payloads.lock().unwrap().push(payload.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(LdHttpResponse::new(200, payload.to_string())),
        }
    }

    fn get(&self, _url: &str, _timeout: Duration) -> Result<LdHttpResponse, String> {
        Err("not scripted".to_string())
    }
}

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl LdSleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn client(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> LdBatchClient {
    LdBatchClient::new(transport)
        .with_sleeper(sleeper)
        .with_backoff_unit(Duration::from_millis(1))
}

fn items(count: usize) -> Vec<Value> {
    (0..count).map(|i| json!(i)).collect()
}

#[test]
fn test_chunks_are_sent_in_order() {
    let transport = ScriptedTransport::new(Vec::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let result = client(transport.clone(), sleeper)
        .call(&LdBatchRequest::new("http://svc"), &items(7), 3)
        .unwrap();

    assert_eq!(transport.calls(), 3);
    assert_eq!(result, LdBatchResult::Flat(items(7)));
    let payloads = transport.payloads.lock().unwrap();
    assert_eq!(payloads[2], json!([6]));
}

#[test]
fn test_empty_input_makes_no_calls() {
    let transport = ScriptedTransport::new(Vec::new());
    let sleeper = Arc::new(RecordingSleeper::default());
    let result = client(transport.clone(), sleeper)
        .call(&LdBatchRequest::new("http://svc"), &[], 10)
        .unwrap();
    assert_eq!(result, LdBatchResult::Empty);
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_server_errors_back_off_exponentially() {
    let transport = ScriptedTransport::new(vec![
        Ok(LdHttpResponse::new(503, "busy")),
        Err("connection reset".to_string()),
        Ok(LdHttpResponse::new(500, "oops")),
        Ok(LdHttpResponse::new(200, "[\"done\"]")),
    ]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let result = client(transport.clone(), sleeper.clone())
        .call(&LdBatchRequest::new("http://svc"), &items(1), 10)
        .unwrap();

    assert_eq!(result.into_values(), vec![json!("done")]);
    assert_eq!(transport.calls(), 4);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4)
        ]
    );
}

#[test]
fn test_exhausted_retries_report_no_response() {
    let replies = (0..3).map(|_| Ok(LdHttpResponse::new(502, ""))).collect();
    let transport = ScriptedTransport::new(replies);
    let sleeper = Arc::new(RecordingSleeper::default());
    let err = client(transport.clone(), sleeper.clone())
        .with_retries(2)
        .call(&LdBatchRequest::new("http://svc"), &items(1), 10)
        .unwrap_err();

    assert!(matches!(err.kind(), LdErrorKind::NoResponse { attempts: 3, .. }));
    assert_eq!(transport.calls(), 3);
    assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
}

#[test]
fn test_final_transport_failure_is_transport_error() {
    let replies = (0..2).map(|_| Err("refused".to_string())).collect();
    let transport = ScriptedTransport::new(replies);
    let sleeper = Arc::new(RecordingSleeper::default());
    let err = client(transport, sleeper)
        .with_retries(1)
        .send(&LdBatchRequest::new("http://svc"), &json!([1]))
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        LdErrorKind::TransportError { message, .. } if message == "refused"
    ));
}

#[test]
fn test_client_errors_are_not_retried() {
    let transport = ScriptedTransport::new(vec![Ok(LdHttpResponse::new(404, "no such model"))]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let err = client(transport.clone(), sleeper.clone())
        .call(&LdBatchRequest::new("http://svc"), &items(4), 2)
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        LdErrorKind::RemoteClientError { status: 404, body, .. } if body == "no such model"
    ));
    assert_eq!(transport.calls(), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[test]
fn test_columnar_chunks_become_rows() {
    let transport = ScriptedTransport::new(vec![
        Ok(LdHttpResponse::new(200, r#"{"columns": ["label"], "data": [["a"], ["b"]]}"#)),
        Ok(LdHttpResponse::new(200, r#"{"columns": ["label"], "data": [["c"]]}"#)),
    ]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let result = client(transport, sleeper)
        .call(&LdBatchRequest::new("http://svc"), &items(3), 2)
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.into_values()[2], json!({"label": "c"}));
}

#[test]
fn test_unexpected_payload_is_rejected() {
    let transport = ScriptedTransport::new(vec![Ok(LdHttpResponse::new(200, "\"text\""))]);
    let sleeper = Arc::new(RecordingSleeper::default());
    let err = client(transport, sleeper)
        .call(&LdBatchRequest::new("http://svc"), &items(1), 1)
        .unwrap_err();
    assert!(matches!(err.kind(), LdErrorKind::UnexpectedResponseFormat { .. }));
}
