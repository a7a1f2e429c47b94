use rubemacro::binder::SidTokenBinder;
use rubemacro::config::ApiConfig;
use rubemacro::error::StepError;
use rubemacro::executor::HttpExecutor;
use rubemacro::runner::{MacroRunner, RunState};
use rubemacro::store;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runner_for(server: &MockServer) -> MacroRunner {
    let config = ApiConfig {
        base_url: server.uri(),
        auth_token: "test-token".to_string(),
        timeout_secs: 5,
    };
    let executor = Arc::new(HttpExecutor::new(config.timeout_secs).unwrap());
    MacroRunner::new(config, executor, Box::new(SidTokenBinder))
}

fn write_macro(dir: &std::path::Path, steps: serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("macro.json");
    std::fs::write(&path, json!({ "steps": steps }).to_string()).unwrap();
    path
}

#[tokio::test]
async fn test_full_run_threads_session_through_steps() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/session"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"data": {"session": {"id": "abc123"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Later steps must carry the extracted session id in their bodies.
    Mock::given(method("POST"))
        .and(path("/api/v1/connections/check"))
        .and(body_partial_json(json!({"session_id": "abc123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"connections": []})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/tools/run"))
        .and(body_partial_json(json!({"session_id": "abc123", "tool": "GMAIL"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let macro_path = write_macro(
        tmp.path(),
        json!([
            {"name": "NEW_SESSION", "path": "/api/v1/session", "args": "{}"},
            {"name": "CHECK_ACTIVE_CONNECTION", "path": "/api/v1/connections/check",
             "args": "{\"session_id\": \"$SID\"}"},
            {"name": "RUN_TOOL", "path": "/api/v1/tools/run",
             "args": "{\"session_id\": \"$SID\", \"tool\": \"GMAIL\"}"}
        ]),
    );
    let mac = store::load_or_create(&macro_path).unwrap();

    let mut runner = runner_for(&server);
    let report = runner.run(&mac).await.unwrap();

    assert_eq!(
        report.completed,
        vec!["NEW_SESSION", "CHECK_ACTIVE_CONNECTION", "RUN_TOOL"]
    );
    assert_eq!(runner.state(), RunState::Done);
}

#[tokio::test]
async fn test_step_two_failure_halts_before_step_three() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/one"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": {"id": "s-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;

    // Step three must never be invoked once step two fails.
    Mock::given(method("POST"))
        .and(path("/three"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let macro_path = write_macro(
        tmp.path(),
        json!([
            {"name": "NEW_SESSION", "path": "/one", "args": "{}"},
            {"name": "SECOND", "path": "/two", "args": "{\"session_id\": \"$SID\"}"},
            {"name": "THIRD", "path": "/three", "args": "{}"}
        ]),
    );
    let mac = store::load_or_create(&macro_path).unwrap();

    let mut runner = runner_for(&server);
    let err = runner.run(&mac).await.unwrap_err();

    assert_eq!(err.step, "SECOND");
    assert!(err.url.ends_with("/two"));
    assert_eq!(err.args, json!({"session_id": "s-1"}).to_string());
    match err.source {
        StepError::HttpStatus { status, ref body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "internal error");
        }
        ref other => panic!("expected HttpStatus, got {:?}", other),
    }
    assert_eq!(runner.state(), RunState::Failed);
}

#[tokio::test]
async fn test_missing_session_halts_run_before_second_step() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/connections/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    // The seeded default macro: NEW_SESSION then CHECK_ACTIVE_CONNECTION.
    let tmp = tempfile::tempdir().unwrap();
    let macro_path = tmp.path().join("macro.json");
    let mac = store::load_or_create(&macro_path).unwrap();
    assert!(macro_path.exists());

    let mut runner = runner_for(&server);
    let err = runner.run(&mac).await.unwrap_err();

    assert_eq!(err.step, "NEW_SESSION");
    assert!(matches!(err.source, StepError::SessionNotFound));
    assert_eq!(runner.state(), RunState::Failed);
}
