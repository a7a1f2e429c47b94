// Rubemacro — HTTP step executor (one authenticated POST per step)

use crate::error::StepError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Issues one HTTP call for a step and returns the parsed response body.
/// A trait so the runner can be driven against a fake in tests.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, url: &str, args: &Value, auth_token: &str)
        -> Result<Value, StepError>;
}

/// Joins the API base URL and a step path.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Production executor on reqwest. No retries: any failure is fatal to the
/// run at the current step.
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StepExecutor for HttpExecutor {
    async fn execute(
        &self,
        url: &str,
        args: &Value,
        auth_token: &str,
    ) -> Result<Value, StepError> {
        tracing::debug!(url = %url, "Sending step request");

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", auth_token))
            .header("Content-Type", "application/json")
            .json(args)
            .send()
            .await
            .map_err(StepError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "could not read body".to_string());
            return Err(StepError::HttpStatus { status, body });
        }

        let body: Value = response.json().await.map_err(StepError::ResponseParse)?;
        tracing::debug!(status = %status, "Step response received");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_resolve_url_trims_trailing_slash() {
        assert_eq!(
            resolve_url("https://api.rube.app/", "/api/v1/session"),
            "https://api.rube.app/api/v1/session"
        );
        assert_eq!(
            resolve_url("https://api.rube.app", "/api/v1/session"),
            "https://api.rube.app/api/v1/session"
        );
    }

    #[tokio::test]
    async fn test_execute_posts_auth_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/session"))
            .and(header("Authorization", "Bearer tok"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({"k": "v"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let exec = HttpExecutor::new(5).unwrap();
        let url = resolve_url(&server.uri(), "/api/v1/session");
        let body = exec.execute(&url, &json!({"k": "v"}), "tok").await.unwrap();
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_non_2xx_is_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let exec = HttpExecutor::new(5).unwrap();
        let url = resolve_url(&server.uri(), "/x");
        let err = exec.execute(&url, &json!({}), "tok").await.unwrap_err();
        match err {
            StepError::HttpStatus { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_response_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let exec = HttpExecutor::new(5).unwrap();
        let url = resolve_url(&server.uri(), "/x");
        let err = exec.execute(&url, &json!({}), "tok").await.unwrap_err();
        assert!(matches!(err, StepError::ResponseParse(_)));
    }
}
