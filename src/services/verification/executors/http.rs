//! HTTP strategy executor.
//!
//! Issues a request and compares the status code, plus an optional regex
//! over the response body.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::models::{Task, VerificationStrategy};
use crate::domain::ForemanResult;

use super::super::registry::{ExecutionContext, StrategyExecution, StrategyExecutor};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpExecutor;

#[async_trait]
impl StrategyExecutor for HttpExecutor {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        strategy: &VerificationStrategy,
        _task: &Task,
    ) -> ForemanResult<StrategyExecution> {
        let VerificationStrategy::Http {
            url,
            method,
            expect_status,
            body_pattern,
            common,
        } = strategy
        else {
            return Ok(StrategyExecution::failed("wrong strategy kind for http executor"));
        };

        let timeout = common
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => {
                return Ok(StrategyExecution::failed(format!(
                    "failed to build http client: {err}"
                )))
            }
        };

        let method = method.as_deref().unwrap_or("GET");
        let method = match method.parse::<reqwest::Method>() {
            Ok(method) => method,
            Err(_) => {
                return Ok(StrategyExecution::failed(format!(
                    "invalid http method: {method}"
                )))
            }
        };

        let started = std::time::Instant::now();
        let response = match client.request(method.clone(), url).send().await {
            Ok(response) => response,
            Err(err) => {
                // Connection errors are the transient class here.
                let execution =
                    StrategyExecution::failed(format!("{method} {url} failed: {err}"));
                return Ok(if err.is_timeout() || err.is_connect() {
                    execution.transient()
                } else {
                    execution
                });
            }
        };

        let status = response.status().as_u16();
        if status != *expect_status {
            return Ok(StrategyExecution::failed(format!(
                "{method} {url} returned {status}, expected {expect_status}"
            ))
            .with_duration(started.elapsed()));
        }

        if let Some(pattern) = body_pattern {
            let re = match Regex::new(pattern) {
                Ok(re) => re,
                Err(err) => {
                    return Ok(StrategyExecution::failed(format!(
                        "invalid body pattern `{pattern}`: {err}"
                    )))
                }
            };
            let body = response.text().await.unwrap_or_default();
            if !re.is_match(&body) {
                return Ok(StrategyExecution::failed(format!(
                    "{method} {url} body does not match `{pattern}`"
                ))
                .with_duration(started.elapsed()));
            }
        }

        Ok(
            StrategyExecution::passed(format!("{method} {url} returned {status}"))
                .with_duration(started.elapsed()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StrategyCommon;
    use crate::services::verification::test_support::context_for;

    fn strategy(url: &str, expect_status: u16, body_pattern: Option<&str>) -> VerificationStrategy {
        VerificationStrategy::Http {
            url: url.to_string(),
            method: None,
            expect_status,
            body_pattern: body_pattern.map(String::from),
            common: StrategyCommon::required(),
        }
    }

    #[tokio::test]
    async fn status_and_body_match() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("ops.health", "health");

        let url = format!("{}/health", server.url());
        let result = HttpExecutor
            .execute(&ctx, &strategy(&url, 200, Some(r#""status":"ok""#)), &task)
            .await
            .unwrap();
        assert!(result.success, "output: {:?}", result.output);
    }

    #[tokio::test]
    async fn unexpected_status_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("ops.health", "health");

        let url = format!("{}/health", server.url());
        let result = HttpExecutor
            .execute(&ctx, &strategy(&url, 200, None), &task)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn body_mismatch_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body("degraded")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("ops.health", "health");

        let url = format!("{}/health", server.url());
        let result = HttpExecutor
            .execute(&ctx, &strategy(&url, 200, Some("healthy")), &task)
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_for(dir.path());
        let task = Task::new("ops.health", "health");

        // A port nothing listens on.
        let result = HttpExecutor
            .execute(
                &ctx,
                &strategy("http://127.0.0.1:9/health", 200, None),
                &task,
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.transient);
    }
}
