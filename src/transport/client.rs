//! HTTP client for the human query API.
//!
//! Used by the agent side to submit queries against a remote human-facing
//! service, and by responder tooling (the console responder, tests) to list
//! and answer them. Includes the poll-based wait fallback for deployments
//! where no callback can reach the waiting process.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::human_input::{AwaitOutcome, PendingQuery, QueryRequest};
use crate::transport::server::{CreateQueryResponse, HealthBody, RespondRequest, ResponseCheck};

/// Client for a remote human query API
#[derive(Debug, Clone)]
pub struct HumanApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HumanApiClient {
    /// Create a client for the API at `base_url` with the given per-request
    /// timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|_| Error::InvalidTarget(base_url.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    /// Submit a query and return its id
    pub async fn submit_query(&self, request: &QueryRequest) -> Result<String> {
        let url = self.join("/query")?;
        debug!("Submitting query to {}", url);

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Http(format!("query submission failed: {}", e)))?;

        let body: CreateQueryResponse = Self::parse_success(response).await?;
        Ok(body.query_id)
    }

    /// All queries waiting for an answer
    pub async fn pending_queries(&self) -> Result<Vec<PendingQuery>> {
        let url = self.join("/pending-queries")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("pending listing failed: {}", e)))?;
        Self::parse_success(response).await
    }

    /// Submit a human answer for `query_id`.
    ///
    /// A late or duplicate submission is rejected by the server; the
    /// rejection is surfaced as [`Error::AlreadyResolved`].
    pub async fn respond(&self, query_id: &str, answer: &str) -> Result<()> {
        let url = self.join(&format!("/respond/{}", query_id))?;
        debug!("Submitting answer for query {} to {}", query_id, url);

        let response = self
            .client
            .post(url)
            .json(&RespondRequest {
                response: answer.to_string(),
            })
            .send()
            .await
            .map_err(|e| Error::Http(format!("answer submission failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(Error::NotFound(query_id.to_string()))
        } else if status == reqwest::StatusCode::BAD_REQUEST {
            Err(Error::AlreadyResolved)
        } else {
            Err(Error::Http(format!("unexpected status {}", status)))
        }
    }

    /// Check whether `query_id` has been answered yet
    pub async fn check_response(&self, query_id: &str) -> Result<Option<String>> {
        let url = self.join(&format!("/query/{}/response", query_id))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("response check failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(query_id.to_string()));
        }

        let body: ResponseCheck = Self::parse_success(response).await?;
        Ok(body.response)
    }

    /// Poll until `query_id` is answered or `deadline` elapses.
    ///
    /// This is the fallback for transports without a reachable callback
    /// target: the answer is durably recorded on the server either way, and
    /// an abandoned query is expired by the server's own sweeper.
    pub async fn wait_for_response(
        &self,
        query_id: &str,
        deadline: Duration,
        poll_interval: Duration,
    ) -> Result<AwaitOutcome> {
        let deadline_at = Instant::now() + deadline;

        loop {
            if let Some(answer) = self.check_response(query_id).await? {
                return Ok(AwaitOutcome::Answered(answer));
            }

            let now = Instant::now();
            if now >= deadline_at {
                debug!("Poll wait for query {} timed out", query_id);
                return Ok(AwaitOutcome::TimedOut);
            }
            sleep(poll_interval.min(deadline_at - now)).await;
        }
    }

    /// Service health and per-state query counts
    pub async fn health(&self) -> Result<HealthBody> {
        let url = self.join("/health")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("health check failed: {}", e)))?;
        Self::parse_success(response).await
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Http(format!("Failed to build URL for {}: {}", path, e)))
    }

    async fn parse_success<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("unexpected status {}", status)));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Http(format!("Failed to parse response: {}", e)))
    }
}
