// SPDX-License-Identifier: MIT
//! Job queue client (SQS-compatible JSON protocol).
//!
//! At-least-once delivery is the contract: a received message stays
//! invisible for the visibility window and is deleted only after the whole
//! pipeline succeeds. Anything less than full success leaves the message in
//! place for redelivery. The wire protocol is the `AmazonSQS.*` JSON
//! target-header dialect, which queue emulators also speak.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ─── Job payload ──────────────────────────────────────────────────────────────

/// One review request, as produced by the merge-request webhook side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewJob {
    pub project_id: u64,
    pub merge_request_iid: u64,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub jira_ticket_key: Option<String>,
}

impl ReviewJob {
    /// Decode a message body. Missing or zero identifiers are malformed:
    /// such a job can never be processed and must not be retried forever
    /// by pretending it might.
    pub fn from_body(body: &str) -> Result<Self, String> {
        let job: ReviewJob =
            serde_json::from_str(body).map_err(|e| format!("undecodable job body: {e}"))?;
        if job.project_id == 0 || job.merge_request_iid == 0 {
            return Err("job is missing project_id or merge_request_iid".to_string());
        }
        Ok(job)
    }
}

/// A raw queue delivery: opaque body plus the receipt handle that names
/// this delivery for acknowledgment.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

/// A queue supporting long-poll receive and per-delivery acknowledgment.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Long-poll for up to `max_messages`, waiting up to `wait_secs`.
    /// An empty batch is a normal outcome.
    async fn receive(&self, max_messages: u32, wait_secs: u32) -> anyhow::Result<Vec<QueueMessage>>;

    /// Acknowledge one delivery so it is never redelivered.
    async fn acknowledge(&self, receipt_handle: &str) -> anyhow::Result<()>;
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReceiveMessageResponse {
    #[serde(rename = "Messages", default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "Body")]
    body: Option<String>,
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: Option<String>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct SqsQueue {
    queue_url: String,
    client: reqwest::Client,
}

/// Long polling holds the connection open for the full wait window, so the
/// HTTP timeout must comfortably exceed whatever wait is configured.
fn client_timeout(receive_wait_secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(receive_wait_secs + 20)
}

impl SqsQueue {
    pub fn new(queue_url: &str, receive_wait_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(client_timeout(receive_wait_secs))
            .build()?;
        Ok(Self {
            queue_url: queue_url.to_string(),
            client,
        })
    }

    async fn call(&self, target: &str, payload: &serde_json::Value) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&self.queue_url)
            .header("X-Amz-Target", format!("AmazonSQS.{target}"))
            .header("Content-Type", "application/x-amz-json-1.0")
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl JobQueue for SqsQueue {
    async fn receive(&self, max_messages: u32, wait_secs: u32) -> anyhow::Result<Vec<QueueMessage>> {
        let body = self
            .call(
                "ReceiveMessage",
                &serde_json::json!({
                    "QueueUrl": self.queue_url,
                    "MaxNumberOfMessages": max_messages,
                    "WaitTimeSeconds": wait_secs,
                }),
            )
            .await?;

        let response: ReceiveMessageResponse = serde_json::from_str(&body)?;
        let mut messages = Vec::with_capacity(response.messages.len());
        for wire in response.messages {
            match (wire.body, wire.receipt_handle) {
                (Some(body), Some(receipt_handle)) => messages.push(QueueMessage {
                    body,
                    receipt_handle,
                }),
                _ => warn!("dropping queue message without body or receipt handle"),
            }
        }
        debug!(count = messages.len(), "received queue batch");
        Ok(messages)
    }

    async fn acknowledge(&self, receipt_handle: &str) -> anyhow::Result<()> {
        self.call(
            "DeleteMessage",
            &serde_json::json!({
                "QueueUrl": self.queue_url,
                "ReceiptHandle": receipt_handle,
            }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_job_decodes() {
        let body = r#"{
            "project_id": 42,
            "merge_request_iid": 7,
            "source_branch": "feature/retries",
            "target_branch": "main",
            "jira_ticket_key": "TEST-123"
        }"#;
        let job = ReviewJob::from_body(body).unwrap();
        assert_eq!(job.project_id, 42);
        assert_eq!(job.merge_request_iid, 7);
        assert_eq!(job.jira_ticket_key.as_deref(), Some("TEST-123"));
    }

    #[test]
    fn branches_and_ticket_are_optional() {
        let job = ReviewJob::from_body(r#"{"project_id": 1, "merge_request_iid": 2}"#).unwrap();
        assert!(job.source_branch.is_none());
        assert!(job.jira_ticket_key.is_none());
    }

    #[test]
    fn null_ticket_key_decodes_as_absent() {
        let job = ReviewJob::from_body(
            r#"{"project_id": 1, "merge_request_iid": 2, "jira_ticket_key": null}"#,
        )
        .unwrap();
        assert!(job.jira_ticket_key.is_none());
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(ReviewJob::from_body("not json").is_err());
        assert!(ReviewJob::from_body(r#"{"merge_request_iid": 2}"#).is_err());
        assert!(ReviewJob::from_body(r#"{"project_id": 0, "merge_request_iid": 2}"#).is_err());
    }

    #[test]
    fn client_timeout_always_exceeds_the_poll_wait() {
        assert_eq!(client_timeout(20).as_secs(), 40);
        assert!(client_timeout(0).as_secs() > 0);
        // A wait longer than the old fixed 40s ceiling still leaves margin.
        assert!(client_timeout(60).as_secs() > 60);
    }

    #[test]
    fn receive_response_tolerates_empty_and_partial_messages() {
        let empty: ReceiveMessageResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.messages.is_empty());

        let partial: ReceiveMessageResponse = serde_json::from_str(
            r#"{"Messages": [{"Body": "x"}, {"Body": "y", "ReceiptHandle": "rh-1"}]}"#,
        )
        .unwrap();
        assert_eq!(partial.messages.len(), 2);
        assert!(partial.messages[0].receipt_handle.is_none());
        assert_eq!(partial.messages[1].receipt_handle.as_deref(), Some("rh-1"));
    }
}
