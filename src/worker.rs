// SPDX-License-Identifier: MIT
//! Queue consumer and per-job review pipeline.
//!
//! The loop long-polls the job queue, runs each message through the full
//! pipeline, and acknowledges only complete successes. A failed stage logs
//! and leaves the message for redelivery after its visibility deadline; the
//! pipeline is built to tolerate re-running a job from scratch.
//!
//! Shutdown is cooperative: a watch-channel flag is observed between polls
//! and between messages, never mid-pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::diff::DiffDocument;
use crate::error::StageError;
use crate::gitlab::RepoHost;
use crate::jira::{IssueContext, IssueTracker};
use crate::lint;
use crate::model::{ModelBackend, Reviewer};
use crate::prompt;
use crate::queue::{JobQueue, QueueMessage, ReviewJob};

/// Comment posted instead of a review when the diff exceeds the size
/// ceiling.
pub const OVERSIZED_DIFF_NOTICE: &str = "⚠️ The diff for this merge request is too large for \
    automated review. Please consider breaking it down into smaller changes.";

/// How a successfully handled job concluded. Both variants acknowledge the
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// A review was generated and posted.
    Reviewed,
    /// The diff was over the size ceiling; the notice was posted instead
    /// and no model was invoked.
    OversizedNotice,
}

pub struct Worker {
    config: Arc<WorkerConfig>,
    queue: Arc<dyn JobQueue>,
    host: Arc<dyn RepoHost>,
    tracker: Option<Arc<dyn IssueTracker>>,
    reviewer: Reviewer<Arc<dyn ModelBackend>>,
}

impl Worker {
    pub fn new(
        config: Arc<WorkerConfig>,
        queue: Arc<dyn JobQueue>,
        host: Arc<dyn RepoHost>,
        tracker: Option<Arc<dyn IssueTracker>>,
        backend: Arc<dyn ModelBackend>,
    ) -> Self {
        let reviewer = Reviewer::new(
            backend,
            config.primary_model.clone(),
            config.fallback_model.clone(),
        );
        Self {
            config,
            queue,
            host,
            tracker,
            reviewer,
        }
    }

    /// Consume until the shutdown flag flips. In-flight work finishes; the
    /// flag is only observed between polls and between messages.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = %self.config.queue_url,
            primary = %self.config.primary_model.id,
            fallback = %self.config.fallback_model.id,
            "worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                _ = shutdown.changed() => continue,
                result = self.queue.receive(
                    self.config.receive_batch_size,
                    self.config.receive_wait_secs as u32,
                ) => result,
            };

            let messages = match batch {
                Ok(messages) => messages,
                Err(e) => {
                    error!(err = %e, "queue receive failed");
                    self.idle(&mut shutdown).await;
                    continue;
                }
            };

            if messages.is_empty() {
                debug!("no messages received, waiting");
                self.idle(&mut shutdown).await;
                continue;
            }
            info!(count = messages.len(), "received message batch");

            for message in &messages {
                if *shutdown.borrow() {
                    break;
                }
                self.handle_message(message).await;
            }
        }

        info!("worker shutting down");
    }

    /// Process one delivery and decide its acknowledgment.
    async fn handle_message(&self, message: &QueueMessage) {
        match self.process_message(message).await {
            Ok(outcome) => {
                debug!(?outcome, "job completed");
                match self.queue.acknowledge(&message.receipt_handle).await {
                    Ok(()) => debug!("message acknowledged"),
                    Err(e) => {
                        // Redelivery of a finished job is the accepted cost
                        // of at-least-once delivery.
                        warn!(err = %e, "acknowledge failed, message will be redelivered");
                    }
                }
            }
            Err(e) => {
                error!(err = %e, "job failed, leaving message for redelivery");
            }
        }
    }

    /// The review pipeline for one job. Any `Err` leaves the message
    /// unacknowledged.
    pub async fn process_message(
        &self,
        message: &QueueMessage,
    ) -> Result<ReviewOutcome, StageError> {
        let job = ReviewJob::from_body(&message.body).map_err(StageError::MalformedJob)?;
        let project_id = job.project_id;
        let request_iid = job.merge_request_iid;
        info!(project_id, request_iid, ticket = ?job.jira_ticket_key, "processing review job");

        let call_deadline = Duration::from_secs(self.config.call_timeout_secs);

        // Stage: fetch and parse the diff.
        let raw_diff = timeout(
            call_deadline,
            self.host.fetch_diff(project_id, request_iid),
        )
        .await
        .map_err(|_| StageError::Timeout {
            stage: "diff fetch",
            secs: self.config.call_timeout_secs,
        })?
        .map_err(|source| StageError::DiffFetch {
            project_id,
            request_iid,
            source,
        })?;
        let diff = DiffDocument::parse(raw_diff);

        // Stage: size ceiling. Oversized diffs get a notice instead of a
        // review and still count as handled.
        if diff.byte_len() > self.config.max_diff_bytes {
            warn!(
                project_id,
                request_iid,
                bytes = diff.byte_len(),
                ceiling = self.config.max_diff_bytes,
                "diff exceeds size ceiling, posting notice"
            );
            let posted = timeout(
                call_deadline,
                self.host
                    .post_comment(project_id, request_iid, OVERSIZED_DIFF_NOTICE),
            )
            .await;
            if !matches!(posted, Ok(Ok(()))) {
                warn!(project_id, request_iid, "could not post oversized-diff notice");
            }
            return Ok(ReviewOutcome::OversizedNotice);
        }

        // Stage: optional issue context. Failures only drop the context.
        let issue = self.fetch_issue_context(&job, call_deadline).await;

        // Stage: lint the added lines.
        let reports = lint::analyze(
            &diff,
            Duration::from_secs(self.config.tool_timeout_secs),
        )
        .await;

        // Stage: generate the review. The deadline covers both the primary
        // and the fallback attempt.
        let request_text = prompt::build_request_text(&diff.raw, issue.as_ref(), &reports);
        let review = timeout(
            call_deadline * 2,
            self.reviewer.generate(&request_text),
        )
        .await
        .map_err(|_| StageError::Timeout {
            stage: "review generation",
            secs: self.config.call_timeout_secs * 2,
        })?
        .ok_or(StageError::Generation {
            project_id,
            request_iid,
        })?;

        // Stage: post the review.
        timeout(
            call_deadline,
            self.host.post_comment(project_id, request_iid, &review),
        )
        .await
        .map_err(|_| StageError::Timeout {
            stage: "comment post",
            secs: self.config.call_timeout_secs,
        })?
        .map_err(|source| StageError::CommentPost {
            project_id,
            request_iid,
            source,
        })?;

        info!(project_id, request_iid, "review posted");
        Ok(ReviewOutcome::Reviewed)
    }

    async fn fetch_issue_context(
        &self,
        job: &ReviewJob,
        deadline: Duration,
    ) -> Option<IssueContext> {
        let tracker = self.tracker.as_ref()?;
        let key = job.jira_ticket_key.as_deref()?;
        match timeout(deadline, tracker.fetch_issue(key)).await {
            Ok(issue) => issue,
            Err(_) => {
                warn!(ticket = key, "issue context fetch timed out, continuing without it");
                None
            }
        }
    }

    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) {
        let delay = Duration::from_secs(self.config.idle_delay_secs);
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
