// SPDX-License-Identifier: MIT
//! Per-stage pipeline error taxonomy.
//!
//! A [`StageError`] is what `worker::process_message` returns on failure.
//! The variant says which stage gave up; the ack decision never depends on
//! the variant — any error leaves the message unacknowledged so the queue
//! redelivers it after the visibility deadline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    /// The message body was not a valid job (bad JSON or missing required
    /// fields). There is no dead-letter path: such a message is redelivered
    /// until it is fixed upstream or purged by an operator.
    #[error("malformed job: {0}")]
    MalformedJob(String),

    /// The repository host could not produce a diff for the change request.
    #[error("diff fetch failed for {project_id}/{request_iid}: {source}")]
    DiffFetch {
        project_id: u64,
        request_iid: u64,
        source: anyhow::Error,
    },

    /// Both the primary and the fallback model returned no text.
    #[error("review generation failed for {project_id}/{request_iid}")]
    Generation { project_id: u64, request_iid: u64 },

    /// The review text was produced but could not be posted.
    #[error("comment post failed for {project_id}/{request_iid}: {source}")]
    CommentPost {
        project_id: u64,
        request_iid: u64,
        source: anyhow::Error,
    },

    /// An external call exceeded its configured deadline. Treated exactly
    /// like the underlying stage failing: the message is redelivered.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
}
