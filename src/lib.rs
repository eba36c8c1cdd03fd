// SPDX-License-Identifier: MIT
//! reviewd — queue-driven automated code review worker.
//!
//! The pipeline per job: fetch the merge-request diff from the repository
//! host, parse out the added lines, lint them per language, assemble a
//! review prompt (optionally enriched with issue-tracker context), invoke a
//! primary generative model with a fallback, and post the result back as a
//! merge-request comment. Delivery is at-least-once: a job is acknowledged
//! only after the comment lands.

pub mod config;
pub mod diff;
pub mod error;
pub mod gitlab;
pub mod jira;
pub mod lint;
pub mod model;
pub mod prompt;
pub mod queue;
pub mod worker;
