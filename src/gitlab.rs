// SPDX-License-Identifier: MIT
//! Repository host client (GitLab REST v4).
//!
//! Two operations matter to the pipeline: fetch a merge request's changes
//! and assemble them into one unified diff text, and post a note with the
//! finished review. Both speak `/api/v4` with a private token header.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

/// A host that serves merge-request diffs and accepts review comments.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Fetch the change set and return it as one unified diff string.
    async fn fetch_diff(&self, project_id: u64, merge_request_iid: u64) -> anyhow::Result<String>;

    /// Post a comment on the merge request's discussion.
    async fn post_comment(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        body: &str,
    ) -> anyhow::Result<()>;
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChangesResponse {
    #[serde(default)]
    changes: Vec<FileChange>,
}

#[derive(Debug, Deserialize)]
struct FileChange {
    #[serde(default)]
    old_path: String,
    #[serde(default)]
    new_path: String,
    #[serde(default)]
    diff: String,
}

/// Join per-file change entries into one unified diff: each file gets
/// `--- a/` and `+++ b/` headers followed by its hunk text.
fn assemble_unified_diff(changes: &[FileChange]) -> String {
    let mut lines = Vec::with_capacity(changes.len() * 3);
    for change in changes {
        lines.push(format!("--- a/{}", change.old_path));
        lines.push(format!("+++ b/{}", change.new_path));
        lines.push(change.diff.clone());
    }
    lines.join("\n")
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct GitlabClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitlabClient {
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn mr_url(&self, project_id: u64, merge_request_iid: u64, suffix: &str) -> String {
        format!(
            "{}/api/v4/projects/{}/merge_requests/{}{}",
            self.base_url, project_id, merge_request_iid, suffix
        )
    }
}

#[async_trait]
impl RepoHost for GitlabClient {
    async fn fetch_diff(&self, project_id: u64, merge_request_iid: u64) -> anyhow::Result<String> {
        let url = self.mr_url(project_id, merge_request_iid, "/changes");
        debug!(project_id, merge_request_iid, "fetching merge request changes");

        let response: ChangesResponse = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(assemble_unified_diff(&response.changes))
    }

    async fn post_comment(
        &self,
        project_id: u64,
        merge_request_iid: u64,
        body: &str,
    ) -> anyhow::Result<()> {
        let url = self.mr_url(project_id, merge_request_iid, "/notes");
        self.client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?
            .error_for_status()?;

        info!(project_id, merge_request_iid, "posted review comment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_are_joined_with_per_file_headers() {
        let changes = vec![
            FileChange {
                old_path: "src/app.py".to_string(),
                new_path: "src/app.py".to_string(),
                diff: "@@ -1 +1,2 @@\n import os\n+import sys".to_string(),
            },
            FileChange {
                old_path: "old/name.go".to_string(),
                new_path: "new/name.go".to_string(),
                diff: "@@ -5 +5 @@\n-a\n+b".to_string(),
            },
        ];
        let diff = assemble_unified_diff(&changes);
        assert!(diff.starts_with("--- a/src/app.py\n+++ b/src/app.py\n@@ -1 +1,2 @@"));
        assert!(diff.contains("--- a/old/name.go\n+++ b/new/name.go\n@@ -5 +5 @@"));
    }

    #[test]
    fn empty_change_set_assembles_to_empty_text() {
        assert_eq!(assemble_unified_diff(&[]), "");
    }

    #[test]
    fn assembled_diff_feeds_the_added_lines_parser() {
        let changes = vec![FileChange {
            old_path: "src/app.py".to_string(),
            new_path: "src/app.py".to_string(),
            diff: "@@ -1 +1,2 @@\n import os\n+import sys".to_string(),
        }];
        let files = crate::diff::parse_added_lines(&assemble_unified_diff(&changes));
        assert_eq!(files["src/app.py"], "import sys");
    }

    #[test]
    fn mr_urls_are_v4_shaped() {
        let client = GitlabClient::new("https://gitlab.example.com/", "tok").unwrap();
        assert_eq!(
            client.mr_url(42, 7, "/changes"),
            "https://gitlab.example.com/api/v4/projects/42/merge_requests/7/changes"
        );
    }
}
