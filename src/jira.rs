// SPDX-License-Identifier: MIT
//! Issue tracker client (Jira REST v2).
//!
//! Ticket context is strictly optional enrichment: any failure here (bad
//! key, auth, transport) collapses to `None` and the review proceeds
//! without it. The epic link is a second fetch keyed by the epic-link
//! custom field, and its failure only drops the epic section.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Key and summary of a linked epic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicRef {
    pub key: String,
    pub summary: String,
}

/// Ticket context attached to a review request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueContext {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub issue_type: String,
    pub priority: String,
    pub assignee: String,
    pub reporter: String,
    /// Creation timestamp, opaque in the tracker's own format.
    pub created: String,
    pub updated: String,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub epic: Option<EpicRef>,
}

/// A tracker that can resolve a ticket key into review context.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch context for `key`, or `None` when it cannot be resolved.
    async fn fetch_issue(&self, key: &str) -> Option<IssueContext>;
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IssueResponse {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct IssueFields {
    summary: String,
    description: Option<String>,
    status: Option<NamedField>,
    issuetype: Option<NamedField>,
    priority: Option<NamedField>,
    assignee: Option<PersonField>,
    reporter: Option<PersonField>,
    created: Option<String>,
    updated: Option<String>,
    labels: Vec<String>,
    components: Vec<NamedField>,
    // Jira Cloud's default epic-link custom field.
    #[serde(rename = "customfield_10014")]
    epic_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PersonField {
    #[serde(rename = "displayName")]
    display_name: String,
}

fn field_name(field: Option<NamedField>, fallback: &str) -> String {
    field.map(|f| f.name).unwrap_or_else(|| fallback.to_string())
}

fn person_name(field: Option<PersonField>, fallback: &str) -> String {
    field
        .map(|f| f.display_name)
        .unwrap_or_else(|| fallback.to_string())
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct JiraClient {
    base_url: String,
    username: String,
    token: String,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(base_url: &str, username: &str, token: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            token: token.to_string(),
            client,
        })
    }

    async fn get_issue(&self, key: &str) -> anyhow::Result<IssueResponse> {
        let url = format!("{}/rest/api/2/issue/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn fetch_issue(&self, key: &str) -> Option<IssueContext> {
        debug!(ticket = key, "fetching issue context");
        let issue = match self.get_issue(key).await {
            Ok(issue) => issue,
            Err(e) => {
                warn!(ticket = key, err = %e, "could not fetch issue context");
                return None;
            }
        };

        let epic = match &issue.fields.epic_link {
            Some(epic_key) => match self.get_issue(epic_key).await {
                Ok(epic) => Some(EpicRef {
                    key: epic.key,
                    summary: epic.fields.summary,
                }),
                Err(e) => {
                    warn!(ticket = key, epic = %epic_key, err = %e, "could not fetch linked epic");
                    None
                }
            },
            None => None,
        };

        Some(IssueContext {
            key: issue.key,
            summary: issue.fields.summary,
            description: issue.fields.description.unwrap_or_default(),
            status: field_name(issue.fields.status, "Unknown"),
            issue_type: field_name(issue.fields.issuetype, "Unknown"),
            priority: field_name(issue.fields.priority, "Unassigned"),
            assignee: person_name(issue.fields.assignee, "Unassigned"),
            reporter: person_name(issue.fields.reporter, "Unknown"),
            created: issue.fields.created.unwrap_or_default(),
            updated: issue.fields.updated.unwrap_or_default(),
            labels: issue.fields.labels,
            components: issue.fields.components.into_iter().map(|c| c.name).collect(),
            epic,
        })
    }
}
