// SPDX-License-Identifier: MIT
//! Worker configuration.
//!
//! Built once at startup and passed by `Arc` into every component — there is
//! no global mutable settings object. Layering priority:
//! env var  >  TOML config file  >  built-in default.

use serde::Deserialize;
use std::path::Path;
use tracing::error;

const DEFAULT_MAX_DIFF_BYTES: usize = 100_000;
const DEFAULT_RECEIVE_WAIT_SECS: u64 = 20;
const DEFAULT_RECEIVE_BATCH_SIZE: u32 = 10;
const DEFAULT_IDLE_DELAY_SECS: u64 = 5;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PRIMARY_MODEL: &str = "anthropic.claude-instant-v1";
const DEFAULT_FALLBACK_MODEL: &str = "amazon.titan-text-lite-v1";

// ─── Model family ─────────────────────────────────────────────────────────────

/// Request/response schema family of a generative model backend.
///
/// Resolved exactly once, at configuration time, from the model identifier
/// prefix. Everything downstream dispatches on this tag — no string-prefix
/// checks at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Completion-style schema with `<human>`/`<system>` tagged prompts.
    Claude,
    /// Input-text schema with `System:`/`Human:`/`Assistant:` role markers.
    Titan,
}

/// A model identifier with its family resolved up front.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub id: String,
    pub family: ModelFamily,
}

impl ModelSpec {
    /// Resolve `id` to a [`ModelSpec`]. Unknown prefixes are rejected here so
    /// the worker never attempts a network call against an unsupported model.
    pub fn resolve(id: &str) -> anyhow::Result<Self> {
        let family = if id.starts_with("anthropic.claude") {
            ModelFamily::Claude
        } else if id.starts_with("amazon.titan") {
            ModelFamily::Titan
        } else {
            anyhow::bail!("unsupported model ID: {id}");
        };
        Ok(Self {
            id: id.to_string(),
            family,
        })
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// Optional config file — all fields are overrides below env vars.
#[derive(Deserialize, Default)]
struct TomlConfig {
    gitlab_url: Option<String>,
    gitlab_token: Option<String>,
    jira_url: Option<String>,
    jira_username: Option<String>,
    jira_token: Option<String>,
    queue_url: Option<String>,
    model_endpoint: Option<String>,
    primary_model: Option<String>,
    fallback_model: Option<String>,
    max_diff_bytes: Option<usize>,
    receive_wait_secs: Option<u64>,
    receive_batch_size: Option<u32>,
    idle_delay_secs: Option<u64>,
    call_timeout_secs: Option<u64>,
    tool_timeout_secs: Option<u64>,
    log: Option<String>,
    log_format: Option<String>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config file — using defaults");
            None
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─── Issue tracker credentials ────────────────────────────────────────────────

/// Issue tracker connection settings. Absent entirely when not configured;
/// jobs carrying an issue key then proceed without issue context.
#[derive(Debug, Clone)]
pub struct IssueTrackerConfig {
    pub url: String,
    pub username: String,
    pub token: String,
}

// ─── WorkerConfig ─────────────────────────────────────────────────────────────

/// Immutable worker configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Repository host base URL (e.g. `https://gitlab.example.com`).
    pub gitlab_url: String,
    /// Repository host API token.
    pub gitlab_token: String,
    /// Issue tracker settings; `None` disables issue context entirely.
    pub issue_tracker: Option<IssueTrackerConfig>,
    /// Job queue URL (SQS-compatible endpoint).
    pub queue_url: String,
    /// Model gateway base URL (Bedrock-runtime-compatible endpoint).
    pub model_endpoint: String,
    /// Primary generative model, family resolved.
    pub primary_model: ModelSpec,
    /// Fallback generative model, family resolved.
    pub fallback_model: ModelSpec,
    /// Diff size ceiling in bytes; larger diffs short-circuit to a notice.
    pub max_diff_bytes: usize,
    /// Long-poll wait per receive call, seconds.
    pub receive_wait_secs: u64,
    /// Maximum messages per receive call.
    pub receive_batch_size: u32,
    /// Delay before the next receive when a poll returns nothing, seconds.
    pub idle_delay_secs: u64,
    /// Deadline for each external call (diff fetch, issue fetch, model
    /// invocation, comment post), seconds. Timeout counts as stage failure.
    pub call_timeout_secs: u64,
    /// Deadline for a single external analyzer process, seconds.
    pub tool_timeout_secs: u64,
    /// Log level filter string (e.g. "info", "debug,reviewd=trace").
    pub log: String,
    /// Log output format: "pretty" (default) or "json".
    pub log_format: String,
}

impl WorkerConfig {
    /// Build the configuration from env vars layered over an optional TOML
    /// file. Fails when a required endpoint/credential is missing or a model
    /// identifier has an unsupported prefix.
    pub fn load(config_file: Option<&Path>) -> anyhow::Result<Self> {
        let toml_cfg = config_file.and_then(load_toml).unwrap_or_default();

        let required = |env_name: &str, toml_val: Option<String>| -> anyhow::Result<String> {
            env_var(env_name)
                .or(toml_val)
                .ok_or_else(|| anyhow::anyhow!("missing required setting {env_name}"))
        };

        let gitlab_url = required("REVIEWD_GITLAB_URL", toml_cfg.gitlab_url)?;
        let gitlab_token = required("REVIEWD_GITLAB_TOKEN", toml_cfg.gitlab_token)?;
        let queue_url = required("REVIEWD_QUEUE_URL", toml_cfg.queue_url)?;
        let model_endpoint = required("REVIEWD_MODEL_ENDPOINT", toml_cfg.model_endpoint)?;

        // Issue tracker is configured only when all three settings are present.
        let jira_url = env_var("REVIEWD_JIRA_URL").or(toml_cfg.jira_url);
        let jira_username = env_var("REVIEWD_JIRA_USERNAME").or(toml_cfg.jira_username);
        let jira_token = env_var("REVIEWD_JIRA_TOKEN").or(toml_cfg.jira_token);
        let issue_tracker = match (jira_url, jira_username, jira_token) {
            (Some(url), Some(username), Some(token)) => Some(IssueTrackerConfig {
                url,
                username,
                token,
            }),
            _ => None,
        };

        let primary_id = env_var("REVIEWD_PRIMARY_MODEL")
            .or(toml_cfg.primary_model)
            .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string());
        let fallback_id = env_var("REVIEWD_FALLBACK_MODEL")
            .or(toml_cfg.fallback_model)
            .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string());

        fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
            env_var(name).and_then(|v| v.parse().ok())
        }

        Ok(Self {
            gitlab_url,
            gitlab_token,
            issue_tracker,
            queue_url,
            model_endpoint,
            primary_model: ModelSpec::resolve(&primary_id)?,
            fallback_model: ModelSpec::resolve(&fallback_id)?,
            max_diff_bytes: parse_env("REVIEWD_MAX_DIFF_BYTES")
                .or(toml_cfg.max_diff_bytes)
                .unwrap_or(DEFAULT_MAX_DIFF_BYTES),
            receive_wait_secs: parse_env("REVIEWD_RECEIVE_WAIT_SECS")
                .or(toml_cfg.receive_wait_secs)
                .unwrap_or(DEFAULT_RECEIVE_WAIT_SECS),
            receive_batch_size: parse_env("REVIEWD_RECEIVE_BATCH_SIZE")
                .or(toml_cfg.receive_batch_size)
                .unwrap_or(DEFAULT_RECEIVE_BATCH_SIZE),
            idle_delay_secs: parse_env("REVIEWD_IDLE_DELAY_SECS")
                .or(toml_cfg.idle_delay_secs)
                .unwrap_or(DEFAULT_IDLE_DELAY_SECS),
            call_timeout_secs: parse_env("REVIEWD_CALL_TIMEOUT_SECS")
                .or(toml_cfg.call_timeout_secs)
                .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
            tool_timeout_secs: parse_env("REVIEWD_TOOL_TIMEOUT_SECS")
                .or(toml_cfg.tool_timeout_secs)
                .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS),
            log: env_var("REVIEWD_LOG")
                .or(toml_cfg.log)
                .unwrap_or_else(|| "info".to_string()),
            log_format: env_var("REVIEWD_LOG_FORMAT")
                .or(toml_cfg.log_format)
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_claude_family() {
        let spec = ModelSpec::resolve("anthropic.claude-instant-v1").unwrap();
        assert_eq!(spec.family, ModelFamily::Claude);
        assert_eq!(spec.id, "anthropic.claude-instant-v1");
    }

    #[test]
    fn resolves_titan_family() {
        let spec = ModelSpec::resolve("amazon.titan-text-lite-v1").unwrap();
        assert_eq!(spec.family, ModelFamily::Titan);
    }

    #[test]
    fn rejects_unknown_prefix() {
        let err = ModelSpec::resolve("mistral.mixtral-8x7b").unwrap_err();
        assert!(err.to_string().contains("unsupported model"));
    }

    #[test]
    fn toml_file_parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviewd.toml");
        std::fs::write(&path, "max_diff_bytes = 5000\nlog = \"debug\"\n").unwrap();
        let cfg = load_toml(&path).unwrap();
        assert_eq!(cfg.max_diff_bytes, Some(5000));
        assert_eq!(cfg.log.as_deref(), Some("debug"));
        assert!(cfg.gitlab_url.is_none());
    }
}
