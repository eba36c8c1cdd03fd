// SPDX-License-Identifier: MIT
//! Generative model invocation with primary/fallback selection.
//!
//! The gateway speaks the Bedrock-runtime invoke protocol over plain HTTP:
//! `POST {endpoint}/model/{model_id}/invoke` with a family-specific JSON
//! body. Transport and decode failures are absorbed into an empty result so
//! the caller's only decision is primary, then fallback, then give up.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::{ModelFamily, ModelSpec};
use crate::prompt;

/// A backend that can turn a fully rendered prompt into completion text.
///
/// Implementations return `None` for any failure: transport errors, non-2xx
/// statuses, undecodable bodies, and empty completions all look the same to
/// the caller.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn invoke(&self, model: &ModelSpec, rendered_prompt: &str) -> Option<String>;
}

#[async_trait]
impl ModelBackend for std::sync::Arc<dyn ModelBackend> {
    async fn invoke(&self, model: &ModelSpec, rendered_prompt: &str) -> Option<String> {
        self.as_ref().invoke(model, rendered_prompt).await
    }
}

// ─── HTTP gateway ─────────────────────────────────────────────────────────────

/// Bedrock-runtime-style HTTP gateway client.
pub struct ModelGateway {
    endpoint: String,
    client: reqwest::Client,
}

impl ModelGateway {
    pub fn new(endpoint: &str, call_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(call_timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!("{}/model/{}/invoke", self.endpoint, model_id)
    }
}

/// Family-specific request body for one invocation.
fn request_body(family: ModelFamily, rendered_prompt: &str) -> serde_json::Value {
    match family {
        ModelFamily::Claude => serde_json::json!({
            "prompt": rendered_prompt,
            "max_tokens_to_sample": 4096,
            "temperature": 0.2,
            "top_p": 0.9,
            "top_k": 250,
            "stop_sequences": ["Human:", "<human>"],
        }),
        ModelFamily::Titan => serde_json::json!({
            "inputText": rendered_prompt,
            "textGenerationConfig": {
                "maxTokenCount": 4096,
                "temperature": 0.2,
                "topP": 0.9,
                "stopSequences": [],
            },
        }),
    }
}

#[derive(Deserialize)]
struct ClaudeResponse {
    completion: Option<String>,
}

#[derive(Deserialize)]
struct TitanResponse {
    results: Vec<TitanResult>,
}

#[derive(Deserialize)]
struct TitanResult {
    #[serde(rename = "outputText")]
    output_text: Option<String>,
}

fn extract_completion(family: ModelFamily, body: &str) -> Option<String> {
    match family {
        ModelFamily::Claude => serde_json::from_str::<ClaudeResponse>(body)
            .ok()?
            .completion,
        ModelFamily::Titan => serde_json::from_str::<TitanResponse>(body)
            .ok()?
            .results
            .into_iter()
            .next()?
            .output_text,
    }
}

#[async_trait]
impl ModelBackend for ModelGateway {
    async fn invoke(&self, model: &ModelSpec, rendered_prompt: &str) -> Option<String> {
        let url = self.invoke_url(&model.id);
        debug!(model = %model.id, prompt_bytes = rendered_prompt.len(), "invoking model");

        let response = match self
            .client
            .post(&url)
            .json(&request_body(model.family, rendered_prompt))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(model = %model.id, err = %e, "model request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(model = %model.id, status = %response.status(), "model returned non-success status");
            return None;
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(model = %model.id, err = %e, "failed to read model response body");
                return None;
            }
        };

        match extract_completion(model.family, &body) {
            Some(text) if !text.is_empty() => Some(text),
            _ => {
                warn!(model = %model.id, "model response carried no completion text");
                None
            }
        }
    }
}

// ─── Reviewer ─────────────────────────────────────────────────────────────────

/// Primary/fallback review generation over any [`ModelBackend`].
pub struct Reviewer<B: ModelBackend> {
    backend: B,
    primary: ModelSpec,
    fallback: ModelSpec,
}

impl<B: ModelBackend> Reviewer<B> {
    pub fn new(backend: B, primary: ModelSpec, fallback: ModelSpec) -> Self {
        Self {
            backend,
            primary,
            fallback,
        }
    }

    /// Render the request once in the primary family's encoding and try the
    /// primary model, then the fallback with the identical prompt. `None`
    /// means both produced nothing usable.
    ///
    /// The fallback deliberately receives the primary-family encoding even
    /// when its own family differs; models tolerate a foreign framing better
    /// than the pipeline tolerates two divergent prompts.
    pub async fn generate(&self, request_text: &str) -> Option<String> {
        let rendered = prompt::render(self.primary.family, request_text);

        if let Some(review) = self.backend.invoke(&self.primary, &rendered).await {
            return Some(review);
        }
        warn!(
            primary = %self.primary.id,
            fallback = %self.fallback.id,
            "primary model failed, trying fallback"
        );

        if let Some(review) = self.backend.invoke(&self.fallback, &rendered).await {
            return Some(review);
        }
        error!(
            primary = %self.primary.id,
            fallback = %self.fallback.id,
            "both primary and fallback models failed"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn claude_spec() -> ModelSpec {
        ModelSpec::resolve("anthropic.claude-instant-v1").unwrap()
    }

    fn titan_spec() -> ModelSpec {
        ModelSpec::resolve("amazon.titan-text-lite-v1").unwrap()
    }

    /// Scripted backend recording every (model id, prompt) invocation.
    struct ScriptedBackend {
        responses: Mutex<Vec<Option<String>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Option<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn invoke(&self, model: &ModelSpec, rendered_prompt: &str) -> Option<String> {
            self.calls
                .lock()
                .unwrap()
                .push((model.id.clone(), rendered_prompt.to_string()));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                responses.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn primary_success_skips_the_fallback() {
        let backend = ScriptedBackend::new(vec![Some("looks good".to_string())]);
        let reviewer = Reviewer::new(backend, claude_spec(), titan_spec());
        let review = reviewer.generate("request").await;
        assert_eq!(review.as_deref(), Some("looks good"));
        assert_eq!(reviewer.backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fallback_gets_exactly_the_same_rendered_prompt() {
        let backend = ScriptedBackend::new(vec![None, Some("fallback review".to_string())]);
        let reviewer = Reviewer::new(backend, claude_spec(), titan_spec());
        let review = reviewer.generate("request").await;
        assert_eq!(review.as_deref(), Some("fallback review"));

        let calls = reviewer.backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "anthropic.claude-instant-v1");
        assert_eq!(calls[1].0, "amazon.titan-text-lite-v1");
        assert_eq!(calls[0].1, calls[1].1);
        // Encoding follows the primary family, not the fallback's.
        assert!(calls[1].1.starts_with("<human>"));
    }

    #[tokio::test]
    async fn both_models_failing_yields_none() {
        let backend = ScriptedBackend::new(vec![None, None]);
        let reviewer = Reviewer::new(backend, claude_spec(), titan_spec());
        assert!(reviewer.generate("request").await.is_none());
        assert_eq!(reviewer.backend.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn claude_completion_is_extracted() {
        let body = r#"{"completion": " The change looks correct."}"#;
        assert_eq!(
            extract_completion(ModelFamily::Claude, body).as_deref(),
            Some(" The change looks correct.")
        );
    }

    #[test]
    fn titan_first_result_is_extracted() {
        let body = r#"{"results": [{"outputText": "Review text"}, {"outputText": "ignored"}]}"#;
        assert_eq!(
            extract_completion(ModelFamily::Titan, body).as_deref(),
            Some("Review text")
        );
    }

    #[test]
    fn malformed_body_extracts_nothing() {
        assert!(extract_completion(ModelFamily::Claude, "{}").is_none());
        assert!(extract_completion(ModelFamily::Titan, r#"{"results": []}"#).is_none());
        assert!(extract_completion(ModelFamily::Titan, "not json").is_none());
    }

    #[test]
    fn request_bodies_match_the_family_schemas() {
        let claude = request_body(ModelFamily::Claude, "p");
        assert_eq!(claude["max_tokens_to_sample"], 4096);
        assert_eq!(claude["stop_sequences"][1], "<human>");

        let titan = request_body(ModelFamily::Titan, "p");
        assert_eq!(titan["inputText"], "p");
        assert_eq!(titan["textGenerationConfig"]["maxTokenCount"], 4096);
    }
}
