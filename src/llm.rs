// LLM Module - thin relay to an OpenAI-compatible chat completions endpoint
//
// One request, one short reply. No retry, no rate limiting; callers that
// can degrade are expected to do so themselves (see the demo module).

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::LatticeConfig;

#[derive(Clone)]
pub struct FilterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl FilterClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        FilterClient {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }

    /// Build from config; the key is read from the configured environment
    /// variable (empty if unset - the upstream will reject it, and the
    /// caller's error path handles that like any other provider failure).
    pub fn from_config(config: &LatticeConfig) -> Self {
        let api_key = std::env::var(&config.llm_api_key_env).unwrap_or_default();
        FilterClient::new(
            config.llm_base_url.clone(),
            api_key,
            config.llm_model.clone(),
            config.llm_max_tokens,
            config.llm_temperature,
        )
    }

    /// Ask the model to judge `content` against `prompt`. Returns the
    /// trimmed reply; an empty reply collapses to "NO".
    pub async fn classify(&self, prompt: &str, content: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": format!("{}\n\nContent to evaluate: {}", prompt, content),
            }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("filter upstream request failed")?
            .error_for_status()
            .context("filter upstream returned an error status")?;

        let payload: serde_json::Value = response
            .json()
            .await
            .context("filter upstream returned malformed JSON")?;

        let result = payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or("");

        Ok(if result.is_empty() {
            "NO".to_string()
        } else {
            result.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn_upstream(reply: &'static str) -> String {
        let app = Router::new().route(
            "/chat/completions",
            post(move |Json(_body): Json<serde_json::Value>| async move {
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": reply } }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> FilterClient {
        FilterClient::new(
            base_url,
            "test-key".to_string(),
            "openai/gpt-4.1-mini".to_string(),
            10,
            0.0,
        )
    }

    #[tokio::test]
    async fn test_classify_returns_trimmed_reply() {
        let base = spawn_upstream("  NO \n").await;
        let client = client_for(base);
        let result = client.classify("Is this spam?", "hello").await.unwrap();
        assert_eq!(result, "NO");
    }

    #[tokio::test]
    async fn test_empty_reply_collapses_to_no() {
        let base = spawn_upstream("   ").await;
        let client = client_for(base);
        let result = client.classify("Is this spam?", "hello").await.unwrap();
        assert_eq!(result, "NO");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_an_error() {
        // Nothing listens on the discard port.
        let client = client_for("http://127.0.0.1:9".to_string());
        assert!(client.classify("Is this spam?", "hello").await.is_err());
    }
}
