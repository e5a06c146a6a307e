//! Gemini generateContent 后端 — 负责请求体构建与响应解析
//!
//! Google Gemini `generateContent` REST backend. Format notes:
//! - Uses `contents` with `parts`; roles are `user` and `model` only.
//! - System turns and the configured system instruction go to `systemInstruction`.
//! - `generationConfig` carries temperature, topP and `maxOutputTokens`.
//! - AI Studio authenticates with `?key=`; Vertex AI with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{BackendConfig, ModelBackend};
use crate::types::message::{Author, Part, Turn};
use crate::types::response::{GenerationConfig, LlmResponse, UsageInfo};
use crate::{Error, ErrorContext, Result};

const AI_STUDIO_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    ApiKey(String),
    Bearer(Option<String>),
}

#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    /// Everything up to `/models/`.
    models_url: String,
    auth: Auth,
}

impl GeminiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let (models_url, auth) = if config.use_vertex {
            let project = config.project.clone().unwrap_or_default();
            let base = config
                .base_url
                .clone()
                .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", config.location));
            (
                format!(
                    "{}/v1/projects/{}/locations/{}/publishers/google/models",
                    base.trim_end_matches('/'),
                    project,
                    config.location
                ),
                Auth::Bearer(config.access_token.clone().filter(|t| !t.is_empty())),
            )
        } else {
            let base = config.base_url.clone().unwrap_or_else(|| AI_STUDIO_URL.to_string());
            (
                format!("{}/v1beta/models", base.trim_end_matches('/')),
                Auth::ApiKey(config.api_key.clone().unwrap_or_default()),
            )
        };

        Ok(Self {
            client,
            models_url,
            auth,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&BackendConfig::from_env()?)
    }

    fn endpoint(&self, model: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}:generateContent", self.models_url, model)).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid backend URL: {}", e),
                ErrorContext::new()
                    .with_field_path("backend.base_url")
                    .with_source("gemini_backend"),
            )
        })?;
        if let Auth::ApiKey(ref key) = self.auth {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    /// Request body for a conversation.
    pub fn build_body(turns: &[Turn], config: &GenerationConfig) -> Value {
        let mut system_parts: Vec<String> = Vec::new();
        if let Some(ref s) = config.system_instruction {
            system_parts.push(s.clone());
        }
        let mut contents: Vec<Value> = Vec::new();

        for turn in turns {
            if turn.role == Author::System {
                let text = turn.text();
                if !text.is_empty() {
                    system_parts.push(text);
                }
                continue;
            }
            let role = if turn.role.is_user() { "user" } else { "model" };
            let parts: Vec<Value> = turn.parts.iter().map(part_to_json).collect();
            contents.push(json!({ "role": role, "parts": parts }));
        }

        let mut body = json!({ "contents": contents });
        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_parts.join("\n\n") }] });
        }

        let mut gen_config = serde_json::Map::new();
        if let Some(t) = config.temperature {
            gen_config.insert("temperature".into(), json!(t));
        }
        if let Some(p) = config.top_p {
            gen_config.insert("topP".into(), json!(p));
        }
        if let Some(n) = config.max_output_tokens {
            gen_config.insert("maxOutputTokens".into(), json!(n));
        }
        if !gen_config.is_empty() {
            body["generationConfig"] = Value::Object(gen_config);
        }
        body
    }

    /// Parse a `generateContent` response body.
    pub fn parse_body(model: &str, body: &Value) -> Result<LlmResponse> {
        let candidate = body.pointer("/candidates/0").ok_or_else(|| {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            Error::upstream_with_context(
                "response contained no candidates",
                ErrorContext::new()
                    .with_source("gemini_backend")
                    .with_details(reason.to_string()),
            )
        })?;

        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(|parts| parts.iter().filter_map(part_from_json).collect())
            .unwrap_or_default();

        let finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .map(|r| match r {
                "STOP" => "stop".to_string(),
                "MAX_TOKENS" => "length".to_string(),
                "SAFETY" | "RECITATION" => "content_filter".to_string(),
                other => other.to_lowercase(),
            });

        let usage = body.get("usageMetadata").map(|u| UsageInfo {
            prompt_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
            completion_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
            total_tokens: u["totalTokenCount"].as_u64().unwrap_or(0),
        });

        let mut response = LlmResponse::new(Turn::new(Author::Model, parts), model);
        response.finish_reason = finish_reason;
        response.usage = usage;
        Ok(response)
    }
}

fn part_to_json(part: &Part) -> Value {
    match part {
        Part::Text { text } => json!({ "text": text }),
        Part::FunctionCall { name, args } => json!({ "functionCall": { "name": name, "args": args } }),
        Part::FunctionResponse { name, response } => {
            json!({ "functionResponse": { "name": name, "response": response } })
        }
    }
}

fn part_from_json(part: &Value) -> Option<Part> {
    if let Some(text) = part.get("text").and_then(Value::as_str) {
        return Some(Part::text(text));
    }
    if let Some(call) = part.get("functionCall") {
        return Some(Part::FunctionCall {
            name: call.get("name")?.as_str()?.to_string(),
            args: call.get("args").cloned().unwrap_or_else(|| json!({})),
        });
    }
    None
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<LlmResponse> {
        let url = self.endpoint(model)?;
        let body = Self::build_body(turns, config);

        let mut req = self.client.post(url).json(&body);
        if let Auth::Bearer(Some(ref token)) = self.auth {
            req = req.bearer_auth(token);
        }

        debug!(model, turns = turns.len(), "sending generateContent request");
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(model, status = status.as_u16(), error = message.as_str(), "generateContent failed");
            return Err(Error::upstream_with_context(
                message,
                ErrorContext::new()
                    .with_source("gemini_backend")
                    .with_status_code(status.as_u16()),
            ));
        }

        let value: Value = resp.json().await?;
        Self::parse_body(model, &value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_body_splits_system_and_maps_roles() {
        let turns = vec![
            Turn::system("Be brief."),
            Turn::user("hi"),
            Turn::from_agent("StockAgent", "GOOGL is 175.50 USD"),
            Turn::model("ok"),
        ];
        let config = GenerationConfig::default()
            .with_system_instruction("You are helpful.")
            .with_temperature(0.5);
        let body = GeminiBackend::build_body(&turns, &config);

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are helpful.\n\nBe brief."
        );
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "model"]);
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert!(body["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_parse_body_reads_text_and_usage() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "299,792,458 m/s"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 6, "totalTokenCount": 15}
        });
        let resp = GeminiBackend::parse_body("gemini-2.5-flash", &body).unwrap();
        assert_eq!(resp.text(), "299,792,458 m/s");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
        assert_eq!(resp.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_parse_body_function_call_part() {
        let body = json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"name": "get_weather", "args": {"city": "London"}}}
            ]}}]
        });
        let resp = GeminiBackend::parse_body("m", &body).unwrap();
        assert_eq!(
            resp.content.parts[0],
            Part::FunctionCall {
                name: "get_weather".into(),
                args: json!({"city": "London"})
            }
        );
    }

    #[test]
    fn test_parse_body_without_candidates_is_upstream_error() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiBackend::parse_body("m", &body).unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[test]
    fn test_endpoints() {
        let studio = GeminiBackend::new(&BackendConfig::default().with_api_key("k")).unwrap();
        assert_eq!(
            studio.endpoint("gemini-2.5-pro").unwrap().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent?key=k"
        );

        let vertex =
            GeminiBackend::new(&BackendConfig::default().with_vertex("p", "us-east1", "tok")).unwrap();
        assert_eq!(
            vertex.endpoint("gemini-2.5-flash").unwrap().as_str(),
            "https://us-east1-aiplatform.googleapis.com/v1/projects/p/locations/us-east1/publishers/google/models/gemini-2.5-flash:generateContent"
        );
    }
}
