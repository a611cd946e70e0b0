//! Free text to raw model output.
//!
//! The prompt is a fixed template with the user's text embedded; the model
//! is called exactly once per request, without retries or streaming.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};

use crate::{EngineError, PaymentMethod, ResultEngine, TransactionKind};

/// A black-box text-to-text service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion. Transport or upstream failures map to
    /// [`EngineError::ExtractionService`].
    async fn complete(&self, prompt: &str) -> ResultEngine<String>;
}

/// Build the extraction prompt for `text`.
///
/// Deterministic: the same text always yields the same prompt.
pub fn build_prompt(text: &str) -> String {
    let kinds = TransactionKind::ALL.map(TransactionKind::as_str).join(" | ");
    let methods = PaymentMethod::ALL.map(PaymentMethod::as_str).join(" | ");

    format!(
        r#"You are a finance assistant.

Extract ALL financial events from the text below.

Return ONLY valid JSON, with no markdown fences and no commentary, in this exact format:

{{
  "transactions": [
    {{
      "type": "{kinds}",
      "amount": number,
      "category": string,
      "description": string,
      "paymentMethod": "{methods} | null",
      "confidence": number between 0 and 1
    }}
  ]
}}

Use null for paymentMethod when the text does not say how it was paid.
If the text contains no financial event, return {{"transactions": []}}. Never invent transactions.

Text:
""" {text} """
"#
    )
}

/// Settings for [`OpenAiCompatible`].
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.huggingface.co/v1".to_string(),
            model: "meta-llama/Llama-3.1-8B-Instruct:sambanova".to_string(),
            api_key: None,
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiCompatible {
    client: Client,
    config: OpenAiConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

impl OpenAiCompatible {
    pub fn new(config: OpenAiConfig) -> ResultEngine<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| EngineError::ExtractionService(format!("http client: {err}")))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatible {
    async fn complete(&self, prompt: &str) -> ResultEngine<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            stream: false,
        };

        let mut request = self.client.post(self.url()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|err| EngineError::ExtractionService(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::ExtractionService(format!(
                "upstream returned {status}"
            )));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|err| EngineError::ExtractionService(format!("invalid response: {err}")))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EngineError::ExtractionService("empty completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_deterministic_and_embeds_text() {
        let text = "Received 1000 from mom. Ate pizza for 200.";
        let prompt = build_prompt(text);
        assert_eq!(prompt, build_prompt(text));
        assert!(prompt.contains(r#"""" Received 1000 from mom. Ate pizza for 200. """"#));
    }

    #[test]
    fn prompt_declares_the_output_contract() {
        let prompt = build_prompt("anything");
        assert!(prompt.contains(r#""type": "income | expense""#));
        assert!(prompt.contains(r#""paymentMethod": "cash | card | upi | bank | others | null""#));
        assert!(prompt.contains("number between 0 and 1"));
        assert!(prompt.contains(r#"return {"transactions": []}"#));
    }

    use axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};

    /// Serve `app` on an ephemeral port and return its `/v1` base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String) -> OpenAiCompatible {
        OpenAiCompatible::new(OpenAiConfig {
            base_url,
            model: "test-model".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout: Duration::from_secs(5),
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    async fn complete_against(app: Router) -> ResultEngine<String> {
        let base_url = serve(app).await;
        client(base_url).complete("prompt").await
    }

    #[tokio::test]
    async fn sends_one_chat_request_and_returns_its_content() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let seen = json!({
                    "authorization": headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok()),
                    "body": body,
                });
                Json(json!({"choices": [{"message": {"content": seen.to_string()}}]}))
            }),
        );

        let content = complete_against(app).await.unwrap();
        let seen: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(seen["authorization"], "Bearer sk-test");
        assert_eq!(seen["body"]["model"], "test-model");
        assert_eq!(seen["body"]["stream"], false);
        let temperature = seen["body"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
        assert_eq!(seen["body"]["messages"][0]["role"], "user");
        assert_eq!(seen["body"]["messages"][0]["content"], "prompt");
    }

    #[tokio::test]
    async fn upstream_error_status_is_a_service_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "overloaded") }),
        );
        assert!(matches!(
            complete_against(app).await,
            Err(EngineError::ExtractionService(_))
        ));
    }

    #[tokio::test]
    async fn missing_completion_is_a_service_error() {
        for reply in [
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": null}}]}),
            json!({"unexpected": true}),
        ] {
            let app = Router::new().route(
                "/v1/chat/completions",
                post(move || async move { Json(reply) }),
            );
            assert!(matches!(
                complete_against(app).await,
                Err(EngineError::ExtractionService(_))
            ));
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_service_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(format!("http://{addr}/v1")).complete("prompt").await;
        assert!(matches!(result, Err(EngineError::ExtractionService(_))));
    }

    #[test]
    fn url_joins_base_without_double_slash() {
        let client = OpenAiCompatible::new(OpenAiConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            ..OpenAiConfig::default()
        })
        .unwrap();
        assert_eq!(client.url(), "http://localhost:11434/v1/chat/completions");
    }
}
