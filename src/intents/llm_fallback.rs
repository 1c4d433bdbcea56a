// LLM fallback intent router: commands the pattern table cannot place
// are classified by a local model speaking the Ollama chat API with
// tool calling.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Intent, IntentKind};
use crate::warn;

const SYSTEM_PROMPT: &str = "Ты — голосовой ассистент для управления медиа и компьютером.\n\
Пользователь даёт голосовую команду. Определи намерение и вызови нужный инструмент.\n\
Если команда не подходит ни под один инструмент, не вызывай инструменты.";

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Human-readable purpose of each tool, shown to the model.
fn tool_description(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::PlayMedia => "Включить медиа (музыку, видео, фильм)",
        IntentKind::Pause => "Поставить на паузу",
        IntentKind::Resume => "Продолжить воспроизведение",
        IntentKind::VolumeUp => "Увеличить громкость",
        IntentKind::VolumeDown => "Уменьшить громкость",
        IntentKind::VolumeSet => "Установить громкость",
        IntentKind::Shutdown => "Выключить компьютер",
        IntentKind::Reboot => "Перезагрузить компьютер",
        IntentKind::Fullscreen => "Включить полноэкранный режим",
        IntentKind::Close => "Закрыть текущее окно",
        IntentKind::NextTrack => "Следующий трек",
        IntentKind::PrevTrack => "Предыдущий трек",
        IntentKind::Unknown => "",
    }
}

/// Tool schema: one function per intent kind, named by its wire name.
static TOOLS: Lazy<Value> = Lazy::new(|| {
    let tools: Vec<Value> = IntentKind::ALL
        .into_iter()
        .filter(|kind| *kind != IntentKind::Unknown)
        .map(|kind| {
            let parameters = match kind {
                IntentKind::PlayMedia => json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Что включить"}
                    },
                    "required": ["query"],
                }),
                IntentKind::VolumeSet => json!({
                    "type": "object",
                    "properties": {"level": {"type": "integer"}},
                    "required": ["level"],
                }),
                _ => json!({"type": "object", "properties": {}}),
            };
            json!({
                "type": "function",
                "function": {
                    "name": kind.as_str(),
                    "description": tool_description(kind),
                    "parameters": parameters,
                },
            })
        })
        .collect();
    Value::Array(tools)
});

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    tools: &'a Value,
    stream: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: ToolFunction,
}

#[derive(Debug, Deserialize)]
struct ToolFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Async seam the orchestrator routes through, so the network client
/// can be swapped out (disabled in config, mocked in tests).
#[async_trait]
pub trait FallbackRouter: Send {
    async fn is_available(&self) -> bool;
    async fn route(&self, text: &str) -> Intent;
}

/// Fallback stand-in when `llm_fallback.enabled` is off: never
/// available, never routes.
pub struct DisabledFallback;

#[async_trait]
impl FallbackRouter for DisabledFallback {
    async fn is_available(&self) -> bool {
        false
    }

    async fn route(&self, text: &str) -> Intent {
        Intent::unknown(text)
    }
}

/// Tool-calling intent classifier over a local Ollama endpoint.
pub struct LlmFallbackRouter {
    client: Client,
    base_url: String,
    model: String,
}

impl LlmFallbackRouter {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Map a chat response onto an intent. Missing or unknown tool
    /// calls collapse to `Unknown` with the original transcript.
    fn intent_from_response(response: ChatResponse, text: &str) -> Intent {
        let Some(call) = response.message.tool_calls.into_iter().next() else {
            return Intent::unknown(text);
        };
        let Some(kind) = IntentKind::from_tool_name(&call.function.name) else {
            return Intent::unknown(text);
        };

        let mut query = String::new();
        let mut params = HashMap::new();
        if let Value::Object(arguments) = call.function.arguments {
            for (key, value) in arguments {
                if key == "query" {
                    query = value.as_str().unwrap_or_default().to_string();
                } else {
                    params.insert(key, value);
                }
            }
        }
        Intent {
            kind,
            query,
            params,
        }
    }
}

#[async_trait]
impl FallbackRouter for LlmFallbackRouter {
    /// Probe the endpoint's model listing with a short timeout.
    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Classify the transcript. Any transport or parse failure yields
    /// `Unknown` so the caller can fall back gracefully.
    async fn route(&self, text: &str) -> Intent {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            tools: &TOOLS,
            stream: false,
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = match self
            .client
            .post(&url)
            .timeout(COMPLETION_TIMEOUT)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("[llm] chat request failed: {e}");
                return Intent::unknown(text);
            }
        };

        match response.json::<ChatResponse>().await {
            Ok(parsed) => Self::intent_from_response(parsed, text),
            Err(e) => {
                warn!("[llm] malformed chat response: {e}");
                Intent::unknown(text)
            }
        }
    }
}
