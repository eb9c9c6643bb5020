use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aura_contracts::storyboard::{ChatTurn, Role};
use reqwest::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use super::{truncate_text, AiGateway};
use crate::config::GatewayConfig;

const SCENE_SYSTEM_INSTRUCTION: &str = "你是一位世界级的编剧和剧场导演。
请根据提示生成一个剧场场景。
生成内容必须包含：一个吸引人的标题、一段充满画面感的视觉描述、以及一段充满张力的核心对白。
请务必使用中文生成所有内容。
返回格式必须为合法的JSON，包含以下键：title (标题), description (描述), dialogue (对白)。";

const ASSISTANT_SYSTEM_INSTRUCTION: &str = "你是 Aura，一个人工智能剧场创意助手。你擅长协助用户构思、撰写并可视化极具张力的戏剧作品。你充满智慧、富有创意且乐于助人。请全程使用中文与用户沟通。";

const IMAGE_ASPECT_RATIO: &str = "16:9";

fn image_prompt(description: &str) -> String {
    format!(
        "电影质感的戏剧美术概念图：{description}。史诗级光影，舞台感，8k分辨率，艺术风格，极其精致。"
    )
}

/// Gemini `generateContent` adapter.
pub struct GeminiGateway {
    api_base: String,
    api_key: String,
    text_model: String,
    image_model: String,
    http: HttpClient,
}

impl GeminiGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: config.api_base.clone(),
            api_key,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    async fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        tracing::debug!(%endpoint, "sending Gemini request");
        // Credential travels in a header so it never shows up in error URLs.
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response).await
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_structured_scene(&self, prompt_hint: &str) -> Result<String> {
        let payload = scene_request_payload(prompt_hint);
        let response = self.generate_content(&self.text_model, &payload).await?;
        Ok(extract_text(&response))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
        let payload = image_request_payload(prompt);
        let response = self.generate_content(&self.image_model, &payload).await?;
        Ok(extract_image_data_url(&response))
    }

    async fn converse(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        let payload = chat_request_payload(history, message);
        let response = self.generate_content(&self.text_model, &payload).await?;
        Ok(extract_text(&response))
    }
}

fn system_instruction(text: &str) -> Value {
    json!({ "parts": [{ "text": text }] })
}

pub(crate) fn scene_request_payload(prompt_hint: &str) -> Value {
    json!({
        "systemInstruction": system_instruction(SCENE_SYSTEM_INSTRUCTION),
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt_hint }],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "description": { "type": "STRING" },
                    "dialogue": { "type": "STRING" },
                },
                "required": ["title", "description", "dialogue"],
            },
        },
    })
}

pub(crate) fn image_request_payload(description: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": image_prompt(description) }],
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": { "aspectRatio": IMAGE_ASPECT_RATIO },
        },
    })
}

pub(crate) fn chat_request_payload(history: &[ChatTurn], message: &str) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": gemini_role(turn.role),
                "parts": [{ "text": turn.content }],
            })
        })
        .collect();
    contents.push(json!({
        "role": "user",
        "parts": [{ "text": message }],
    }));
    json!({
        "systemInstruction": system_instruction(ASSISTANT_SYSTEM_INSTRUCTION),
        "contents": contents,
    })
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn first_candidate_parts(response: &Value) -> Vec<Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Concatenated text parts of the first candidate, skipping thought parts.
pub(crate) fn extract_text(response: &Value) -> String {
    first_candidate_parts(response)
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .concat()
}

pub(crate) fn extract_image_data_url(response: &Value) -> Option<String> {
    for part in first_candidate_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("image/png");
        return Some(format!("data:{mime_type};base64,{data}"));
    }
    None
}

async fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .await
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}
