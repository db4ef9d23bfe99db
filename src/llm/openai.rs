//! OpenAI 兼容 API 客户端
//!
//! Ollama、DeepSeek、OpenAI 以及自建代理都走这里，区别只在 base_url 与 key。

use std::sync::atomic::{AtomicU64, Ordering};

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// 未提供 key 时的占位值（Ollama 不校验 key）
pub(crate) const PLACEHOLDER_KEY: &str = "sk-placeholder";

/// 端点配置：key 依次取参数、OPENAI_API_KEY、占位值
pub(crate) fn endpoint_config(base_url: Option<&str>, api_key: Option<&str>) -> OpenAIConfig {
    let key = api_key
        .map(String::from)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| PLACEHOLDER_KEY.to_string());
    let config = OpenAIConfig::new().with_api_key(key);
    match base_url {
        Some(url) => config.with_api_base(url),
        None => config,
    }
}

/// 累计 token 用量
#[derive(Debug, Default)]
pub struct TokenUsage {
    prompt: AtomicU64,
    completion: AtomicU64,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt.fetch_add(prompt, Ordering::Relaxed);
        self.completion.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn get(&self) -> (u64, u64, u64) {
        let p = self.prompt.load(Ordering::Relaxed);
        let c = self.completion.load(Ordering::Relaxed);
        (p, c, p + c)
    }
}

/// 采样参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 1080,
        }
    }
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    sampling: SamplingParams,
    usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::with_config(endpoint_config(base_url, api_key)),
            model: model.to_string(),
            sampling: SamplingParams::default(),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, messages: &[Message]) -> Result<CreateChatCompletionRequest, LlmError> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.sampling.temperature)
            .top_p(self.sampling.top_p)
            .max_completion_tokens(self.sampling.max_tokens)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))
    }
}

fn to_request_message(m: &Message) -> Result<ChatCompletionRequestMessage, LlmError> {
    let content = m.content.clone();
    let built = match m.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map(ChatCompletionRequestMessage::System),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map(ChatCompletionRequestMessage::User),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map(ChatCompletionRequestMessage::Assistant),
    };
    built.map_err(|e| LlmError::Api(e.to_string()))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = self.build_request(messages)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Api(format!("{} returned no choices", self.model)))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}
