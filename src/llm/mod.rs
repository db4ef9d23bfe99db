//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Ollama / DeepSeek / Mock）

pub mod mock;
pub mod openai;
pub mod providers;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient, ScriptedReply};
pub use openai::{OpenAiClient, SamplingParams, TokenUsage};
pub use providers::{
    create_deepseek_client, create_ollama_client, deepseek_api_key, DEEPSEEK_CHAT, DEEPSEEK_REASONER,
    OLLAMA_BASE_URL, OLLAMA_DEFAULT_MODEL,
};
pub use traits::{LlmClient, LlmError};
