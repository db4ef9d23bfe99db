//! 预置后端：Ollama 本地模型与 DeepSeek，均走 OpenAI 兼容协议

use crate::llm::OpenAiClient;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.1";

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// Ollama 不校验 key，随便给一个非空值
pub fn create_ollama_client(base_url: Option<&str>, model: Option<&str>) -> OpenAiClient {
    OpenAiClient::new(
        Some(base_url.unwrap_or(OLLAMA_BASE_URL)),
        model.unwrap_or(OLLAMA_DEFAULT_MODEL),
        Some("ollama"),
    )
}

/// DEEPSEEK_API_KEY，其次 OPENAI_API_KEY；都没有时返回 None
pub fn deepseek_api_key() -> Option<String> {
    ["DEEPSEEK_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|k| !k.is_empty())
}

pub fn create_deepseek_client(base_url: Option<&str>, model: Option<&str>, api_key: &str) -> OpenAiClient {
    OpenAiClient::new(
        Some(base_url.unwrap_or(DEEPSEEK_BASE_URL)),
        model.unwrap_or(DEEPSEEK_CHAT),
        Some(api_key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_defaults() {
        let client = create_ollama_client(None, None);
        assert_eq!(client.model(), OLLAMA_DEFAULT_MODEL);
    }

    #[test]
    fn test_deepseek_model() {
        assert_eq!(create_deepseek_client(None, None, "sk-x").model(), DEEPSEEK_CHAT);
        let client = create_deepseek_client(None, Some(DEEPSEEK_REASONER), "sk-x");
        assert_eq!(client.model(), DEEPSEEK_REASONER);
    }
}
