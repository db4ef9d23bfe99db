//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Ollama / DeepSeek / Mock）实现 LlmClient::complete：
//! 输入按顺序排列的带角色消息，返回生成文本。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// LLM 调用失败（传输、推理或超时）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 脚本化客户端的应答已用完（仅测试替身会返回）
    #[error("scripted LLM has no reply left")]
    EmptyScript,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
