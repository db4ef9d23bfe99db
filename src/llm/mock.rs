//! Mock / 脚本化 LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! - MockLlmClient：Yes/No 类提示一律回答 "Yes"，其余回显最后一条 User 消息
//! - ScriptedLlmClient：按 FIFO 返回预置应答，并记录每次收到的提示，便于断言调用次数与内容

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：分类 / 评分一律通过，其余回显
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let asks_yes_no = messages
            .iter()
            .any(|m| {
                m.role == Role::System
                    && (m.content.contains("Yes or No") || m.content.contains("'Yes' or 'No'"))
            });
        if asks_yes_no {
            return Ok("Yes".to_string());
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 一条预置应答：成功文本或失败
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(LlmError),
}

impl From<&str> for ScriptedReply {
    fn from(s: &str) -> Self {
        ScriptedReply::Text(s.to_string())
    }
}

impl From<String> for ScriptedReply {
    fn from(s: String) -> Self {
        ScriptedReply::Text(s)
    }
}

/// 脚本化客户端：依次弹出应答；应答耗尽后返回 LlmError::EmptyScript
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条应答
    pub fn push(&self, reply: impl Into<ScriptedReply>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply.into());
        }
    }

    /// 已收到的全部提示（按调用顺序）
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 剩余未消费的应答数
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(messages.to_vec());
        }
        let next = self
            .replies
            .lock()
            .map_err(|e| LlmError::Api(e.to_string()))?
            .pop_front();
        match next {
            Some(ScriptedReply::Text(s)) => Ok(s),
            Some(ScriptedReply::Fail(e)) => Err(e),
            None => Err(LlmError::EmptyScript),
        }
    }
}
