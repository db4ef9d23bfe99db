//! 短期记忆：最近的问答对
//!
//! 每次成功生成答案时整对追加（user + assistant），超出 max_turns 对时丢弃最旧的一对，
//! 供改写与生成两个节点截取最近窗口作为上下文。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 角色取值与 chat completion 接口一致
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息；`id` 为身份标识，两条内容相同的消息仍是不同消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// 是否与另一条消息为同一条（按 id，而非内容）
    pub fn is_same(&self, other: &Message) -> bool {
        self.id == other.id
    }
}

/// 短期记忆：最近 N 轮问答（每轮 user + assistant，故最多保留 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// 追加一轮问答；两条一起写入，剪枝不会拆开同一轮
    pub fn push_exchange(&mut self, question: Message, answer: Message) {
        self.messages.push(question);
        self.messages.push(answer);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 最近 `window` 条消息（不足时全部返回）
    pub fn recent(&self, window: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }

    fn prune(&mut self) {
        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
