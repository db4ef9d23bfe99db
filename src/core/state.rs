//! 会话状态：一个会话（线程）一份，由编排器独占持有，仅被状态机节点修改
//!
//! 跨轮保留：messages / short_term / long_term / feedback。
//! 每轮重置：documents / on_topic / rephrased_question / rephrase_count / proceed_to_generate。

use std::fmt;

use serde::Serialize;

use crate::memory::{ConversationMemory, Message, Role};
use crate::retriever::Passage;

/// 主题分类结果（三态）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum OnTopic {
    #[default]
    Unset,
    Yes,
    No,
}

impl fmt::Display for OnTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnTopic::Unset => write!(f, ""),
            OnTopic::Yes => write!(f, "Yes"),
            OnTopic::No => write!(f, "No"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub session_id: String,
    /// 完整消息历史（user + assistant），只追加
    pub messages: Vec<Message>,
    /// 最近问答窗口，生成与改写的上下文
    pub short_term: ConversationMemory,
    /// 重要问答对，不剪枝
    pub long_term: Vec<Message>,
    /// 当前认为相关的段落；每轮开始与评分后整体替换
    pub documents: Vec<Passage>,
    pub on_topic: OnTopic,
    pub rephrased_question: String,
    /// 本轮已执行的改进次数（上限见 workflow::MAX_REPHRASES）
    pub rephrase_count: u8,
    pub proceed_to_generate: bool,
    /// 本轮原始问题，设置后本轮内不变
    pub question: Option<Message>,
    pub feedback: String,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, max_short_term_turns: usize) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            short_term: ConversationMemory::new(max_short_term_turns),
            long_term: Vec::new(),
            documents: Vec::new(),
            on_topic: OnTopic::Unset,
            rephrased_question: String::new(),
            rephrase_count: 0,
            proceed_to_generate: false,
            question: None,
            feedback: String::new(),
        }
    }

    /// 把每轮字段恢复为初始值
    pub fn reset_turn(&mut self) {
        self.documents.clear();
        self.on_topic = OnTopic::Unset;
        self.rephrased_question.clear();
        self.proceed_to_generate = false;
        self.rephrase_count = 0;
    }

    /// 最近一条 assistant 消息
    pub fn last_answer(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// 本轮问题文本（未设置时为空串）
    pub fn question_text(&self) -> &str {
        self.question.as_ref().map(|m| m.content.as_str()).unwrap_or("")
    }
}
