//! 记忆层：消息模型、短期记忆（最近问答窗口）、长期记忆的重要性判定

pub mod conversation;
pub mod importance;

pub use conversation::{ConversationMemory, Message, Role};
pub use importance::{ImportancePolicy, DEFAULT_IMPORTANT_KEYWORDS};
