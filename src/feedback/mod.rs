//! 反馈收集：在一轮问答到达终态、答案展示之后运行（不属于状态机节点）
//!
//! 只读取已定稿的本轮状态，写入 `feedback` 字段，并向 FeedbackSink 追加一条记录。

pub mod sink;

use serde::Serialize;
use thiserror::Error;

use crate::core::SessionState;
use crate::memory::Role;
use crate::retriever::Passage;

pub use sink::{CsvFeedbackSink, FeedbackSink, MemoryFeedbackSink, CSV_HEADER};

/// 文档摘要中每段的默认截断长度（字符）
pub const DEFAULT_SUMMARY_CHARS: usize = 300;

/// 一轮问答的反馈记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRecord {
    pub question: String,
    pub rephrased_question: String,
    /// 使用过的段落：换行压平、逐段截断后以 " | " 连接
    pub documents: String,
    pub answer: String,
    pub feedback: String,
}

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("no completed turn to give feedback on")]
    NoCompletedTurn,

    #[error("feedback io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("feedback sink error: {0}")]
    Sink(String),
}

/// 段落摘要：每段换行替换为空格，截取前 max_chars 个字符，以 " | " 连接
pub fn summarize_documents(documents: &[Passage], max_chars: usize) -> String {
    documents
        .iter()
        .map(|d| {
            d.text
                .replace(['\r', '\n'], " ")
                .chars()
                .take(max_chars)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// 把用户反馈写入状态并生成记录；反馈文本统一 trim + 小写
pub fn collect_feedback(
    state: &mut SessionState,
    feedback: &str,
    summary_chars: usize,
) -> Result<FeedbackRecord, FeedbackError> {
    let question = state
        .question
        .as_ref()
        .ok_or(FeedbackError::NoCompletedTurn)?
        .content
        .clone();

    let feedback = feedback.trim().to_lowercase();
    state.feedback = feedback.clone();

    let answer = state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();

    tracing::info!(feedback = %feedback, "human feedback");

    Ok(FeedbackRecord {
        question,
        rephrased_question: state.rephrased_question.clone(),
        documents: summarize_documents(&state.documents, summary_chars),
        answer,
        feedback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;

    #[test]
    fn test_summarize_flattens_and_truncates() {
        let docs = vec![
            Passage::new("line one\nline two", "p1"),
            Passage::new("x".repeat(500), "p2"),
        ];
        let summary = summarize_documents(&docs, 300);
        let parts: Vec<&str> = summary.split(" | ").collect();
        assert_eq!(parts[0], "line one line two");
        assert_eq!(parts[1].len(), 300);
    }

    #[test]
    fn test_collect_requires_question() {
        let mut state = SessionState::new("s", 10);
        assert!(matches!(
            collect_feedback(&mut state, "yes", 300),
            Err(FeedbackError::NoCompletedTurn)
        ));
    }

    #[test]
    fn test_collect_uses_last_assistant_message() {
        let mut state = SessionState::new("s", 10);
        let q = Message::user("What is the dosage?");
        state.question = Some(q.clone());
        state.messages.push(Message::assistant("old answer"));
        state.messages.push(q);
        state.messages.push(Message::assistant("70 mg monthly"));
        state.rephrased_question = "Aimovig dosage".into();
        state.documents = vec![Passage::new("Aimovig 70 mg", "label/page_2")];

        let record = collect_feedback(&mut state, "  YES ", 300).unwrap();
        assert_eq!(record.answer, "70 mg monthly");
        assert_eq!(record.feedback, "yes");
        assert_eq!(record.documents, "Aimovig 70 mg");
        assert_eq!(state.feedback, "yes");
    }
}
