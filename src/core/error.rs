//! 轮次错误
//!
//! 端口（LLM / 检索）失败或超时对本轮是致命的：不重试、不写 assistant 消息，
//! 附带会话 id 与所在节点上抛给调用方。分类 / 评分的含糊输出不是错误，由解析规则就地吸收；
//! cannot_answer 与 off_topic 是成功的轮次，不经过这里。

use thiserror::Error;

use crate::llm::LlmError;
use crate::retriever::RetrieverError;
use crate::workflow::NodeId;

/// 端口调用失败
#[derive(Error, Debug)]
pub enum PortError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Retriever(#[from] RetrieverError),
}

impl PortError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PortError::Llm(LlmError::Timeout { .. }) | PortError::Retriever(RetrieverError::Timeout { .. })
        )
    }
}

/// 一轮问答的失败
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("session {session_id}: {node} failed: {source}")]
    PortFailure {
        session_id: String,
        node: NodeId,
        #[source]
        source: PortError,
    },

    #[error("session {session_id}: turn cancelled at {node}")]
    Cancelled { session_id: String, node: NodeId },

    #[error("no active question for this turn")]
    NoActiveQuestion,
}

impl TurnError {
    /// 出错的节点（如有）
    pub fn node(&self) -> Option<NodeId> {
        match self {
            TurnError::PortFailure { node, .. } | TurnError::Cancelled { node, .. } => Some(*node),
            TurnError::NoActiveQuestion => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_failure_message_carries_context() {
        let err = TurnError::PortFailure {
            session_id: "alice".into(),
            node: NodeId::Classify,
            source: PortError::Llm(LlmError::Timeout { secs: 5 }),
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("question_classifier"));
        assert!(msg.contains("5s"));
        assert_eq!(err.node(), Some(NodeId::Classify));
    }

    #[test]
    fn test_timeout_detection() {
        assert!(PortError::Retriever(RetrieverError::Timeout { secs: 1 }).is_timeout());
        assert!(!PortError::Llm(LlmError::Api("x".into())).is_timeout());
    }
}
