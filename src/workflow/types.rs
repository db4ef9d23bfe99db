//! 状态机类型：节点、终态、转移

use std::fmt;

use serde::Serialize;

/// 每轮最多改进问题的次数；达到后不再进入 refine
pub const MAX_REPHRASES: u8 = 2;

/// 状态机节点
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    #[serde(rename = "question_rewriter")]
    Rewrite,
    #[serde(rename = "question_classifier")]
    Classify,
    #[serde(rename = "retrieve")]
    Retrieve,
    #[serde(rename = "retrieval_grader")]
    Grade,
    #[serde(rename = "refine_question")]
    Refine,
    #[serde(rename = "generate_answer")]
    Generate,
    #[serde(rename = "cannot_answer")]
    CannotAnswer,
    #[serde(rename = "off_topic_response")]
    OffTopic,
}

impl NodeId {
    pub fn name(&self) -> &'static str {
        match self {
            NodeId::Rewrite => "question_rewriter",
            NodeId::Classify => "question_classifier",
            NodeId::Retrieve => "retrieve",
            NodeId::Grade => "retrieval_grader",
            NodeId::Refine => "refine_question",
            NodeId::Generate => "generate_answer",
            NodeId::CannotAnswer => "cannot_answer",
            NodeId::OffTopic => "off_topic_response",
        }
    }

    /// 终态节点（执行后本轮结束）
    pub fn terminal(&self) -> Option<Terminal> {
        match self {
            NodeId::Generate => Some(Terminal::Generated),
            NodeId::CannotAnswer => Some(Terminal::CannotAnswer),
            NodeId::OffTopic => Some(Terminal::OffTopic),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一轮问答到达的终态；三者均为成功的轮次
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Generated,
    CannotAnswer,
    OffTopic,
}

/// 节点执行后的去向
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Next(NodeId),
    End(Terminal),
}
