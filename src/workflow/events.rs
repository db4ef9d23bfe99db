//! 轮次过程事件：供 CLI / 前端实时展示节点进度与判定结果

use std::fmt;

use serde::Serialize;

use crate::core::OnTopic;
use crate::workflow::{NodeId, Terminal};

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// 进入节点
    NodeEntered { node: NodeId },
    /// 首轮问题原样作为检索问题
    UserQuestion { text: String },
    /// 结合历史改写后的问题
    Rephrased { text: String },
    /// 分类器原始输出与判定
    Classified { raw: String, on_topic: OnTopic },
    Retrieved { count: usize },
    /// 单段相关性判定
    RelevanceCheck { source: String, relevant: bool },
    ProceedToGenerate { proceed: bool },
    Refined { text: String, attempt: u8 },
    /// 生成完成；long_term 表示是否写入长期记忆
    AnswerGenerated { long_term: bool },
    Finished { terminal: Terminal },
}

impl fmt::Display for TurnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnEvent::NodeEntered { node } => write!(f, "➡️  {}", node),
            TurnEvent::UserQuestion { text } => write!(f, "🗣️ User Question: {}", text),
            TurnEvent::Rephrased { text } => write!(f, "✏️ Rephrased: {}", text),
            TurnEvent::Classified { raw, on_topic } => {
                write!(f, "📌 Classifier Response: {} ✅ On Topic: {}", raw, on_topic)
            }
            TurnEvent::Retrieved { count } => write!(f, "📚 Retrieved {} documents.", count),
            TurnEvent::RelevanceCheck { source, relevant } => write!(
                f,
                "🧪 Relevance Check [{}]: {}",
                source,
                if *relevant { "✅" } else { "❌" }
            ),
            TurnEvent::ProceedToGenerate { proceed } => {
                write!(f, "📊 Proceed to generate: {}", proceed)
            }
            TurnEvent::Refined { text, attempt } => {
                write!(f, "🔁 Refined question (attempt {}): {}", attempt, text)
            }
            TurnEvent::AnswerGenerated { long_term } => write!(
                f,
                "📝 Answer generated{}",
                if *long_term { " (saved to long-term memory)" } else { "" }
            ),
            TurnEvent::Finished { terminal } => match terminal {
                Terminal::Generated => write!(f, "🏁 Done"),
                Terminal::CannotAnswer => {
                    write!(f, "❌ No relevant documents found. Cannot answer.")
                }
                Terminal::OffTopic => write!(f, "🚫 Question marked as off-topic."),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(TurnEvent::NodeEntered {
            node: NodeId::Grade,
        })
        .unwrap();
        assert_eq!(json["type"], "node_entered");
        assert_eq!(json["node"], "retrieval_grader");

        let json = serde_json::to_value(TurnEvent::Finished {
            terminal: Terminal::CannotAnswer,
        })
        .unwrap();
        assert_eq!(json["terminal"], "cannot_answer");
    }

    #[test]
    fn test_display() {
        let line = TurnEvent::Retrieved { count: 3 }.to_string();
        assert_eq!(line, "📚 Retrieved 3 documents.");
    }
}
