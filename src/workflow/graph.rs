//! 转移表
//!
//! ```text
//! rewrite → classify ─┬─ yes ─► retrieve → grade ─┬─ proceed ───────────► generate (终)
//!                     │             ▲             ├─ count < 2 ─► refine ─┘
//!                     │             └─────────────┘
//!                     │                           └─ count ≥ 2 ─► cannot_answer (终)
//!                     └─ no ──► off_topic (终)
//! ```

use crate::core::{OnTopic, SessionState};
use crate::workflow::types::{NodeId, Terminal, Transition, MAX_REPHRASES};

/// 入口节点
pub const ENTRY: NodeId = NodeId::Rewrite;

/// 分类后：仅 on_topic == Yes 时检索
pub fn on_topic_router(state: &SessionState) -> NodeId {
    if state.on_topic == OnTopic::Yes {
        NodeId::Retrieve
    } else {
        NodeId::OffTopic
    }
}

/// 评分后：有相关段落则生成；否则次数未满改进，已满则放弃
pub fn proceed_router(state: &SessionState) -> NodeId {
    if state.proceed_to_generate {
        NodeId::Generate
    } else if state.rephrase_count < MAX_REPHRASES {
        NodeId::Refine
    } else {
        NodeId::CannotAnswer
    }
}

/// 节点执行完后的去向
pub fn next(node: NodeId, state: &SessionState) -> Transition {
    match node {
        NodeId::Rewrite => Transition::Next(NodeId::Classify),
        NodeId::Classify => Transition::Next(on_topic_router(state)),
        NodeId::Retrieve => Transition::Next(NodeId::Grade),
        NodeId::Grade => Transition::Next(proceed_router(state)),
        NodeId::Refine => Transition::Next(NodeId::Retrieve),
        NodeId::Generate => Transition::End(Terminal::Generated),
        NodeId::CannotAnswer => Transition::End(Terminal::CannotAnswer),
        NodeId::OffTopic => Transition::End(Terminal::OffTopic),
    }
}
