//! 工作流引擎
//!
//! 从入口节点出发，逐个执行节点并按转移表前进，直到抵达终态。
//! 本轮在会话状态的副本上运行，只有成功结束才写回；端口失败或取消时会话保持原样。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{SessionState, TurnError};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::retriever::Retriever;
use crate::workflow::graph::{self, ENTRY};
use crate::workflow::nodes::{run_node, NodeContext, NodeSettings};
use crate::workflow::types::{NodeId, Terminal, Transition};
use crate::workflow::TurnEvent;

/// 一轮问答的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub terminal: Terminal,
    /// 本轮追加的 assistant 消息内容
    pub answer: String,
    /// 依次经过的节点
    pub path: Vec<NodeId>,
    /// 本轮结束后的会话状态快照
    pub state: SessionState,
}

/// 问答状态机：持有两个端口与运行参数，可在多个会话间共享
pub struct QaWorkflow {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<dyn Retriever>,
    settings: NodeSettings,
}

impl QaWorkflow {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<dyn Retriever>,
        settings: NodeSettings,
    ) -> Self {
        Self {
            llm,
            retriever,
            settings,
        }
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 对 `state` 执行一轮问答
    pub async fn run(
        &self,
        state: &mut SessionState,
        question: Message,
        cancel: &CancellationToken,
        events: Option<&mpsc::UnboundedSender<TurnEvent>>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut working = state.clone();
        working.question = Some(question);

        let ctx = NodeContext {
            llm: self.llm.as_ref(),
            retriever: self.retriever.as_ref(),
            settings: &self.settings,
            session_id: &state.session_id,
            cancel,
            events,
        };

        let mut path = Vec::new();
        let mut node = ENTRY;
        let terminal = loop {
            if cancel.is_cancelled() {
                return Err(ctx.cancelled(node));
            }
            tracing::debug!(session = %state.session_id, node = %node, "entering node");
            ctx.emit(TurnEvent::NodeEntered { node });
            path.push(node);

            run_node(node, &ctx, &mut working).await?;

            match graph::next(node, &working) {
                Transition::Next(n) => node = n,
                Transition::End(t) => {
                    debug_assert_eq!(node.terminal(), Some(t));
                    break t;
                }
            }
        };

        let answer = working
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        ctx.emit(TurnEvent::Finished { terminal });
        tracing::info!(
            session = %state.session_id,
            terminal = ?terminal,
            steps = path.len(),
            "turn finished"
        );

        *state = working;
        Ok(TurnOutcome {
            terminal,
            answer,
            path,
            state: state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OnTopic;
    use crate::llm::ScriptedLlmClient;
    use crate::retriever::{Passage, StaticRetriever};

    fn workflow(llm: ScriptedLlmClient, retriever: StaticRetriever) -> QaWorkflow {
        QaWorkflow::new(Arc::new(llm), Arc::new(retriever), NodeSettings::default())
    }

    #[tokio::test]
    async fn test_happy_path() {
        let wf = workflow(
            ScriptedLlmClient::new(["Yes", "Yes", "70 mg monthly"]),
            StaticRetriever::new(vec![Passage::new("Aimovig 70 mg", "label/page_1")]),
        );
        let mut state = SessionState::new("s", 10);
        let out = wf
            .run(&mut state, Message::user("Aimovig dose?"), &CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(out.terminal, Terminal::Generated);
        assert_eq!(out.answer, "70 mg monthly");
        assert_eq!(
            out.path,
            vec![NodeId::Rewrite, NodeId::Classify, NodeId::Retrieve, NodeId::Grade, NodeId::Generate]
        );
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.on_topic, OnTopic::Yes);
    }

    #[tokio::test]
    async fn test_failure_leaves_session_untouched() {
        let wf = workflow(ScriptedLlmClient::new(["Yes"]), StaticRetriever::failing());
        let mut state = SessionState::new("s", 10);
        let err = wf
            .run(&mut state, Message::user("q"), &CancellationToken::new(), None)
            .await
            .unwrap_err();

        assert_eq!(err.node(), Some(NodeId::Retrieve));
        assert!(state.messages.is_empty());
        assert!(state.question.is_none());
        assert_eq!(state.on_topic, OnTopic::Unset);
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let wf = workflow(ScriptedLlmClient::new(["No"]), StaticRetriever::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = SessionState::new("s", 10);
        wf.run(&mut state, Message::user("weather?"), &CancellationToken::new(), Some(&tx))
            .await
            .unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.first(), Some(&TurnEvent::NodeEntered { node: NodeId::Rewrite }));
        assert_eq!(
            events.last(),
            Some(&TurnEvent::Finished { terminal: Terminal::OffTopic })
        );
    }
}
