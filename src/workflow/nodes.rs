//! 状态机节点
//!
//! 每个节点独占地修改 SessionState，不做路由（路由见 graph.rs）。
//! 端口调用统一经 NodeContext：带超时、可被取消，失败附上会话与节点后上抛，节点内不做恢复。

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{OnTopic, PortError, SessionState, TurnError};
use crate::llm::{LlmClient, LlmError};
use crate::memory::{ImportancePolicy, Message};
use crate::retriever::{Passage, Retriever, RetrieverError};
use crate::workflow::prompts::{self, CANNOT_ANSWER_MESSAGE, OFF_TOPIC_MESSAGE};
use crate::workflow::types::{NodeId, MAX_REPHRASES};
use crate::workflow::verdict::is_affirmative;
use crate::workflow::TurnEvent;

/// 节点运行参数
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// 改写与生成共用的短期记忆窗口（消息条数）
    pub context_window: usize,
    pub llm_timeout: Duration,
    pub retriever_timeout: Duration,
    pub importance: ImportancePolicy,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            context_window: 4,
            llm_timeout: Duration::from_secs(60),
            retriever_timeout: Duration::from_secs(30),
            importance: ImportancePolicy::default(),
        }
    }
}

/// 单轮运行期上下文：端口、参数、取消令牌、事件通道
pub struct NodeContext<'a> {
    pub llm: &'a dyn LlmClient,
    pub retriever: &'a dyn Retriever,
    pub settings: &'a NodeSettings,
    pub session_id: &'a str,
    pub cancel: &'a CancellationToken,
    pub events: Option<&'a mpsc::UnboundedSender<TurnEvent>>,
}

impl NodeContext<'_> {
    pub fn emit(&self, event: TurnEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn failure(&self, node: NodeId, source: PortError) -> TurnError {
        tracing::error!(session = %self.session_id, node = %node, error = %source, "port call failed");
        TurnError::PortFailure {
            session_id: self.session_id.to_string(),
            node,
            source,
        }
    }

    pub fn cancelled(&self, node: NodeId) -> TurnError {
        tracing::warn!(session = %self.session_id, node = %node, "turn cancelled");
        TurnError::Cancelled {
            session_id: self.session_id.to_string(),
            node,
        }
    }

    pub async fn call_llm(&self, node: NodeId, prompt: &[Message]) -> Result<String, TurnError> {
        let deadline = self.settings.llm_timeout;
        tracing::debug!(session = %self.session_id, node = %node, messages = prompt.len(), "llm call");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled(node)),
            res = tokio::time::timeout(deadline, self.llm.complete(prompt)) => match res {
                Ok(Ok(text)) => {
                    tracing::debug!(session = %self.session_id, node = %node, output = %text, "llm output");
                    Ok(text)
                }
                Ok(Err(e)) => Err(self.failure(node, e.into())),
                Err(_) => Err(self.failure(node, LlmError::Timeout { secs: deadline.as_secs() }.into())),
            },
        }
    }

    pub async fn call_retriever(&self, node: NodeId, query: &str) -> Result<Vec<Passage>, TurnError> {
        let deadline = self.settings.retriever_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled(node)),
            res = tokio::time::timeout(deadline, self.retriever.search(query)) => match res {
                Ok(Ok(passages)) => Ok(passages),
                Ok(Err(e)) => Err(self.failure(node, e.into())),
                Err(_) => Err(self.failure(node, RetrieverError::Timeout { secs: deadline.as_secs() }.into())),
            },
        }
    }
}

/// 分派到具体节点
pub async fn run_node(
    node: NodeId,
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<(), TurnError> {
    match node {
        NodeId::Rewrite => question_rewriter(ctx, state).await,
        NodeId::Classify => question_classifier(ctx, state).await,
        NodeId::Retrieve => retrieve(ctx, state).await,
        NodeId::Grade => retrieval_grader(ctx, state).await,
        NodeId::Refine => refine_question(ctx, state).await,
        NodeId::Generate => generate_answer(ctx, state).await,
        NodeId::CannotAnswer => {
            cannot_answer(state);
            Ok(())
        }
        NodeId::OffTopic => {
            off_topic_response(state);
            Ok(())
        }
    }
}

/// 入口：重置每轮字段，登记问题，生成独立的检索问题
///
/// 只有一条消息（首轮）时直接使用原问题；否则带上最近短期记忆让模型改写。
/// 问题按 id 去重：若已是最后一条消息则不重复追加。
pub async fn question_rewriter(
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<(), TurnError> {
    state.reset_turn();
    let question = state.question.clone().ok_or(TurnError::NoActiveQuestion)?;

    let already_last = state
        .messages
        .last()
        .is_some_and(|m| m.is_same(&question));
    if !already_last {
        state.messages.push(question.clone());
    }

    if state.messages.len() > 1 {
        let context = state.short_term.recent(ctx.settings.context_window);
        let prompt = prompts::rewrite(context, &question.content);
        let out = ctx.call_llm(NodeId::Rewrite, &prompt).await?;
        state.rephrased_question = out.trim().to_string();
        tracing::info!(session = %ctx.session_id, rephrased = %state.rephrased_question, "question rephrased");
        ctx.emit(TurnEvent::Rephrased {
            text: state.rephrased_question.clone(),
        });
    } else {
        state.rephrased_question = question.content.clone();
        tracing::info!(session = %ctx.session_id, question = %state.rephrased_question, "user question");
        ctx.emit(TurnEvent::UserQuestion {
            text: state.rephrased_question.clone(),
        });
    }
    Ok(())
}

pub async fn question_classifier(
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<(), TurnError> {
    let prompt = prompts::classify(&state.rephrased_question);
    let raw = ctx.call_llm(NodeId::Classify, &prompt).await?;
    state.on_topic = if is_affirmative(&raw) {
        OnTopic::Yes
    } else {
        OnTopic::No
    };
    tracing::info!(session = %ctx.session_id, raw = %raw.trim(), on_topic = %state.on_topic, "classified");
    ctx.emit(TurnEvent::Classified {
        raw: raw.trim().to_lowercase(),
        on_topic: state.on_topic,
    });
    Ok(())
}

/// 检索结果整体替换 documents，不做过滤
pub async fn retrieve(ctx: &NodeContext<'_>, state: &mut SessionState) -> Result<(), TurnError> {
    state.documents = ctx
        .call_retriever(NodeId::Retrieve, &state.rephrased_question)
        .await?;
    tracing::info!(session = %ctx.session_id, count = state.documents.len(), "retrieved documents");
    ctx.emit(TurnEvent::Retrieved {
        count: state.documents.len(),
    });
    Ok(())
}

/// 逐段调用一次模型判定相关性，保留相关段落（保持原顺序）
pub async fn retrieval_grader(
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<(), TurnError> {
    let mut relevant = Vec::with_capacity(state.documents.len());
    for doc in &state.documents {
        let prompt = prompts::grade(&state.rephrased_question, doc);
        let verdict = is_affirmative(&ctx.call_llm(NodeId::Grade, &prompt).await?);
        tracing::debug!(session = %ctx.session_id, source = %doc.source, relevant = verdict, "relevance check");
        ctx.emit(TurnEvent::RelevanceCheck {
            source: doc.source.clone(),
            relevant: verdict,
        });
        if verdict {
            relevant.push(doc.clone());
        }
    }
    state.documents = relevant;
    state.proceed_to_generate = !state.documents.is_empty();
    tracing::info!(
        session = %ctx.session_id,
        relevant = state.documents.len(),
        proceed = state.proceed_to_generate,
        "graded documents"
    );
    ctx.emit(TurnEvent::ProceedToGenerate {
        proceed: state.proceed_to_generate,
    });
    Ok(())
}

/// 次数已满时原样通过；否则让模型微调检索问题并计数
pub async fn refine_question(
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<(), TurnError> {
    if state.rephrase_count >= MAX_REPHRASES {
        return Ok(());
    }
    let prompt = prompts::refine(&state.rephrased_question);
    let out = ctx.call_llm(NodeId::Refine, &prompt).await?;
    state.rephrased_question = out.trim().to_string();
    state.rephrase_count += 1;
    tracing::info!(
        session = %ctx.session_id,
        attempt = state.rephrase_count,
        rephrased = %state.rephrased_question,
        "question refined"
    );
    ctx.emit(TurnEvent::Refined {
        text: state.rephrased_question.clone(),
        attempt: state.rephrase_count,
    });
    Ok(())
}

/// 基于短期记忆窗口与评分后的段落生成答案，写入短期记忆；重要问题另写入长期记忆
pub async fn generate_answer(
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<(), TurnError> {
    debug_assert!(!state.documents.is_empty(), "generate requires graded documents");
    let question = state.question.clone().ok_or(TurnError::NoActiveQuestion)?;

    let history = state.short_term.recent(ctx.settings.context_window);
    let prompt = prompts::generate(history, &state.documents, &state.rephrased_question);
    let out = ctx.call_llm(NodeId::Generate, &prompt).await?;
    let answer = Message::assistant(out.trim());

    state.messages.push(answer.clone());
    state.short_term.push_exchange(question.clone(), answer.clone());

    let important = ctx.settings.importance.is_important(&question.content);
    if important {
        state.long_term.push(question);
        state.long_term.push(answer);
    }

    tracing::info!(session = %ctx.session_id, long_term = important, "answer generated");
    ctx.emit(TurnEvent::AnswerGenerated {
        long_term: important,
    });
    Ok(())
}

pub fn cannot_answer(state: &mut SessionState) {
    state.messages.push(Message::assistant(CANNOT_ANSWER_MESSAGE));
    tracing::info!(session = %state.session_id, "no relevant documents, cannot answer");
}

pub fn off_topic_response(state: &mut SessionState) {
    state.messages.push(Message::assistant(OFF_TOPIC_MESSAGE));
    tracing::info!(session = %state.session_id, "question marked as off-topic");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::retriever::StaticRetriever;

    struct Harness {
        llm: ScriptedLlmClient,
        retriever: StaticRetriever,
        settings: NodeSettings,
        cancel: CancellationToken,
    }

    impl Harness {
        fn new(replies: Vec<&str>, passages: Vec<Passage>) -> Self {
            Self {
                llm: ScriptedLlmClient::new(replies),
                retriever: StaticRetriever::new(passages),
                settings: NodeSettings::default(),
                cancel: CancellationToken::new(),
            }
        }

        fn ctx(&self) -> NodeContext<'_> {
            NodeContext {
                llm: &self.llm,
                retriever: &self.retriever,
                settings: &self.settings,
                session_id: "test",
                cancel: &self.cancel,
                events: None,
            }
        }
    }

    fn with_question(text: &str) -> SessionState {
        let mut s = SessionState::new("test", 10);
        s.question = Some(Message::user(text));
        s
    }

    #[tokio::test]
    async fn test_first_turn_uses_question_verbatim() {
        let h = Harness::new(vec![], vec![]);
        let mut s = with_question("What is Aimovig?");
        question_rewriter(&h.ctx(), &mut s).await.unwrap();
        assert_eq!(s.rephrased_question, "What is Aimovig?");
        assert_eq!(s.messages.len(), 1);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_later_turn_rewrites_with_context() {
        let h = Harness::new(vec!["  What is the Repatha dosage?  "], vec![]);
        let mut s = with_question("and its dosage?");
        s.messages.push(Message::user("Tell me about Repatha"));
        s.messages.push(Message::assistant("Repatha is evolocumab."));
        s.short_term.push_exchange(
            Message::user("Tell me about Repatha"),
            Message::assistant("Repatha is evolocumab."),
        );

        question_rewriter(&h.ctx(), &mut s).await.unwrap();

        assert_eq!(s.rephrased_question, "What is the Repatha dosage?");
        let prompt = &h.llm.prompts()[0];
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[3].content, "and its dosage?");
    }

    #[tokio::test]
    async fn test_rewriter_does_not_duplicate_replayed_question() {
        let h = Harness::new(vec!["rq"], vec![]);
        let mut s = with_question("first");
        question_rewriter(&h.ctx(), &mut s).await.unwrap();
        question_rewriter(&h.ctx(), &mut s).await.unwrap();
        assert_eq!(s.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_rewriter_reset_is_idempotent() {
        let h = Harness::new(vec![], vec![]);
        let mut s = with_question("q");
        s.documents = vec![Passage::new("stale", "x")];
        s.on_topic = OnTopic::No;
        s.proceed_to_generate = true;
        s.rephrase_count = 2;

        question_rewriter(&h.ctx(), &mut s).await.unwrap();
        let first = (s.on_topic, s.documents.clone(), s.proceed_to_generate, s.rephrase_count);
        question_rewriter(&h.ctx(), &mut s).await.unwrap();
        let second = (s.on_topic, s.documents.clone(), s.proceed_to_generate, s.rephrase_count);

        assert_eq!(first, second);
        assert_eq!(first, (OnTopic::Unset, vec![], false, 0));
    }

    #[tokio::test]
    async fn test_rewriter_without_question_fails() {
        let h = Harness::new(vec![], vec![]);
        let mut s = SessionState::new("test", 10);
        assert!(matches!(
            question_rewriter(&h.ctx(), &mut s).await,
            Err(TurnError::NoActiveQuestion)
        ));
    }

    #[tokio::test]
    async fn test_classifier_lossy_parse() {
        for (raw, expected) in [
            ("Yes", OnTopic::Yes),
            ("  yes.", OnTopic::Yes),
            ("No", OnTopic::No),
            ("I think yes", OnTopic::No),
            ("", OnTopic::No),
        ] {
            let h = Harness::new(vec![raw], vec![]);
            let mut s = with_question("q");
            s.rephrased_question = "q".into();
            question_classifier(&h.ctx(), &mut s).await.unwrap();
            assert_eq!(s.on_topic, expected, "raw = {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_grader_keeps_relevant_in_order() {
        let docs = vec![
            Passage::new("a", "p1"),
            Passage::new("b", "p2"),
            Passage::new("c", "p3"),
        ];
        let h = Harness::new(vec!["Yes", "no", "yes"], vec![]);
        let mut s = with_question("q");
        s.documents = docs;
        retrieval_grader(&h.ctx(), &mut s).await.unwrap();
        let kept: Vec<_> = s.documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(kept, vec!["p1", "p3"]);
        assert!(s.proceed_to_generate);
        assert_eq!(h.llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_grader_with_no_documents_does_not_proceed() {
        let h = Harness::new(vec![], vec![]);
        let mut s = with_question("q");
        retrieval_grader(&h.ctx(), &mut s).await.unwrap();
        assert!(!s.proceed_to_generate);
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refine_is_bounded() {
        let h = Harness::new(vec![" r1 ", "r2", "r3"], vec![]);
        let mut s = with_question("q");
        s.rephrased_question = "q".into();
        refine_question(&h.ctx(), &mut s).await.unwrap();
        refine_question(&h.ctx(), &mut s).await.unwrap();
        refine_question(&h.ctx(), &mut s).await.unwrap();
        assert_eq!(s.rephrased_question, "r2");
        assert_eq!(s.rephrase_count, MAX_REPHRASES);
        assert_eq!(h.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_generate_writes_memories() {
        let h = Harness::new(vec![" 70 mg once monthly "], vec![]);
        let mut s = with_question("What is the dosage of Aimovig?");
        s.rephrased_question = "Aimovig dosage".into();
        s.documents = vec![Passage::new("Aimovig 70 mg", "label/page_2")];

        generate_answer(&h.ctx(), &mut s).await.unwrap();

        assert_eq!(s.messages.last().unwrap().content, "70 mg once monthly");
        assert_eq!(s.short_term.len(), 2);
        assert_eq!(s.long_term.len(), 2);
        assert_eq!(s.long_term[0].content, "What is the dosage of Aimovig?");
    }

    #[tokio::test]
    async fn test_llm_timeout_becomes_port_failure() {
        struct Slow;
        #[async_trait::async_trait]
        impl LlmClient for Slow {
            async fn complete(&self, _: &[Message]) -> Result<String, LlmError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("Yes".into())
            }
        }
        let retriever = StaticRetriever::default();
        let settings = NodeSettings {
            llm_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let ctx = NodeContext {
            llm: &Slow,
            retriever: &retriever,
            settings: &settings,
            session_id: "slow",
            cancel: &cancel,
            events: None,
        };
        let mut s = with_question("q");
        let err = question_classifier(&ctx, &mut s).await.unwrap_err();
        match err {
            TurnError::PortFailure { node, source, .. } => {
                assert_eq!(node, NodeId::Classify);
                assert!(source.is_timeout());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_port_call() {
        let h = Harness::new(vec!["Yes"], vec![]);
        h.cancel.cancel();
        let mut s = with_question("q");
        let err = question_classifier(&h.ctx(), &mut s).await.unwrap_err();
        assert!(matches!(err, TurnError::Cancelled { node: NodeId::Classify, .. }));
        assert_eq!(s.on_topic, OnTopic::Unset);
    }
}
