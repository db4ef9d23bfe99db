//! 编排器：会话表、轮次准入与反馈
//!
//! 每个会话一把 tokio Mutex。begin_turn 取得会话的 owned guard，Turn 存活期间同一会话的其它轮次等待；
//! guard 覆盖运行与反馈收集两步，不同会话互不阻塞。会话首次出现时创建，不淘汰。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{SessionState, TurnError};
use crate::feedback::{collect_feedback, FeedbackError, FeedbackRecord, FeedbackSink, DEFAULT_SUMMARY_CHARS};
use crate::llm::{
    create_deepseek_client, create_ollama_client, deepseek_api_key, LlmClient, MockLlmClient, OpenAiClient,
    SamplingParams,
};
use crate::memory::Message;
use crate::workflow::{QaWorkflow, Terminal, TurnEvent, TurnOutcome};

/// 根据配置与环境变量选择 LLM 后端（Ollama / OpenAI 兼容 / DeepSeek / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let sampling = SamplingParams {
        temperature: cfg.llm.temperature,
        top_p: cfg.llm.top_p,
        max_tokens: cfg.llm.max_tokens,
    };
    let model = cfg.llm.model.as_str();

    match provider.as_str() {
        "ollama" => {
            tracing::info!("Using Ollama LLM ({})", model);
            Arc::new(
                create_ollama_client(cfg.llm.base_url.as_deref(), Some(model))
                    .with_sampling(sampling),
            )
        }
        "openai" => match std::env::var("OPENAI_API_KEY") {
            Ok(key) => {
                tracing::info!("Using OpenAI LLM ({})", model);
                Arc::new(
                    OpenAiClient::new(cfg.llm.base_url.as_deref(), model, Some(&key))
                        .with_sampling(sampling),
                )
            }
            Err(_) => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "deepseek" => match deepseek_api_key() {
            Some(key) => {
                tracing::info!("Using DeepSeek LLM ({})", model);
                Arc::new(
                    create_deepseek_client(cfg.llm.base_url.as_deref(), Some(model), &key)
                        .with_sampling(sampling),
                )
            }
            None => {
                tracing::warn!("DEEPSEEK_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "mock" => Arc::new(MockLlmClient),
        other => {
            tracing::warn!("Unknown LLM provider '{}', using Mock LLM", other);
            Arc::new(MockLlmClient)
        }
    }
}

/// 会话编排器：共享一个问答状态机与一个反馈落盘端
pub struct Orchestrator {
    workflow: QaWorkflow,
    sink: Arc<dyn FeedbackSink>,
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
    summary_chars: usize,
    max_short_term_turns: usize,
}

impl Orchestrator {
    pub fn new(workflow: QaWorkflow, sink: Arc<dyn FeedbackSink>) -> Self {
        Self {
            workflow,
            sink,
            sessions: RwLock::new(HashMap::new()),
            events: None,
            summary_chars: DEFAULT_SUMMARY_CHARS,
            max_short_term_turns: 10,
        }
    }

    /// 每轮把过程事件发往该通道
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn with_summary_chars(mut self, n: usize) -> Self {
        self.summary_chars = n;
        self
    }

    /// 新建会话的短期记忆轮数上限
    pub fn with_short_term_turns(mut self, n: usize) -> Self {
        self.max_short_term_turns = n;
        self
    }

    pub fn workflow(&self) -> &QaWorkflow {
        &self.workflow
    }

    async fn session(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        if let Some(s) = self.sessions.read().await.get(session_id) {
            return Arc::clone(s);
        }
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::info!(session = %session_id, "session created");
            Arc::new(Mutex::new(SessionState::new(
                session_id,
                self.max_short_term_turns,
            )))
        });
        Arc::clone(entry)
    }

    /// 独占一个会话开始新的一轮；同一会话上一轮的 Turn 释放前会在此等待
    pub async fn begin_turn(&self, session_id: &str) -> Turn<'_> {
        let guard = self.session(session_id).await.lock_owned().await;
        Turn {
            orchestrator: self,
            state: guard,
            completed: None,
        }
    }

    /// 单次问答（不收集反馈）
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<TurnOutcome, TurnError> {
        self.begin_turn(session_id).await.run(question).await
    }

    /// 会话状态副本；会话不存在时为 None
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionState> {
        let session = self.sessions.read().await.get(session_id).cloned()?;
        let state = session.lock().await;
        Some(state.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// 一轮问答的独占句柄
pub struct Turn<'a> {
    orchestrator: &'a Orchestrator,
    state: OwnedMutexGuard<SessionState>,
    /// 最近一次成功运行的终态；记录反馈后清空，每轮至多一条反馈
    completed: Option<Terminal>,
}

impl Turn<'_> {
    pub async fn run(&mut self, question: &str) -> Result<TurnOutcome, TurnError> {
        self.run_with_cancel(question, CancellationToken::new()).await
    }

    /// 可取消地运行；取消或端口失败时会话状态保持本轮开始前的样子
    pub async fn run_with_cancel(
        &mut self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        self.completed = None;
        let question = Message::user(question);
        let outcome = self
            .orchestrator
            .workflow
            .run(
                &mut self.state,
                question,
                &cancel,
                self.orchestrator.events.as_ref(),
            )
            .await?;
        self.completed = Some(outcome.terminal);
        Ok(outcome)
    }

    /// 记录本轮反馈并追加到落盘端
    ///
    /// 本 Turn 没有成功完成的运行，或该次运行已记录过反馈时返回 `NoCompletedTurn`。
    /// 落盘失败时保留完成标记，可以重试。
    pub async fn record_feedback(&mut self, feedback: &str) -> Result<FeedbackRecord, FeedbackError> {
        let Some(terminal) = self.completed else {
            return Err(FeedbackError::NoCompletedTurn);
        };
        let record = collect_feedback(&mut self.state, feedback, self.orchestrator.summary_chars)?;
        self.orchestrator.sink.append(&record).await?;
        self.completed = None;
        tracing::info!(
            session = %self.state.session_id,
            terminal = ?terminal,
            feedback = %record.feedback,
            "feedback recorded"
        );
        Ok(record)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::MemoryFeedbackSink;
    use crate::llm::ScriptedLlmClient;
    use crate::retriever::{Passage, StaticRetriever};
    use crate::workflow::{NodeSettings, Terminal};

    fn orchestrator(replies: Vec<&str>, sink: Arc<MemoryFeedbackSink>) -> Orchestrator {
        let workflow = QaWorkflow::new(
            Arc::new(ScriptedLlmClient::new(replies)),
            Arc::new(StaticRetriever::new(vec![Passage::new(
                "Repatha 140 mg every two weeks",
                "repatha/page_3",
            )])),
            NodeSettings::default(),
        );
        Orchestrator::new(workflow, sink)
    }

    #[tokio::test]
    async fn test_turn_then_feedback() {
        let sink = Arc::new(MemoryFeedbackSink::new());
        let orch = orchestrator(vec!["Yes", "Yes", "140 mg"], sink.clone());

        let mut turn = orch.begin_turn("alice").await;
        let out = turn.run("Repatha dosage?").await.unwrap();
        assert_eq!(out.terminal, Terminal::Generated);
        let record = turn.record_feedback("  YES ").await.unwrap();
        drop(turn);

        assert_eq!(record.feedback, "yes");
        assert_eq!(record.answer, "140 mg");
        assert_eq!(sink.records().len(), 1);
        let snap = orch.snapshot("alice").await.unwrap();
        assert_eq!(snap.feedback, "yes");
        assert_eq!(snap.long_term.len(), 2);
    }

    #[tokio::test]
    async fn test_feedback_before_any_turn() {
        let sink = Arc::new(MemoryFeedbackSink::new());
        let orch = orchestrator(vec![], sink.clone());
        let mut turn = orch.begin_turn("bob").await;
        assert!(matches!(
            turn.record_feedback("yes").await,
            Err(FeedbackError::NoCompletedTurn)
        ));
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_created_lazily() {
        let orch = orchestrator(vec!["No"], Arc::new(MemoryFeedbackSink::new()));
        assert!(orch.snapshot("carol").await.is_none());
        orch.ask("carol", "what's the weather").await.unwrap();
        assert_eq!(orch.session_count().await, 1);
        assert!(orch.snapshot("carol").await.is_some());
    }

    #[test]
    fn test_unknown_provider_falls_back_to_mock() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "nonsense".into();
        let llm = create_llm_from_config(&cfg);
        assert_eq!(llm.token_usage(), (0, 0, 0));
    }
}
