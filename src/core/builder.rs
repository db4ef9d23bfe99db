//! 编排器构建器：从配置装配语料索引、LLM、状态机与反馈落盘端

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::orchestrator::{create_llm_from_config, Orchestrator};
use crate::feedback::{CsvFeedbackSink, FeedbackSink};
use crate::llm::LlmClient;
use crate::memory::ImportancePolicy;
use crate::retriever::{
    create_embedder_from_config, load_corpus, Chunker, ChunkingConfig, CorpusIndex, CorpusOptions,
    Retriever,
};
use crate::workflow::WorkflowBuilder;

/// 编排器构建器；未显式注入的端口按配置创建
pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    retriever: Option<Arc<dyn Retriever>>,
    sink: Option<Arc<dyn FeedbackSink>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            retriever: None,
            sink: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn FeedbackSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 加载语料并建索引；目录缺失时返回空索引（每轮都会走到 cannot_answer）
    pub async fn build_index(&self) -> CorpusIndex {
        let cfg = &self.config.retriever;
        let options = CorpusOptions {
            min_paragraph_chars: cfg.min_paragraph_chars,
            chunker: Chunker::new(ChunkingConfig {
                chunk_size: cfg.chunk_size,
                chunk_overlap: cfg.chunk_overlap,
                ..Default::default()
            }),
        };
        let passages = load_corpus(&cfg.corpus_dir, &options).unwrap_or_else(|e| {
            tracing::warn!("Corpus load failed ({}), starting with an empty index", e);
            Vec::new()
        });

        match create_embedder_from_config(
            self.config.llm.base_url.as_deref(),
            cfg.embedding_model.as_deref(),
            None,
        ) {
            Some(embedder) => CorpusIndex::hybrid(passages, cfg.top_k, embedder).await,
            None => CorpusIndex::keyword(passages, cfg.top_k),
        }
    }

    pub async fn build(self) -> Orchestrator {
        let retriever = match self.retriever.clone() {
            Some(r) => r,
            None => Arc::new(self.build_index().await),
        };
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config));
        let sink = self
            .sink
            .clone()
            .unwrap_or_else(|| Arc::new(CsvFeedbackSink::new(&self.config.feedback.path)));

        let memory = &self.config.memory;
        let workflow = WorkflowBuilder::new()
            .llm(llm)
            .retriever(retriever)
            .context_window(memory.context_window)
            .llm_timeout(self.config.llm_timeout())
            .retriever_timeout(self.config.retriever_timeout())
            .importance(ImportancePolicy::new(&memory.important_keywords))
            .build();

        Orchestrator::new(workflow, sink)
            .with_summary_chars(self.config.feedback.summary_chars)
            .with_short_term_turns(memory.max_short_term_turns)
    }
}

/// 便捷函数：从默认路径加载配置并创建构建器；配置加载失败时使用默认值
pub fn create_orchestrator_builder(config_path: Option<PathBuf>) -> OrchestratorBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    OrchestratorBuilder::new(config)
}
