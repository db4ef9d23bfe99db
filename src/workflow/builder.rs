//! 工作流构建器
//!
//! 提供流畅的API来组装问答状态机

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{LlmClient, MockLlmClient};
use crate::memory::ImportancePolicy;
use crate::retriever::{Retriever, StaticRetriever};
use crate::workflow::engine::QaWorkflow;
use crate::workflow::nodes::NodeSettings;

/// 工作流构建器；未设置的端口回落到 Mock 与空检索器
#[derive(Default)]
pub struct WorkflowBuilder {
    llm: Option<Arc<dyn LlmClient>>,
    retriever: Option<Arc<dyn Retriever>>,
    settings: NodeSettings,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// 改写与生成使用的短期记忆条数
    pub fn context_window(mut self, n: usize) -> Self {
        self.settings.context_window = n;
        self
    }

    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.settings.llm_timeout = timeout;
        self
    }

    pub fn retriever_timeout(mut self, timeout: Duration) -> Self {
        self.settings.retriever_timeout = timeout;
        self
    }

    pub fn importance(mut self, policy: ImportancePolicy) -> Self {
        self.settings.importance = policy;
        self
    }

    pub fn build(self) -> QaWorkflow {
        let llm = self.llm.unwrap_or_else(|| Arc::new(MockLlmClient));
        let retriever = self
            .retriever
            .unwrap_or_else(|| Arc::new(StaticRetriever::default()));
        QaWorkflow::new(llm, retriever, self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_settings() {
        let wf = WorkflowBuilder::new()
            .context_window(6)
            .llm_timeout(Duration::from_secs(5))
            .importance(ImportancePolicy::new(["storage"]))
            .build();
        assert_eq!(wf.settings().context_window, 6);
        assert_eq!(wf.settings().llm_timeout, Duration::from_secs(5));
        assert_eq!(wf.settings().retriever_timeout, Duration::from_secs(30));
        assert!(wf.settings().importance.is_important("Storage rules"));
    }
}
