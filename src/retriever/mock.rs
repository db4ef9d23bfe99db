//! 静态检索器（用于测试）：固定返回同一批段落，或按调用顺序返回预置批次

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::retriever::{Passage, Retriever, RetrieverError};

#[derive(Debug, Default)]
pub struct StaticRetriever {
    fixed: Vec<Passage>,
    batches: Mutex<VecDeque<Vec<Passage>>>,
    queries: Mutex<Vec<String>>,
    fail: bool,
}

impl StaticRetriever {
    /// 每次都返回同样的段落
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            fixed: passages,
            ..Default::default()
        }
    }

    /// 依次返回各批次；批次用完后返回 `fixed`（默认空）
    pub fn with_batches(batches: Vec<Vec<Passage>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Default::default()
        }
    }

    /// 每次调用都失败
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// 收到的查询（按调用顺序）
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Passage>, RetrieverError> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        if self.fail {
            return Err(RetrieverError::Search("index unavailable".to_string()));
        }
        let batch = self
            .batches
            .lock()
            .map_err(|e| RetrieverError::Search(e.to_string()))?
            .pop_front();
        Ok(batch.unwrap_or_else(|| self.fixed.clone()))
    }
}
