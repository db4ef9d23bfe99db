//! 检索端口：查询 -> 有序段落列表

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 检索到的一段文本及其出处
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// 出处标签，如 "label/page_3"
    pub source: String,
}

impl Passage {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("search failed: {0}")]
    Search(String),

    #[error("search timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("corpus io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 检索器 trait：结果按相关度排序，可为空
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Passage>, RetrieverError>;
}
