//! 段落向量化：混合检索的向量一路
//!
//! 建索引时按批请求 /embeddings，查询时单条请求。

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::openai::{endpoint_config, PLACEHOLDER_KEY};
use crate::retriever::RetrieverError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 单条文本的向量；空文本返回空向量
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrieverError>;

    /// 批量向量，顺序与输入一致；默认逐条调用 embed
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrieverError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::with_config(endpoint_config(base_url, api_key)),
            model: model.to_string(),
        }
    }

    async fn request(&self, input: EmbeddingInput) -> Result<Vec<(u32, Vec<f32>)>, RetrieverError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(input)
            .build()
            .map_err(|e| RetrieverError::Embedding(e.to_string()))?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| RetrieverError::Embedding(e.to_string()))?;
        Ok(response
            .data
            .into_iter()
            .map(|e| (e.index, e.embedding))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrieverError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let mut data = self.request(EmbeddingInput::String(text.to_string())).await?;
        Ok(data.pop().map(|(_, v)| v).unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrieverError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.request(EmbeddingInput::StringArray(texts.to_vec())).await?;
        let mut out = vec![Vec::new(); texts.len()];
        for (index, embedding) in data {
            if let Some(slot) = out.get_mut(index as usize) {
                *slot = embedding;
            }
        }
        Ok(out)
    }
}

/// 未配置嵌入模型或没有可用 key 时返回 None，检索退化为纯关键词
pub fn create_embedder_from_config(
    base_url: Option<&str>,
    model: Option<&str>,
    api_key: Option<&str>,
) -> Option<Arc<dyn EmbeddingProvider>> {
    let model = model?;
    let key = api_key
        .map(String::from)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.is_empty() && k != PLACEHOLDER_KEY);
    let Some(key) = key else {
        tracing::warn!(model, "embedding model configured but no API key, using keyword search");
        return None;
    };
    tracing::info!(model, "hybrid retrieval enabled");
    Some(Arc::new(OpenAiEmbedder::new(base_url, model, Some(&key))))
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, na, nb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, x, y), (p, q)| (d + p * q, x + p * p, y + q * q));
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}
