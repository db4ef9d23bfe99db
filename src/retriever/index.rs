//! 进程内检索索引
//!
//! 关键词检索（Jaccard）始终可用；配置了嵌入提供方时改为向量 + 关键词的
//! RRF（Reciprocal Rank Fusion）混合检索。结果按融合分数降序，截取 top_k。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::retriever::embedding::cosine_similarity;
use crate::retriever::tokenizer::{jaccard_similarity, tokenize_to_set};
use crate::retriever::{EmbeddingProvider, Passage, Retriever, RetrieverError};

/// RRF 常数
const RRF_K: f32 = 60.0;

/// 建索引时每次嵌入请求的段落数
const EMBED_BATCH: usize = 32;

struct Entry {
    passage: Passage,
    tokens: HashSet<String>,
    embedding: Option<Vec<f32>>,
}

/// 语料索引：构建后只读
pub struct CorpusIndex {
    entries: Vec<Entry>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    top_k: usize,
}

impl CorpusIndex {
    /// 纯关键词索引
    pub fn keyword(passages: Vec<Passage>, top_k: usize) -> Self {
        let entries = passages
            .into_iter()
            .map(|p| Entry {
                tokens: tokenize_to_set(&p.text),
                passage: p,
                embedding: None,
            })
            .collect();
        Self {
            entries,
            embedder: None,
            top_k: top_k.max(1),
        }
    }

    /// 混合索引：按批计算向量；某批失败时该批段落只参与关键词检索
    pub async fn hybrid(
        passages: Vec<Passage>,
        top_k: usize,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let mut index = Self::keyword(passages, top_k);
        let mut embedded = 0usize;
        for batch in index.entries.chunks_mut(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|e| e.passage.text.clone()).collect();
            match embedder.embed_batch(&texts).await {
                Ok(vectors) => {
                    for (entry, v) in batch.iter_mut().zip(vectors) {
                        if !v.is_empty() {
                            entry.embedding = Some(v);
                            embedded += 1;
                        }
                    }
                }
                Err(e) => tracing::warn!(
                    first = %batch[0].passage.source,
                    size = batch.len(),
                    error = %e,
                    "embedding batch failed"
                ),
            }
        }
        tracing::info!(embedded, total = index.entries.len(), "vector index built");
        index.embedder = Some(embedder);
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 关键词排名（仅正分），返回 entry 下标
    fn keyword_ranking(&self, query: &str) -> Vec<usize> {
        let query_tokens = tokenize_to_set(query);
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (jaccard_similarity(&query_tokens, &e.tokens), i))
            .filter(|(s, _)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, i)| i).collect()
    }

    fn vector_ranking(&self, query_embedding: &[f32]) -> Vec<usize> {
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                e.embedding
                    .as_ref()
                    .map(|emb| (cosine_similarity(query_embedding, emb), i))
            })
            .filter(|(s, _)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(_, i)| i).collect()
    }

    /// 多路排名 RRF 融合；同分时保持语料顺序
    fn fuse(&self, rankings: &[Vec<usize>]) -> Vec<usize> {
        let mut scores: HashMap<usize, f32> = HashMap::new();
        for ranking in rankings {
            for (rank, idx) in ranking.iter().take(self.top_k * 2).enumerate() {
                *scores.entry(*idx).or_insert(0.0) += 1.0 / (RRF_K + rank as f32);
            }
        }
        let mut fused: Vec<(usize, f32)> = scores.into_iter().collect();
        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        fused.into_iter().map(|(i, _)| i).collect()
    }
}

#[async_trait]
impl Retriever for CorpusIndex {
    async fn search(&self, query: &str) -> Result<Vec<Passage>, RetrieverError> {
        let mut rankings = vec![self.keyword_ranking(query)];

        if let Some(embedder) = &self.embedder {
            let query_embedding = embedder.embed(query).await?;
            if !query_embedding.is_empty() {
                rankings.push(self.vector_ranking(&query_embedding));
            }
        }

        Ok(self
            .fuse(&rankings)
            .into_iter()
            .take(self.top_k)
            .map(|i| self.entries[i].passage.clone())
            .collect())
    }
}
