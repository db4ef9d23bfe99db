//! 检索层：检索端口、语料加载与分块、关键词 / 混合索引、嵌入

pub mod chunker;
pub mod corpus;
pub mod embedding;
pub mod index;
pub mod mock;
pub mod tokenizer;
pub mod traits;

pub use chunker::{Chunker, ChunkingConfig};
pub use corpus::{load_corpus, split_document, CorpusOptions};
pub use embedding::{create_embedder_from_config, EmbeddingProvider, OpenAiEmbedder};
pub use index::CorpusIndex;
pub use mock::StaticRetriever;
pub use traits::{Passage, Retriever, RetrieverError};
