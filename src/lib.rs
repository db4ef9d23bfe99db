//! MedQA - 基于检索增强的医学文档多轮问答
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话状态、轮次错误、编排器（会话表、轮次准入、反馈）
//! - **feedback**: 反馈记录、CSV / 内存落盘端
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Ollama / DeepSeek / Mock）
//! - **memory**: 消息模型、短期记忆窗口、长期记忆重要性判定
//! - **observability**: 日志初始化
//! - **retriever**: 检索端口、语料加载与分块、关键词 / 混合索引
//! - **workflow**: 问答状态机（改写、分类、检索、评分、改进、生成）

pub mod config;
pub mod core;
pub mod feedback;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod retriever;
pub mod workflow;
