//! MedQA 配置：TOML 文件加环境变量
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MEDQA__*` 覆盖（双下划线表示嵌套，如 `MEDQA__LLM__PROVIDER=openai`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::feedback::DEFAULT_SUMMARY_CHARS;
use crate::memory::DEFAULT_IMPORTANT_KEYWORDS;

/// 配置根，每个字段对应一个 TOML 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub retriever: RetrieverSection,
    pub memory: MemorySection,
    pub feedback: FeedbackSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 启动横幅中显示的名称
    pub name: Option<String>,
    /// 启动时是否询问用户 id（作为会话 id）
    pub user_prompt: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            user_prompt: true,
        }
    }
}

/// [llm] 段：后端选择、采样参数与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：ollama / openai / deepseek / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            base_url: None,
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 1080,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [retriever] 段：语料目录、切分与检索参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverSection {
    pub corpus_dir: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// 短于此长度的段落丢弃
    pub min_paragraph_chars: usize,
    pub timeout_secs: u64,
    /// 设置且有 API Key 时启用向量 + 关键词混合检索
    pub embedding_model: Option<String>,
}

impl Default for RetrieverSection {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data"),
            top_k: 4,
            chunk_size: 500,
            chunk_overlap: 50,
            min_paragraph_chars: 50,
            timeout_secs: 30,
            embedding_model: None,
        }
    }
}

/// [memory] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// 改写与生成提示中带入的短期记忆条数
    pub context_window: usize,
    /// 短期记忆保留的问答轮数
    pub max_short_term_turns: usize,
    pub important_keywords: Vec<String>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            context_window: 4,
            max_short_term_turns: 10,
            important_keywords: DEFAULT_IMPORTANT_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// [feedback] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackSection {
    pub path: PathBuf,
    /// 文档摘要中每段截取的字符数
    pub summary_chars: usize,
}

impl Default for FeedbackSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("feedback_log.csv"),
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }
}

impl AppConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeouts.request)
    }

    pub fn retriever_timeout(&self) -> Duration {
        Duration::from_secs(self.retriever.timeout_secs)
    }

    /// 未配置 app.name 时为 "MedQA"
    pub fn display_name(&self) -> &str {
        self.app
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("MedQA")
    }
}

/// 默认配置文件的候选位置，取第一个存在的
const DEFAULT_CONFIG_FILES: [&str; 3] = ["config/default.toml", "../config/default.toml", "default.toml"];

/// 合并顺序（后者覆盖前者）：默认配置文件、`config_path`、环境变量 `MEDQA__*`。
/// 文件缺失不算错误，全部缺失时得到 `AppConfig::default()`。
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let files = DEFAULT_CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .into_iter()
        .chain(config_path.filter(|p| p.is_file()));

    files
        .fold(config::Config::builder(), |builder, path| {
            builder.add_source(config::File::from(path).required(false))
        })
        .add_source(
            config::Environment::with_prefix("MEDQA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
