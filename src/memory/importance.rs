//! 重要性判定：决定一轮问答是否写入长期记忆
//!
//! 大小写不敏感的子串匹配，关键词列表可由 [memory].important_keywords 配置。

/// 默认关键词（剂量、副作用、给药方式、临床以及具体产品名）
pub const DEFAULT_IMPORTANT_KEYWORDS: &[&str] = &[
    "dosage",
    "side effect",
    "administration",
    "clinical",
    "aimovig",
    "repatha",
];

/// 关键词集合（构造时统一转小写）
#[derive(Clone, Debug)]
pub struct ImportancePolicy {
    keywords: Vec<String>,
}

impl ImportancePolicy {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_important(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

impl Default for ImportancePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORTANT_KEYWORDS)
    }
}
