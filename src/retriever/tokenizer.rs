//! 分词：关键词检索用
//!
//! 按非字母数字字符切分并转小写，丢弃单字符与常见停用词。

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "is", "of", "to", "in", "on", "an", "a", "or", "by", "with",
    "what", "which", "how", "does", "do", "be", "as", "at", "it", "its", "this", "that", "from",
];

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 1)
        .map(|s| s.to_lowercase())
        .filter(|s| !STOPWORDS.contains(&s.as_str()))
        .collect()
}

/// 分词并返回词集合（用于相似度计算）
pub fn tokenize_to_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// 计算两个词集合的相似度（Jaccard 相似度）
pub fn jaccard_similarity(set1: &HashSet<String>, set2: &HashSet<String>) -> f32 {
    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }
    let intersection = set1.intersection(set2).count() as f32;
    let union = set1.union(set2).count() as f32;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation_and_stopwords() {
        let tokens = tokenize("What is the dosage of Aimovig (erenumab)?");
        assert_eq!(tokens, vec!["dosage", "aimovig", "erenumab"]);
    }

    #[test]
    fn test_tokenize_keeps_numbers() {
        let tokens = tokenize("70 mg or 140mg monthly");
        assert!(tokens.contains(&"70".to_string()));
        assert!(tokens.contains(&"140mg".to_string()));
    }

    #[test]
    fn test_jaccard_similarity() {
        let a = tokenize_to_set("evolocumab dosage schedule");
        let b = tokenize_to_set("dosage schedule for evolocumab injections");
        let sim = jaccard_similarity(&a, &b);
        assert!(sim > 0.5);
        assert_eq!(jaccard_similarity(&a, &HashSet::new()), 0.0);
    }
}
