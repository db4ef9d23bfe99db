//! Yes/No 判定解析（分类与相关性评分共用）
//!
//! 规则有损：trim + 小写后以 "y" 开头即为肯定，其余一切（含空串、"Maybe"、"No"、乱码）均为否定。
//! 例如 "yeah" / "Yes." 为肯定，"Sure" / " No, yes" 为否定。

pub fn is_affirmative(response: &str) -> bool {
    response.trim().to_lowercase().starts_with('y')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative_prefix() {
        assert!(is_affirmative("Yes"));
        assert!(is_affirmative("  yes, it is relevant"));
        assert!(is_affirmative("Y"));
        assert!(is_affirmative("yeah"));
        assert!(is_affirmative("\nYES."));
    }

    #[test]
    fn test_everything_else_is_negative() {
        assert!(!is_affirmative("No"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("   "));
        assert!(!is_affirmative("Sure"));
        assert!(!is_affirmative("The answer is yes"));
        assert!(!is_affirmative("**Yes**"));
        assert!(!is_affirmative("No, yes"));
    }
}
