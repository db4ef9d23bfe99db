//! 文本分块：把过长的段落切成带重叠的块，优先在分隔符处断开（UTF-8 安全）

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数）
    pub chunk_size: usize,
    /// 块之间的重叠（字符数）
    pub chunk_overlap: usize,
    /// 分隔符优先级（从高到低）
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                "; ".to_string(),
                "! ".to_string(),
                "? ".to_string(),
                " ".to_string(),
            ],
        }
    }
}

/// 文档分块器
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// 将文本分割为块；不超过 chunk_size 的文本原样返回一块
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        // 每个字符的字节起点，末尾补上 text.len()
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;
        let size = self.config.chunk_size.max(1);
        if total <= size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let limit = (start + size).min(total);
            let end = if limit == total {
                total
            } else {
                self.break_point(text, &bounds, start, limit)
            };
            let piece = text[bounds[start]..bounds[end]].trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
            if end == total {
                break;
            }
            // 至少前进一个字符
            start = end - self.config.chunk_overlap.min(end - start - 1);
        }
        chunks
    }

    /// 在 [start, limit) 窗口内找优先级最高的分隔符，返回其后的字符下标；都没有时硬切在 limit
    fn break_point(&self, text: &str, bounds: &[usize], start: usize, limit: usize) -> usize {
        let window = &text[bounds[start]..bounds[limit]];
        self.config
            .separators
            .iter()
            .filter(|sep| !sep.is_empty())
            .find_map(|sep| window.rfind(sep.as_str()).map(|pos| pos + sep.len()))
            .map(|byte| start + window[..byte].chars().count())
            .unwrap_or(limit)
    }
}
