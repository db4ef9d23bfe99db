//! 语料加载：从目录读取纯文本（.txt / .md），切分为带出处的段落
//!
//! 页：按换页符 `\x0c` 切分（pdftotext 的输出格式），页号从 1 开始。
//! 表格：连续的「多空格分列」行视为一张表，首行为表头，其余每行生成一个
//! `"<表头首列> | <单元格> | ..."` 段落；其余文本按空行切段，过短段落丢弃，过长段落再分块。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::retriever::{Chunker, Passage, RetrieverError};

fn table_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.{2,}\s{2,}.+").expect("static regex"))
}

fn cell_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("static regex"))
}

/// 语料切分参数
#[derive(Debug, Clone)]
pub struct CorpusOptions {
    /// 短于此字符数的段落丢弃
    pub min_paragraph_chars: usize,
    pub chunker: Chunker,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 50,
            chunker: Chunker::default(),
        }
    }
}

/// 递归读取目录下全部 .txt / .md 文件并切分；单个文件读取失败只记录警告
pub fn load_corpus(dir: &Path, options: &CorpusOptions) -> Result<Vec<Passage>, RetrieverError> {
    if !dir.is_dir() {
        return Err(RetrieverError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("corpus directory not found: {}", dir.display()),
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    files.sort();

    let mut passages = Vec::new();
    for path in files {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let label = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("document");
                passages.extend(split_document(label, &text, options));
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable corpus file"),
        }
    }

    tracing::info!(count = passages.len(), dir = %dir.display(), "corpus loaded");
    Ok(passages)
}

/// 把一个文档切成段落（表格行 + 正文段落），出处为 `"<label>/page_<n>"`
pub fn split_document(label: &str, text: &str, options: &CorpusOptions) -> Vec<Passage> {
    let mut passages = Vec::new();

    for (i, page) in text.split('\x0c').enumerate() {
        let source = format!("{}/page_{}", label, i + 1);
        let (tables, body) = separate_tables(page);

        for table in tables {
            passages.extend(table_rows(&table).into_iter().map(|row| Passage::new(row, &source)));
        }

        for para in body.split("\n\n") {
            let p = para.trim();
            if p.chars().count() <= options.min_paragraph_chars {
                continue;
            }
            for chunk in options.chunker.chunk(p) {
                passages.push(Passage::new(chunk, &source));
            }
        }
    }

    passages
}

/// 拆出连续的表格行块；返回 (表格块列表, 去除表格行后的正文)
fn separate_tables(page: &str) -> (Vec<Vec<String>>, String) {
    let mut tables: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut body_lines: Vec<&str> = Vec::new();

    for line in page.lines() {
        if table_line().is_match(line) {
            current.push(line.trim().to_string());
        } else {
            if !current.is_empty() {
                tables.push(std::mem::take(&mut current));
            }
            body_lines.push(line);
        }
    }
    if !current.is_empty() {
        tables.push(current);
    }

    (tables, body_lines.join("\n"))
}

/// 表格块 -> 行段落；仅有表头的表丢弃
fn table_rows(table: &[String]) -> Vec<String> {
    let Some((header, rows)) = table.split_first() else {
        return Vec::new();
    };
    let title = cell_separator()
        .split(header)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    rows.iter()
        .map(|row| {
            let cells: Vec<&str> = cell_separator()
                .split(row)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            format!("{} | {}", title, cells.join(" | "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = "Overview\n\nAimovig (erenumab) is a calcitonin gene-related peptide receptor antagonist indicated for the preventive treatment of migraine in adults.\n\nShort line.";
    const PAGE_TWO: &str = "Drug    Dose    Frequency\nAimovig    70 mg    Monthly\nRepatha    140 mg    Every 2 weeks\n\nRepatha (evolocumab) is administered subcutaneously using a prefilled syringe or autoinjector.";

    #[test]
    fn test_split_pages_and_short_paragraphs() {
        let doc = format!("{}\x0c{}", PAGE_ONE, PAGE_TWO);
        let passages = split_document("label", &doc, &CorpusOptions::default());

        let page1: Vec<_> = passages.iter().filter(|p| p.source == "label/page_1").collect();
        assert_eq!(page1.len(), 1);
        assert!(page1[0].text.starts_with("Aimovig (erenumab)"));

        let page2: Vec<_> = passages.iter().filter(|p| p.source == "label/page_2").collect();
        assert_eq!(page2.len(), 3);
        assert_eq!(page2[0].text, "Drug | Aimovig | 70 mg | Monthly");
        assert_eq!(page2[1].text, "Drug | Repatha | 140 mg | Every 2 weeks");
        assert!(page2[2].text.starts_with("Repatha (evolocumab)"));
    }

    #[test]
    fn test_header_only_table_dropped() {
        let passages = split_document("x", "Col A    Col B\n", &CorpusOptions::default());
        assert!(passages.is_empty());
    }

    #[test]
    fn test_load_corpus_reads_txt_and_md_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), PAGE_ONE).unwrap();
        std::fs::write(dir.path().join("b.md"), PAGE_TWO).unwrap();
        std::fs::write(dir.path().join("c.pdf"), "binary").unwrap();

        let passages = load_corpus(dir.path(), &CorpusOptions::default()).unwrap();
        assert_eq!(passages.len(), 4);
        assert_eq!(passages[0].source, "a/page_1");
        assert!(passages.iter().all(|p| !p.source.starts_with("c/")));
    }

    #[test]
    fn test_missing_dir_is_error() {
        let err = load_corpus(Path::new("/definitely/not/here"), &CorpusOptions::default());
        assert!(matches!(err, Err(RetrieverError::Io(_))));
    }
}
