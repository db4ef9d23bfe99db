//! 反馈落盘：追加式 CSV 文件与内存实现
//!
//! CSV 文件不存在或为空时先写表头；写入经 tokio Mutex 串行化，
//! 每条记录一次 write_all，多会话并发写入时不会出现半行交错。

use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::feedback::{FeedbackError, FeedbackRecord};

pub const CSV_HEADER: &str = "question,rephrased_question,documents,answer,feedback";

/// 反馈落盘端口：只追加
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError>;
}

/// CSV 文件反馈日志
#[derive(Debug)]
pub struct CsvFeedbackSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvFeedbackSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FeedbackSink for CsvFeedbackSink {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let needs_header = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let mut buf = String::new();
        if needs_header {
            buf.push_str(CSV_HEADER);
            buf.push_str("\r\n");
        }
        buf.push_str(&csv_row(&[
            &record.question,
            &record.rephrased_question,
            &record.documents,
            &record.answer,
            &record.feedback,
        ]));

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(path = %self.path.display(), "feedback saved");
        Ok(())
    }
}

/// 内存反馈日志（测试 / 无需落盘时）
#[derive(Debug, Default)]
pub struct MemoryFeedbackSink {
    records: StdMutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FeedbackSink for MemoryFeedbackSink {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        self.records
            .lock()
            .map_err(|e| FeedbackError::Sink(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// 一行 CSV（RFC 4180：含逗号、引号、换行的字段加引号，引号转义为两个引号）
fn csv_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
