//! PDF 文本提取
//! 基于 pdf-extract 逐页提取，放在阻塞线程池执行

use anyhow::{anyhow, bail, Context, Result};

use super::text::normalize_extracted_text;

/// PDF 头部允许出现的最大偏移
const HEADER_SEARCH_WINDOW: usize = 1024;

/// 提取结果
#[derive(Debug, Clone, PartialEq)]
pub struct PdfExtraction {
    pub text: String,
    pub page_count: usize,
    pub pages_processed: usize,
}

pub struct PdfExtractor;

impl PdfExtractor {
    /// 是否带有 `%PDF-` 文件头
    pub fn looks_like_pdf(bytes: &[u8]) -> bool {
        let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
        window.windows(5).any(|w| w == b"%PDF-")
    }

    /// 提取文本，`max_pages` 限制处理的页数
    pub async fn extract(bytes: Vec<u8>, max_pages: Option<usize>) -> Result<PdfExtraction> {
        if !Self::looks_like_pdf(&bytes) {
            bail!("File is not a PDF document");
        }

        // pdf-extract 遇到损坏文件可能 panic，JoinError 会把它转成错误
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| anyhow!("PDF extraction aborted: {}", e))?
        .context("Failed to extract text from PDF")?;

        Ok(Self::assemble(pages, max_pages))
    }

    fn assemble(pages: Vec<String>, max_pages: Option<usize>) -> PdfExtraction {
        let page_count = pages.len();
        let limit = max_pages.filter(|n| *n > 0).unwrap_or(page_count).min(page_count);

        let text = pages
            .iter()
            .take(limit)
            .map(|p| normalize_extracted_text(p))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        PdfExtraction { text, page_count, pages_processed: limit }
    }
}
