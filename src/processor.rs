use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::RetrievalConfig;
use crate::datasource::CompanyFolder;
use crate::extract::{extract_chunks_from_pair, DocChunk};
use crate::external::{ExternalError, LlmClient, WhispererClient};
use crate::parser::{assemble_context, parse_with_fallback, TfidfIndex};
use crate::prompts::{Prompts, SectionPrompt, TablePrompt};
use crate::tables::{merge_table_pages, parse_table_text};
use crate::writer::{FrameworkRecord, FrameworkWorkbook, SpoRecord};

/// OCR boundary, abstracted so the table pipeline can be tested offline.
#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn extract_text(&self, pdf_path: &Path) -> Result<String, ExternalError>;
}

#[async_trait]
impl OcrClient for WhispererClient {
    async fn extract_text(&self, pdf_path: &Path) -> Result<String, ExternalError> {
        WhispererClient::extract_text(self, pdf_path).await
    }
}

/// Runs the retrieval + parsing pipeline for one company at a time.
pub struct CompanyProcessor<'a> {
    primary: &'a dyn LlmClient,
    fallback: Option<&'a dyn LlmClient>,
    prompts: &'a Prompts,
    retrieval: &'a RetrievalConfig,
}

impl<'a> CompanyProcessor<'a> {
    pub fn new(
        primary: &'a dyn LlmClient,
        fallback: Option<&'a dyn LlmClient>,
        prompts: &'a Prompts,
        retrieval: &'a RetrievalConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            prompts,
            retrieval,
        }
    }

    /// Full text pipeline for one company: extract, chunk, index, retrieve,
    /// parse, and append to the workbook. Returns the assigned framework ID.
    pub async fn process_company(
        &self,
        company: &CompanyFolder,
        workbook: &mut FrameworkWorkbook,
    ) -> Result<String> {
        info!(company = %company.name, "processing document pair");

        let chunks = extract_chunks_from_pair(
            &company.framework_pdf,
            &company.spo_pdf,
            self.retrieval.chunk_size,
            self.retrieval.overlap,
        )
        .with_context(|| format!("Extraction failed for {}", company.name))?;

        self.process_chunks(&company.name, &chunks, workbook).await
    }

    /// Retrieval and parsing over already-extracted chunks.
    pub async fn process_chunks(
        &self,
        company_name: &str,
        chunks: &[DocChunk],
        workbook: &mut FrameworkWorkbook,
    ) -> Result<String> {
        if chunks.is_empty() {
            bail!("No text chunks extracted for {}", company_name);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let index = TfidfIndex::build(&texts);

        let framework_value = self
            .parse_section(&index, chunks, &self.prompts.framework)
            .await
            .with_context(|| format!("Framework parsing failed for {}", company_name))?;
        let framework: FrameworkRecord =
            serde_json::from_value(framework_value).unwrap_or_default();
        let framework_id = workbook.append_framework(&framework);

        let spo_value = self
            .parse_section(&index, chunks, &self.prompts.spo)
            .await
            .with_context(|| format!("SPO parsing failed for {}", company_name))?;
        let spo: SpoRecord = serde_json::from_value(spo_value).unwrap_or_default();
        workbook.append_spo(&spo)?;

        info!(company = %company_name, framework_id = %framework_id, "company processed");
        Ok(framework_id)
    }

    async fn parse_section(
        &self,
        index: &TfidfIndex,
        chunks: &[DocChunk],
        section: &SectionPrompt,
    ) -> Result<serde_json::Value> {
        let hits = index.retrieve_top_k(&section.retrieval_query, self.retrieval.top_k);
        if hits.is_empty() {
            warn!("retrieval query matched no chunks, sending empty context");
        }
        let context = assemble_context(chunks, &hits);
        let user = build_user_message(&context);

        parse_with_fallback(self.primary, self.fallback, &section.system, &user).await
    }

    /// Table pipeline for one company: merge table pages, OCR, parse, append.
    ///
    /// Returns `None` when neither PDF contains table pages.
    pub async fn process_company_tables(
        &self,
        company: &CompanyFolder,
        ocr: &dyn OcrClient,
        table_prompt: &TablePrompt,
        workbook: &mut FrameworkWorkbook,
    ) -> Result<Option<String>> {
        let Some(merged) = merge_table_pages(&company.framework_pdf, &company.spo_pdf)? else {
            warn!(company = %company.name, "no table pages found, skipping");
            return Ok(None);
        };

        let table_text = ocr
            .extract_text(merged.path())
            .await
            .with_context(|| format!("OCR failed for {}", company.name))?;

        let answer = parse_table_text(self.primary, self.fallback, table_prompt, &table_text)
            .await
            .with_context(|| format!("Table parsing failed for {}", company.name))?;

        let id = workbook.append_table_answer(&answer);
        info!(company = %company.name, framework_id = %id, "tables processed");
        Ok(Some(id))
    }
}

fn build_user_message(context: &str) -> String {
    format!(
        "Context from the framework and second party opinion documents:\n\n{}\n\n\
         Respond with a single JSON object only.",
        context
    )
}
