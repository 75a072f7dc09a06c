//! Whole-document processing: cache lookup, type resolution, extraction and
//! the multi-document audit.

use crate::cache::{document_cache_key, CacheStore};
use crate::config::PipelineConfig;
use crate::error::{FinancialDocumentError, Result};
use crate::extractor::{DocumentExtractor, ExtractedDocument, ExtractionEvent};
use crate::llm::parse_json_lenient;
use crate::llm::prompts::{comprehensive_audit_prompt, gst_excel_audit_prompt};
use crate::schema::DocumentType;
use crate::utils::truncate_chars;
use crate::workbook::ExcelWorkbook;
use chrono::Local;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DOCUMENT_SEPARATOR: &str = "\n\n---DOCUMENT SEPARATOR---\n\n";

/// One file to process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Declared type; `None`, empty or `"auto"` asks the classifier.
    pub document_type: Option<String>,
    /// OCR text of the file.
    pub raw_text: String,
    /// Whole-document cache key; requests without one are never cached.
    pub cache_key: Option<String>,
}

impl ExtractionRequest {
    /// A request keyed on the file's bytes and declared type.
    pub fn new(file_bytes: &[u8], document_type: Option<&str>, raw_text: impl Into<String>) -> Self {
        Self {
            document_type: document_type.map(str::to_string),
            raw_text: raw_text.into(),
            cache_key: Some(document_cache_key(file_bytes, document_type)),
        }
    }

    /// An uncached request for text that did not come from a file.
    pub fn from_text(document_type: Option<&str>, raw_text: impl Into<String>) -> Self {
        Self {
            document_type: document_type.map(str::to_string),
            raw_text: raw_text.into(),
            cache_key: None,
        }
    }

    fn declared_type(&self) -> Option<&str> {
        self.document_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("auto"))
    }
}

/// One file contributing to a comprehensive audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSource {
    pub filename: String,
    pub document_type: String,
    pub text: String,
}

#[derive(Clone)]
pub struct DocumentPipeline {
    extractor: DocumentExtractor,
    cache: Option<Arc<dyn CacheStore>>,
    config: PipelineConfig,
}

impl DocumentPipeline {
    pub fn new(extractor: DocumentExtractor) -> Self {
        let config = extractor.config().clone();
        Self {
            extractor,
            cache: None,
            config,
        }
    }

    /// Stores processed documents in `cache` for the configured lifetime.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn extractor(&self) -> &DocumentExtractor {
        &self.extractor
    }

    /// Processes one file: a cached result is returned without any model
    /// traffic, otherwise the type is resolved and the document extracted.
    pub async fn process(&self, request: &ExtractionRequest) -> Result<ExtractedDocument> {
        if let Some(cached) = self.cached(request).await {
            self.extractor.send_event(ExtractionEvent::CacheHit).await;
            return Ok(cached);
        }

        let document_type = self.resolve_type(request).await?;
        info!("Processing {} ({} characters)", document_type, request.raw_text.len());
        let extracted = self.extractor.extract(document_type, &request.raw_text).await?;

        if let (Some(cache), Some(key)) = (&self.cache, &request.cache_key) {
            match serde_json::to_string(&extracted) {
                Ok(serialized) => {
                    if let Err(e) = cache.set(key, &serialized, self.config.document_cache_ttl()).await {
                        warn!("Failed to cache processed document: {}", e);
                    }
                }
                Err(e) => warn!("Could not serialize processed document for caching: {}", e),
            }
        }

        Ok(extracted)
    }

    async fn cached(&self, request: &ExtractionRequest) -> Option<ExtractedDocument> {
        let cache = self.cache.as_ref()?;
        let key = request.cache_key.as_ref()?;
        match cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(document) => {
                    debug!("Document cache hit for {}", key);
                    Some(document)
                }
                Err(e) => {
                    warn!("Ignoring unreadable cached document {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Document cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn resolve_type(&self, request: &ExtractionRequest) -> Result<DocumentType> {
        if let Some(declared) = request.declared_type() {
            return DocumentType::from_label(declared)
                .ok_or_else(|| FinancialDocumentError::UnsupportedDocumentType(declared.to_string()));
        }

        let classification = self.extractor.classify(&request.raw_text).await?;
        classification
            .resolved()
            .ok_or(FinancialDocumentError::UnsupportedDocumentType(classification.document_type))
    }

    /// Asks the model for one audit report over several documents.
    ///
    /// Always returns an object: the model's report plus `metadata`, or
    /// `error` plus `metadata` when the report could not be produced.
    pub async fn comprehensive_audit(&self, sources: &[AuditSource]) -> Value {
        let metadata = json!({
            "documents_analyzed": sources.len(),
            "document_types": sources.iter().map(|s| s.document_type.as_str()).collect::<Vec<_>>(),
            "filenames": sources.iter().map(|s| s.filename.as_str()).collect::<Vec<_>>(),
            "generated_at": Local::now().to_rfc3339(),
        });

        match self.run_audit(sources).await {
            Ok(Value::Object(mut report)) => {
                report.insert("metadata".to_string(), metadata);
                Value::Object(report)
            }
            Ok(other) => json!({
                "error": format!("audit report is not a JSON object: {}", truncate_chars(&other.to_string(), 200)),
                "metadata": metadata,
            }),
            Err(e) => {
                warn!("Comprehensive audit failed: {}", e);
                json!({
                    "error": format!("Failed to generate audit report: {}", e),
                    "metadata": metadata,
                })
            }
        }
    }

    async fn run_audit(&self, sources: &[AuditSource]) -> Result<Value> {
        if sources.is_empty() {
            return Err(FinancialDocumentError::Configuration(
                "a comprehensive audit needs at least one document".to_string(),
            ));
        }

        let manifest: Vec<String> = sources
            .iter()
            .map(|s| format!("{} ({})", s.filename, s.document_type))
            .collect();
        let combined = combine_audit_texts(sources, &self.config);
        info!(
            "Generating comprehensive audit over {} documents ({} characters)",
            sources.len(),
            combined.chars().count()
        );

        let prompt = comprehensive_audit_prompt(&manifest, &combined);
        let reply = self.extractor.gateway().generate(&prompt, true).await?;
        parse_json_lenient(&reply)
    }

    /// GST compliance audit over spreadsheets keyed by file kind (see
    /// [`workbook_kind`](crate::workbook::workbook_kind)).
    ///
    /// Like [`comprehensive_audit`](Self::comprehensive_audit) this always
    /// returns an object: the report plus `metadata`, or `error` plus
    /// `metadata`.
    pub async fn gst_excel_audit(&self, workbooks: &BTreeMap<String, ExcelWorkbook>) -> Value {
        let metadata = json!({
            "excel_files_processed": workbooks.len(),
            "file_types": workbooks.keys().collect::<Vec<_>>(),
            "generated_at": Local::now().to_rfc3339(),
        });

        match self.run_gst_excel_audit(workbooks).await {
            Ok(Value::Object(mut report)) => {
                report.insert("metadata".to_string(), metadata);
                Value::Object(report)
            }
            Ok(other) => json!({
                "error": format!("GST report is not a JSON object: {}", truncate_chars(&other.to_string(), 200)),
                "metadata": metadata,
            }),
            Err(e) => {
                warn!("GST spreadsheet audit failed: {}", e);
                json!({
                    "error": format!("Error generating comprehensive GST report: {}", e),
                    "metadata": metadata,
                })
            }
        }
    }

    async fn run_gst_excel_audit(&self, workbooks: &BTreeMap<String, ExcelWorkbook>) -> Result<Value> {
        if workbooks.is_empty() {
            return Err(FinancialDocumentError::Configuration(
                "a GST audit needs at least one spreadsheet".to_string(),
            ));
        }

        let file_types: Vec<String> = workbooks.keys().cloned().collect();
        let (summary, data) = gst_workbook_texts(workbooks, &self.config);
        info!(
            "Generating GST audit over {} spreadsheets ({} + {} characters)",
            workbooks.len(),
            summary.chars().count(),
            data.chars().count()
        );

        let prompt = gst_excel_audit_prompt(&file_types, &summary, &data);
        let reply = self.extractor.gateway().generate(&prompt, true).await?;
        parse_json_lenient(&reply)
    }
}

/// Per-file summaries and the full row listing, each truncated to its limit.
fn gst_workbook_texts(workbooks: &BTreeMap<String, ExcelWorkbook>, config: &PipelineConfig) -> (String, String) {
    let summary = workbooks
        .iter()
        .map(|(file_type, workbook)| format!("{}:\n{}", file_type.to_uppercase(), workbook.summary_text()))
        .collect::<Vec<_>>()
        .join("\n\n");
    let data: String = workbooks
        .iter()
        .map(|(file_type, workbook)| workbook.data_text(file_type))
        .collect();
    (
        truncate_chars(&summary, config.gst_summary_text_limit).to_string(),
        truncate_chars(&data, config.gst_data_text_limit).to_string(),
    )
}

fn combine_audit_texts(sources: &[AuditSource], config: &PipelineConfig) -> String {
    let sections: Vec<String> = sources
        .iter()
        .map(|s| {
            format!(
                "Document Type: {}\nFilename: {}\n\n{}",
                s.document_type,
                s.filename,
                truncate_chars(&s.text, config.audit_document_text_limit)
            )
        })
        .collect();
    let combined = sections.join(DOCUMENT_SEPARATOR);
    truncate_chars(&combined, config.audit_combined_text_limit).to_string()
}
