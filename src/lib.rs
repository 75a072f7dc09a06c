//! # Financial Document Extractor
//!
//! Turns OCR text of financial documents (bank statements, invoices, GST
//! returns, trial balances, balance sheets, ...) into typed, normalized
//! records plus a fixed set of derived reports per document type.
//!
//! ## Core Concepts
//!
//! - **Model Gateway**: one entry point to the language model with model-name
//!   fallback, retry with backoff, cross-backend fallback and a raw-call cache
//! - **Response Repair**: recovers JSON from fenced or prose-wrapped replies
//! - **Normalization**: every amount goes through [`clean_number`]; absent
//!   values stay `None`, never zero
//! - **Validation**: running-balance and accounting-equation checks that
//!   attach anomalies instead of failing
//! - **Reports**: exactly five named reports per document type, each slot
//!   computed, model-written or marked with its own error
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_document_extractor::*;
//!
//! let gateway = ModelGateway::from_config(&GatewayConfig::from_env())?;
//! let extractor = DocumentExtractor::new(gateway, PipelineConfig::default());
//! let pipeline = DocumentPipeline::new(extractor);
//!
//! let request = ExtractionRequest::new(&file_bytes, Some("bank_statement"), ocr_text);
//! let extracted = pipeline.process(&request).await?;
//! for (name, slot) in &extracted.reports.reports {
//!     println!("{}: failed={}", name, slot.is_failed());
//! }
//! ```

pub mod cache;
pub mod config;
pub mod documents;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod reports;
pub mod schema;
pub mod utils;
pub mod validation;
pub mod workbook;

pub use cache::{document_cache_key, llm_cache_key, CacheStore, InMemoryCache, DOCUMENT_CACHE_TTL, LLM_CACHE_TTL};
#[cfg(feature = "redis-cache")]
pub use cache::RedisCache;
pub use config::{GatewayConfig, PipelineConfig, RetryPolicy, VertexConfig};
pub use documents::*;
pub use error::{FinancialDocumentError, Result};
pub use extractor::{Classification, DocumentExtractor, ExtractedDocument, ExtractionEvent};
pub use llm::{parse_json_lenient, strip_code_fences, BackendError, BackendSource, ModelBackend, ModelGateway, ModelResponse};
pub use metrics::{CategoryAmount, DerivedMetrics};
pub use normalize::clean_number;
pub use pipeline::{AuditSource, DocumentPipeline, ExtractionRequest};
pub use reports::{compose_reports, ReportBundle, ReportComposer, ReportSlot};
pub use schema::*;
pub use validation::{merge_anomalies, validate, EquationCheck, Reconciler, ValidationReport, BALANCE_TOLERANCE};
pub use workbook::{workbook_kind, ExcelSheet, ExcelWorkbook};
