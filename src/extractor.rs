//! Per-document extraction: prompt, parse, normalize, reconcile, report.

use crate::config::PipelineConfig;
use crate::error::{FinancialDocumentError, Result};
use crate::llm::prompts::{classification_prompt, extraction_prompt};
use crate::llm::{parse_json_lenient, ModelGateway};
use crate::metrics::DerivedMetrics;
use crate::reports::{ReportBundle, ReportComposer};
use crate::schema::{Anomaly, DocumentType, StructuredDocument};
use crate::utils::truncate_chars;
use crate::validation::validate;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::Sender;

/// Label returned when the classifier cannot place a document.
pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown";

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub document: StructuredDocument,
    pub metrics: DerivedMetrics,
    /// Model-reported and reconciliation anomalies, deduplicated.
    pub anomalies: Vec<Anomaly>,
    pub reports: ReportBundle,
    /// Model that wrote the extraction, `"cache"` for a raw-call cache hit.
    pub model_used: String,
}

impl ExtractedDocument {
    pub fn document_type(&self) -> DocumentType {
        self.document.document_type()
    }
}

/// Coarse document type guessed from the OCR text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// A snake_case [`DocumentType`] name, or `"unknown"`.
    #[serde(rename = "type")]
    pub document_type: String,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            document_type: UNKNOWN_DOCUMENT_TYPE.to_string(),
        }
    }

    pub fn resolved(&self) -> Option<DocumentType> {
        DocumentType::from_label(&self.document_type)
    }
}

/// Progress notifications for callers that stream status to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    CacheHit,
    Classifying,
    Classified { document_type: String },
    Extracting { document_type: DocumentType },
    Validating,
    ComposingReports,
    Success,
    Failed { reason: String },
}

#[derive(Clone)]
pub struct DocumentExtractor {
    gateway: ModelGateway,
    composer: ReportComposer,
    config: PipelineConfig,
    progress: Option<Sender<ExtractionEvent>>,
}

impl DocumentExtractor {
    pub fn new(gateway: ModelGateway, config: PipelineConfig) -> Self {
        Self {
            composer: ReportComposer::new(gateway.clone(), config.clone()),
            gateway,
            config,
            progress: None,
        }
    }

    /// Ages invoices against `as_of` instead of today.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.composer = self.composer.with_as_of(as_of);
        self
    }

    pub fn with_progress(mut self, progress: Sender<ExtractionEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extracts a document of a known type from OCR text.
    ///
    /// Every failure is reported as [`FinancialDocumentError::ExtractionFailed`]
    /// carrying `document_type`; no partial document is ever returned.
    pub async fn extract(&self, document_type: DocumentType, text: &str) -> Result<ExtractedDocument> {
        match self.run_extraction(document_type, text).await {
            Ok(extracted) => {
                self.send_event(ExtractionEvent::Success).await;
                Ok(extracted)
            }
            Err(e) => {
                let error = FinancialDocumentError::extraction(document_type, e);
                warn!("{}", error);
                self.send_event(ExtractionEvent::Failed {
                    reason: error.to_string(),
                })
                .await;
                Err(error)
            }
        }
    }

    async fn run_extraction(&self, document_type: DocumentType, text: &str) -> Result<ExtractedDocument> {
        self.send_event(ExtractionEvent::Extracting { document_type }).await;
        let excerpt = truncate_chars(text, self.config.extraction_text_limit);
        if excerpt.len() < text.len() {
            debug!(
                "Truncated {} OCR text to {} characters",
                document_type, self.config.extraction_text_limit
            );
        }

        let prompt = extraction_prompt(document_type, excerpt);
        let response = self
            .gateway
            .generate_detailed(&prompt, true, self.config.max_retries)
            .await?;
        let parsed = parse_json_lenient(&response.text)?;
        let mut document = StructuredDocument::from_model_value(document_type, parsed)?;

        self.send_event(ExtractionEvent::Validating).await;
        let validation = validate(&document);
        validation.apply_to(&mut document);
        if !validation.anomalies.is_empty() {
            info!(
                "{} extraction carries {} anomalies",
                document_type,
                validation.anomalies.len()
            );
        }

        let metrics = document.metrics();

        self.send_event(ExtractionEvent::ComposingReports).await;
        let reports = self.composer.compose(&document, text).await;

        Ok(ExtractedDocument {
            document,
            metrics,
            anomalies: validation.anomalies,
            reports,
            model_used: response.model_used,
        })
    }

    /// Guesses the document type.
    ///
    /// A reply naming no supported type yields `"unknown"`; model and
    /// transport failures, and replies that are not JSON, are returned as
    /// errors so the caller sees the real cause.
    pub async fn classify(&self, text: &str) -> Result<Classification> {
        self.send_event(ExtractionEvent::Classifying).await;
        let prompt = classification_prompt(truncate_chars(text, self.config.classification_text_limit));

        let classification = match self.classify_reply(&prompt).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Classification failed: {}", e);
                self.send_event(ExtractionEvent::Failed {
                    reason: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };

        self.send_event(ExtractionEvent::Classified {
            document_type: classification.document_type.clone(),
        })
        .await;
        Ok(classification)
    }

    async fn classify_reply(&self, prompt: &str) -> Result<Classification> {
        let reply = self.gateway.generate(prompt, true).await?;
        let value = parse_json_lenient(&reply)?;
        Ok(classification_from(&value))
    }

    pub(crate) async fn send_event(&self, event: ExtractionEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }
}

fn classification_from(value: &Value) -> Classification {
    let label = value
        .get("type")
        .or_else(|| value.get("document_type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    match DocumentType::from_label(label) {
        Some(kind) => Classification {
            document_type: kind.as_str().to_string(),
        },
        None => Classification::unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classifier_labels_map_to_types() {
        let cases = [
            ("Bank Statement", "bank_statement"),
            ("GST Document (GSTR-1/GSTR-3B)", "gst_return"),
            ("Profit & Loss Statement", "profit_loss"),
            ("Salary Slip (Payroll Report)", "salary_slip"),
            ("Contract/Agreement", "agreement_contract"),
            ("Unknown", "unknown"),
            ("Menu card", "unknown"),
        ];
        for (label, expected) in cases {
            let classification = classification_from(&json!({ "type": label }));
            assert_eq!(classification.document_type, expected, "{}", label);
        }
    }

    #[test]
    fn test_classification_serializes_as_type() {
        let value = serde_json::to_value(Classification::unknown()).unwrap();
        assert_eq!(value, json!({"type": "unknown"}));
        assert_eq!(Classification::unknown().resolved(), None);
    }
}
