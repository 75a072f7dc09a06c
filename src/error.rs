use crate::schema::DocumentType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancialDocumentError {
    #[error("No model backend is configured: set GEMINI_API_KEY or VERTEXAI_PROJECT_ID")]
    ModelUnavailable,

    #[error("Model backend rejected the credentials: {0}")]
    ModelAuthFailure(String),

    #[error("Model quota exhausted after {attempts} attempts: {message}")]
    ModelRateLimited { attempts: u32, message: String },

    #[error("Model request failed after {attempts} attempts: {message}")]
    ModelRequestFailed { attempts: u32, message: String },

    #[error("Model returned malformed output ({reason}). Response preview: {preview}")]
    MalformedModelOutput { reason: String, preview: String },

    #[error("Error extracting {document_type}: {source}")]
    ExtractionFailed {
        document_type: DocumentType,
        #[source]
        source: Box<FinancialDocumentError>,
    },

    #[error("Unsupported document type: {0}. Supported types: bank_statement, gst_return, trial_balance, profit_loss, invoice, purchase_order, salary_slip, balance_sheet, audit_papers, agreement_contract")]
    UnsupportedDocumentType(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl FinancialDocumentError {
    /// Wraps a pipeline failure with the document type it occurred on.
    pub fn extraction(document_type: DocumentType, source: FinancialDocumentError) -> Self {
        match source {
            already @ FinancialDocumentError::ExtractionFailed { .. } => already,
            other => FinancialDocumentError::ExtractionFailed {
                document_type,
                source: Box::new(other),
            },
        }
    }

    /// Short machine-readable category for API layers.
    pub fn kind(&self) -> &'static str {
        match self {
            FinancialDocumentError::ModelUnavailable => "model_unavailable",
            FinancialDocumentError::ModelAuthFailure(_) => "model_auth_failure",
            FinancialDocumentError::ModelRateLimited { .. } => "model_rate_limited",
            FinancialDocumentError::ModelRequestFailed { .. } => "model_request_failed",
            FinancialDocumentError::MalformedModelOutput { .. } => "malformed_model_output",
            FinancialDocumentError::ExtractionFailed { source, .. } => source.kind(),
            FinancialDocumentError::UnsupportedDocumentType(_) => "unsupported_document_type",
            FinancialDocumentError::Configuration(_) => "configuration",
            FinancialDocumentError::Cache(_) => "cache",
            FinancialDocumentError::SerializationError(_) => "serialization",
            #[cfg(feature = "gemini")]
            FinancialDocumentError::HttpError(_) => "http",
        }
    }
}

pub type Result<T> = std::result::Result<T, FinancialDocumentError>;
