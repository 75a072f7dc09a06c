//! Secondary reports derived from an extracted document.
//!
//! Every document type has exactly five named reports. Most are computed
//! from the normalized fields; the few that need judgement (cash-flow
//! classification, anomaly narratives, audit opinions) are written by the
//! model from a truncated view of the extraction. A failing report only
//! marks its own slot as failed.

use crate::config::PipelineConfig;
use crate::error::{FinancialDocumentError, Result};
use crate::llm::{parse_json_lenient, ModelGateway};
use crate::schema::{DocumentType, StructuredDocument};
use crate::utils::truncate_chars;
use chrono::{Local, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

mod banking;
mod commercial;
mod narrative;
mod statements;

/// Content of one report slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSlot {
    /// Recomputed from the extracted fields.
    Computed(Value),
    /// Written by the model.
    Generated(Value),
    /// Serialized as `{"error": "..."}`.
    #[serde(rename = "error")]
    Failed(String),
}

impl ReportSlot {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReportSlot::Failed(_))
    }

    pub fn content(&self) -> Option<&Value> {
        match self {
            ReportSlot::Computed(value) | ReportSlot::Generated(value) => Some(value),
            ReportSlot::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ReportSlot::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// The five reports of one document. Always holds every name of its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBundle {
    pub document_type: DocumentType,
    pub reports: BTreeMap<String, ReportSlot>,
}

impl ReportBundle {
    /// A bundle whose slots all report that they were not produced.
    pub fn new(document_type: DocumentType) -> Self {
        let reports = document_type
            .report_names()
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ReportSlot::Failed("report was not produced".to_string()),
                )
            })
            .collect();
        Self {
            document_type,
            reports,
        }
    }

    /// Fills a slot. Names outside the type's fixed list are ignored.
    pub fn set(&mut self, name: &str, slot: ReportSlot) {
        match self.reports.get_mut(name) {
            Some(existing) => *existing = slot,
            None => warn!("Ignoring unknown report {} for {}", name, self.document_type),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ReportSlot> {
        self.reports.get(name)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.reports
            .iter()
            .filter_map(|(name, slot)| slot.error().map(|e| (name.as_str(), e)))
    }
}

/// How one report is produced.
pub(crate) enum PlannedReport {
    Computed(Result<Value>),
    /// JSON report written by the model from `prompt`.
    Generated(String),
    /// Computed figures plus a free-text `analysis` written by the model.
    Commentary { base: Value, prompt: String },
}

pub(crate) type ReportPlan = Vec<(&'static str, PlannedReport)>;

/// What report planners may read besides the document itself.
pub(crate) struct ReportContext<'a> {
    /// Serialized extraction, truncated for prompts.
    pub base_data: String,
    /// OCR text, truncated for prompts.
    pub source_text: &'a str,
    pub as_of: NaiveDate,
}

/// Produces a [`ReportBundle`] for an extracted document.
#[derive(Clone)]
pub struct ReportComposer {
    gateway: Option<ModelGateway>,
    config: PipelineConfig,
    as_of: Option<NaiveDate>,
}

impl ReportComposer {
    pub fn new(gateway: ModelGateway, config: PipelineConfig) -> Self {
        Self {
            gateway: Some(gateway),
            config,
            as_of: None,
        }
    }

    /// A composer without a model: computed reports only, model-written
    /// slots are marked failed.
    pub fn offline(config: PipelineConfig) -> Self {
        Self {
            gateway: None,
            config,
            as_of: None,
        }
    }

    /// Fixes the date invoices are aged against (defaults to today).
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub async fn compose(&self, document: &StructuredDocument, source_text: &str) -> ReportBundle {
        let document_type = document.document_type();
        let base_json = serde_json::to_string_pretty(&document.body_json()).unwrap_or_default();
        let context = ReportContext {
            base_data: truncate_chars(&base_json, self.config.report_base_data_limit).to_string(),
            source_text: truncate_chars(source_text, self.config.report_text_limit),
            as_of: self.as_of.unwrap_or_else(|| Local::now().date_naive()),
        };

        let plan = match document {
            StructuredDocument::BankStatement(doc) => banking::bank_statement(doc, &context, &self.config),
            StructuredDocument::GstReturn(doc) => banking::gst_return(doc, &context),
            StructuredDocument::TrialBalance(doc) => statements::trial_balance(doc),
            StructuredDocument::ProfitLoss(doc) => statements::profit_loss(doc),
            StructuredDocument::BalanceSheet(doc) => statements::balance_sheet(doc),
            StructuredDocument::Invoice(doc) => commercial::invoice(doc, &context),
            StructuredDocument::PurchaseOrder(doc) => commercial::purchase_order(doc),
            StructuredDocument::SalarySlip(doc) => commercial::salary_slip(doc),
            StructuredDocument::AuditPapers(doc) => narrative::audit_papers(doc, &context),
            StructuredDocument::AgreementContract(doc) => narrative::agreement_contract(doc, &context),
        };

        let mut bundle = ReportBundle::new(document_type);
        for (name, planned) in plan {
            let slot = self.produce(name, planned).await;
            if let Some(error) = slot.error() {
                warn!("{} report {} failed: {}", document_type, name, error);
            } else {
                debug!("{} report {} ready", document_type, name);
            }
            bundle.set(name, slot);
        }
        bundle
    }

    async fn produce(&self, name: &str, planned: PlannedReport) -> ReportSlot {
        match planned {
            PlannedReport::Computed(Ok(value)) => ReportSlot::Computed(value),
            PlannedReport::Computed(Err(e)) => ReportSlot::Failed(format!("Could not compute {}: {}", name, e)),
            PlannedReport::Generated(prompt) => match self.generate_json(&prompt).await {
                Ok(value) => ReportSlot::Generated(value),
                Err(e) => ReportSlot::Failed(format!("Could not generate {}: {}", name, e)),
            },
            PlannedReport::Commentary { base, prompt } => {
                let analysis = match &self.gateway {
                    Some(gateway) => gateway.generate(&prompt, false).await,
                    None => Err(FinancialDocumentError::ModelUnavailable),
                };
                let mut fields = match base {
                    Value::Object(fields) => fields,
                    other => {
                        warn!("{} figures are not an object, nesting them under \"figures\"", name);
                        let mut fields = serde_json::Map::new();
                        fields.insert("figures".to_string(), other);
                        fields
                    }
                };
                match analysis {
                    Ok(text) => {
                        fields.insert("analysis".to_string(), Value::String(text));
                    }
                    Err(e) => {
                        fields.insert("analysis".to_string(), Value::Null);
                        fields.insert("analysis_error".to_string(), Value::String(e.to_string()));
                    }
                }
                ReportSlot::Computed(Value::Object(fields))
            }
        }
    }

    async fn generate_json(&self, prompt: &str) -> Result<Value> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or(FinancialDocumentError::ModelUnavailable)?;
        let text = gateway.generate(prompt, true).await?;
        parse_json_lenient(&text)
    }
}

/// Computed reports only, against today's date. Model-written slots carry
/// an error.
pub async fn compose_reports(document: &StructuredDocument) -> ReportBundle {
    ReportComposer::offline(PipelineConfig::default())
        .compose(document, "")
        .await
}

fn computed(value: Value) -> PlannedReport {
    PlannedReport::Computed(Ok(value))
}

fn serialized(value: impl Serialize) -> PlannedReport {
    PlannedReport::Computed(serde_json::to_value(value).map_err(FinancialDocumentError::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_bundle_has_every_name() {
        for kind in DocumentType::ALL {
            let bundle = ReportBundle::new(kind);
            assert_eq!(bundle.len(), 5);
            for name in kind.report_names() {
                assert!(bundle.get(name).is_some_and(ReportSlot::is_failed));
            }
        }
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let mut bundle = ReportBundle::new(DocumentType::Invoice);
        bundle.set("made_up", ReportSlot::Computed(json!({})));
        bundle.set("invoice_aging", ReportSlot::Computed(json!({"age_in_days": 3})));
        assert_eq!(bundle.len(), 5);
        assert!(bundle.get("made_up").is_none());
        assert_eq!(bundle.failed().count(), 4);
    }

    #[test]
    fn test_failed_slot_serializes_as_error_object() {
        let failed = serde_json::to_value(ReportSlot::Failed("quota".to_string())).unwrap();
        assert_eq!(failed, json!({"error": "quota"}));

        let generated: ReportSlot = serde_json::from_value(json!({"generated": {"a": 1}})).unwrap();
        assert_eq!(generated, ReportSlot::Generated(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_commentary_keeps_non_object_figures() {
        let composer = ReportComposer::offline(PipelineConfig::default());
        let planned = PlannedReport::Commentary {
            base: json!([1, 2]),
            prompt: "comment".to_string(),
        };

        let slot = composer.produce("management_report", planned).await;
        let content = slot.content().unwrap();
        assert_eq!(content["figures"], json!([1, 2]));
        assert_eq!(content["analysis"], Value::Null);
        assert!(content["analysis_error"].is_string());
    }

    #[tokio::test]
    async fn test_offline_bundle_is_complete_for_every_type() {
        for kind in DocumentType::ALL {
            let document = StructuredDocument::from_model_value(kind, json!({})).unwrap();
            let bundle = compose_reports(&document).await;
            let mut names: Vec<&str> = bundle.reports.keys().map(String::as_str).collect();
            let mut expected = kind.report_names().to_vec();
            names.sort_unstable();
            expected.sort_unstable();
            assert_eq!(names, expected, "{}", kind);
        }
    }
}
