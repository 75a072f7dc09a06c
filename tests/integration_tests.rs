use async_trait::async_trait;
use chrono::NaiveDate;
use financial_document_extractor::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BANK_OCR: &str = "STATE BANK OF INDIA\nOpening Balance 1,00,000.00\n\
01/01/2024 NEFT CR ACME LTD 50,000.00 1,50,000.00\n\
05/01/2024 RENT JAN 20,000.00 1,30,000.00";

/// Answers every prompt through `respond` and counts the calls it receives.
struct MockBackend<F> {
    source: BackendSource,
    models: Vec<String>,
    respond: F,
    calls: AtomicUsize,
}

impl<F> MockBackend<F>
where
    F: Fn(&str) -> std::result::Result<String, BackendError> + Send + Sync,
{
    fn new(source: BackendSource, respond: F) -> Arc<Self> {
        Arc::new(Self {
            source,
            models: vec!["gemini-2.5-flash".to_string(), "gemini-2.0-flash".to_string()],
            respond,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> ModelBackend for MockBackend<F>
where
    F: Fn(&str) -> std::result::Result<String, BackendError> + Send + Sync,
{
    fn source(&self) -> BackendSource {
        self.source
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn generate(&self, _model: &str, prompt: &str) -> std::result::Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }
}

fn is_extraction(prompt: &str) -> bool {
    prompt.contains("data from the OCR text below")
}

fn is_classification(prompt: &str) -> bool {
    prompt.contains("financial document classifier")
}

fn bank_reply() -> String {
    let body = json!({
        "bank_name": "State Bank of India",
        "opening_balance": "1,00,000.00",
        "transactions": [
            {"date": "2024-01-01", "description": "NEFT CR ACME LTD", "debit": null, "credit": "50,000.00", "balance": "1,50,000.00"},
            {"date": "2024-01-05", "description": "RENT JAN", "debit": "₹20,000", "credit": null, "balance": 130000}
        ],
        "summary": {"anomalies": []}
    });
    format!("```json\n{}\n```", body)
}

fn gateway_for<B: ModelBackend + 'static>(backend: Arc<B>) -> ModelGateway {
    ModelGateway::new(backend).with_retry_policy(RetryPolicy::immediate(2))
}

fn extractor_for<B: ModelBackend + 'static>(backend: Arc<B>) -> DocumentExtractor {
    DocumentExtractor::new(gateway_for(backend), PipelineConfig::default())
        .with_as_of(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
}

#[tokio::test]
async fn test_bank_statement_end_to_end() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        if is_extraction(prompt) {
            Ok(bank_reply())
        } else {
            Ok(r#"{"summary": "generated"}"#.to_string())
        }
    });
    let extractor = extractor_for(backend.clone());

    let extracted = extractor
        .extract(DocumentType::BankStatement, BANK_OCR)
        .await
        .unwrap();

    let StructuredDocument::BankStatement(statement) = &extracted.document else {
        panic!("expected a bank statement, got {:?}", extracted.document_type());
    };
    assert_eq!(statement.transactions.len(), 2);
    assert_eq!(statement.transactions[0].credit, Some(50000.0));
    assert_eq!(statement.transactions[1].debit, Some(20000.0));
    assert_eq!(statement.summary.total_credits, Some(50000.0));
    assert_eq!(statement.summary.total_debits, Some(20000.0));
    assert_eq!(statement.summary.closing_balance, Some(130000.0));
    assert!(extracted.anomalies.is_empty());
    assert_eq!(extracted.model_used, "gemini-2.5-flash");

    assert_eq!(extracted.reports.len(), 5);
    assert_eq!(extracted.reports.failed().count(), 0);
    let reconciliation = extracted
        .reports
        .get("bank_reconciliation")
        .and_then(ReportSlot::content)
        .unwrap();
    assert_eq!(reconciliation["reconciled"], json!(true));
    assert!(matches!(
        extracted.reports.get("cash_flow_statement"),
        Some(ReportSlot::Generated(_))
    ));

    // one extraction plus the two model-written reports
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn test_balance_mismatch_is_reported_not_fatal() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        if is_extraction(prompt) {
            Ok(json!({
                "opening_balance": 1000,
                "transactions": [
                    {"date": "2024-02-01", "credit": 500, "balance": 1500},
                    {"date": "2024-02-02", "debit": 200, "balance": 1250},
                    {"date": "2024-02-03", "debit": 50, "balance": 1200.5}
                ],
                "summary": {"anomalies": ["Amount inferred for row 3"]}
            })
            .to_string())
        } else {
            Ok("{}".to_string())
        }
    });

    let extracted = extractor_for(backend)
        .extract(DocumentType::BankStatement, "statement")
        .await
        .unwrap();

    assert_eq!(extracted.anomalies.len(), 2);
    assert_eq!(extracted.anomalies[0].origin, AnomalyOrigin::Model);
    assert_eq!(extracted.anomalies[1].date.as_deref(), Some("2024-02-02"));
}

#[tokio::test]
async fn test_document_cache_hit_skips_the_model() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        if is_extraction(prompt) {
            Ok(bank_reply())
        } else {
            Ok("{}".to_string())
        }
    });
    let cache = Arc::new(InMemoryCache::new());
    let pipeline = DocumentPipeline::new(extractor_for(backend.clone())).with_cache(cache.clone());
    let request = ExtractionRequest::new(BANK_OCR.as_bytes(), Some("bank_statement"), BANK_OCR);

    let first = pipeline.process(&request).await.unwrap();
    let calls_after_first = backend.calls();
    assert!(calls_after_first > 0);
    assert_eq!(cache.len(), 1);

    let second = pipeline.process(&request).await.unwrap();
    assert_eq!(backend.calls(), calls_after_first);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn test_raw_call_cache_is_shared_across_extractions() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        if is_extraction(prompt) {
            Ok(bank_reply())
        } else {
            Ok("{}".to_string())
        }
    });
    let gateway = gateway_for(backend.clone()).with_cache(Arc::new(InMemoryCache::new()), LLM_CACHE_TTL);
    let extractor = DocumentExtractor::new(gateway, PipelineConfig::default());

    let first = extractor.extract(DocumentType::BankStatement, BANK_OCR).await.unwrap();
    let calls = backend.calls();
    let second = extractor.extract(DocumentType::BankStatement, BANK_OCR).await.unwrap();

    assert_eq!(backend.calls(), calls);
    assert_eq!(first.model_used, "gemini-2.5-flash");
    assert_eq!(second.model_used, "cache");
}

#[tokio::test]
async fn test_classifier_resolves_undeclared_type() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        if is_classification(prompt) {
            Ok(r#"Sure! {"type": "Invoice"}"#.to_string())
        } else if is_extraction(prompt) {
            Ok(json!({
                "invoice_number": "INV-7",
                "invoice_date": "2024-01-15",
                "amounts": {"taxable_amount": 1000, "igst": 180, "total_amount": 1180}
            })
            .to_string())
        } else {
            Ok("{}".to_string())
        }
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend));

    let extracted = pipeline
        .process(&ExtractionRequest::from_text(Some("auto"), "TAX INVOICE INV-7"))
        .await
        .unwrap();

    assert_eq!(extracted.document_type(), DocumentType::Invoice);
    let aging = extracted
        .reports
        .get("invoice_aging")
        .and_then(ReportSlot::content)
        .unwrap();
    assert_eq!(aging["age_in_days"], json!(46));
    assert_eq!(aging["aging_bucket"], json!("31-60"));
}

#[tokio::test]
async fn test_unknown_document_is_rejected() {
    let backend = MockBackend::new(BackendSource::Primary, |_: &str| {
        Ok(r#"{"type": "Unknown"}"#.to_string())
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend.clone()));

    let error = pipeline
        .process(&ExtractionRequest::from_text(None, "lunch menu"))
        .await
        .unwrap_err();
    assert!(matches!(error, FinancialDocumentError::UnsupportedDocumentType(ref t) if t == "unknown"));
    assert_eq!(backend.calls(), 1);

    let declared = pipeline
        .process(&ExtractionRequest::from_text(Some("tally_voucher"), "x"))
        .await
        .unwrap_err();
    assert_eq!(declared.kind(), "unsupported_document_type");
}

#[tokio::test]
async fn test_classification_auth_failure_surfaces() {
    let backend = MockBackend::new(BackendSource::Primary, |_: &str| {
        Err(BackendError::Authentication("API key not valid".to_string()))
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend.clone()));

    let error = pipeline
        .process(&ExtractionRequest::from_text(None, "TAX INVOICE"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), "model_auth_failure");
    assert!(error.to_string().contains("API key not valid"));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_classification_rate_limit_surfaces() {
    let backend = MockBackend::new(BackendSource::Primary, |_: &str| {
        Err(BackendError::RateLimited("quota exceeded".to_string()))
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend.clone()));

    let error = pipeline
        .process(&ExtractionRequest::from_text(Some("auto"), "TAX INVOICE"))
        .await
        .unwrap_err();
    assert!(matches!(error, FinancialDocumentError::ModelRateLimited { .. }));
    // two attempts on each of the two models
    assert_eq!(backend.calls(), 4);
}

#[tokio::test]
async fn test_malformed_output_fails_with_document_context() {
    let backend = MockBackend::new(BackendSource::Primary, |_: &str| {
        Ok("I could not read this document, sorry.".to_string())
    });

    let error = extractor_for(backend)
        .extract(DocumentType::TrialBalance, "blurry scan")
        .await
        .unwrap_err();

    match &error {
        FinancialDocumentError::ExtractionFailed { document_type, source } => {
            assert_eq!(*document_type, DocumentType::TrialBalance);
            assert!(matches!(**source, FinancialDocumentError::MalformedModelOutput { .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(error.to_string().contains("could not read"));
}

#[tokio::test]
async fn test_auth_failure_falls_back_to_secondary() {
    let primary = MockBackend::new(BackendSource::Primary, |_: &str| {
        Err(BackendError::Authentication("API key not valid".to_string()))
    });
    let secondary = MockBackend::new(BackendSource::Secondary, |prompt: &str| {
        if is_extraction(prompt) {
            Ok(bank_reply())
        } else {
            Ok("{}".to_string())
        }
    });
    let gateway = gateway_for(primary.clone()).with_fallback(secondary.clone());

    let response = gateway
        .generate_detailed("ping", false, 2)
        .await
        .unwrap();
    assert_eq!(response.source, BackendSource::Secondary);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);

    let without_fallback = gateway_for(primary.clone())
        .generate("ping", false)
        .await
        .unwrap_err();
    assert!(matches!(without_fallback, FinancialDocumentError::ModelAuthFailure(_)));
}

#[tokio::test]
async fn test_every_type_gets_a_complete_bundle_when_reports_fail() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        if is_extraction(prompt) {
            Ok("{}".to_string())
        } else {
            Err(BackendError::RateLimited("quota exceeded".to_string()))
        }
    });
    let extractor = extractor_for(backend);

    for kind in DocumentType::ALL {
        let extracted = extractor.extract(kind, "document").await.unwrap();
        assert_eq!(extracted.reports.len(), 5, "{}", kind);
        for name in kind.report_names() {
            assert!(extracted.reports.get(name).is_some(), "{} is missing {}", kind, name);
        }
        for (name, error) in extracted.reports.failed() {
            assert!(error.starts_with("Could not generate"), "{} {}: {}", kind, name, error);
        }
    }
}

#[tokio::test]
async fn test_comprehensive_audit_adds_metadata() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        assert!(prompt.contains("---DOCUMENT SEPARATOR---"));
        Ok(r#"{"header": {"title": "Financial Audit Report"}, "recommendations": []}"#.to_string())
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend));
    let sources = [
        AuditSource {
            filename: "tb.pdf".to_string(),
            document_type: "trial_balance".to_string(),
            text: "TRIAL BALANCE".to_string(),
        },
        AuditSource {
            filename: "bank.pdf".to_string(),
            document_type: "bank_statement".to_string(),
            text: BANK_OCR.to_string(),
        },
    ];

    let report = pipeline.comprehensive_audit(&sources).await;
    assert_eq!(report["header"]["title"], json!("Financial Audit Report"));
    assert_eq!(report["metadata"]["documents_analyzed"], json!(2));
    assert_eq!(report["metadata"]["filenames"], json!(["tb.pdf", "bank.pdf"]));
}

#[tokio::test]
async fn test_comprehensive_audit_failure_is_an_error_object() {
    let backend = MockBackend::new(BackendSource::Primary, |_: &str| {
        Err(BackendError::Authentication("denied".to_string()))
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend));

    let report = pipeline
        .comprehensive_audit(&[AuditSource {
            filename: "a.pdf".to_string(),
            document_type: "invoice".to_string(),
            text: "INVOICE".to_string(),
        }])
        .await;
    assert!(report["error"].as_str().unwrap().contains("denied"));
    assert_eq!(report["metadata"]["documents_analyzed"], json!(1));
}

fn gst_workbooks() -> BTreeMap<String, ExcelWorkbook> {
    let gstr2b: ExcelWorkbook = serde_json::from_value(json!({
        "B2B": {
            "columns": ["GSTIN of supplier", "Invoice number", "Taxable Value", "IGST"],
            "rows": [{"GSTIN of supplier": "27ABCDE1234F1Z5", "Invoice number": "INV-001", "Taxable Value": 1000, "IGST": 180}]
        }
    }))
    .unwrap();
    let vendors: ExcelWorkbook = serde_json::from_value(json!({
        "Vendors": {
            "columns": ["Vendor Name", "GSTIN"],
            "data": [{"Vendor Name": "MMX Foods Pvt Ltd", "GSTIN": "27ABCDE1234F1Z5"}]
        }
    }))
    .unwrap();
    BTreeMap::from([
        (workbook_kind("GSTR-2B April.xlsx").to_string(), gstr2b),
        (workbook_kind("vendor master.xlsx").to_string(), vendors),
    ])
}

#[tokio::test]
async fn test_gst_excel_audit_adds_metadata() {
    let backend = MockBackend::new(BackendSource::Primary, |prompt: &str| {
        assert!(prompt.contains("GSTR2B_SUMMARY - COMPLETE DATA"));
        assert!(prompt.contains("Row 1: GSTIN of supplier: 27ABCDE1234F1Z5 | Invoice number: INV-001"));
        assert!(prompt.contains("Row 1: Vendor Name: MMX Foods Pvt Ltd | GSTIN: 27ABCDE1234F1Z5"));
        Ok(r#"```json
{"header": {"title": "GST Compliance Audit Report"}, "recommendations": []}
```"#
            .to_string())
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend.clone()));

    let report = pipeline.gst_excel_audit(&gst_workbooks()).await;
    assert_eq!(report["header"]["title"], json!("GST Compliance Audit Report"));
    assert_eq!(report["metadata"]["excel_files_processed"], json!(2));
    assert_eq!(
        report["metadata"]["file_types"],
        json!(["gstr2b_summary", "vendor_master"])
    );
    assert!(report["metadata"]["generated_at"].is_string());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_gst_excel_audit_failure_is_an_error_object() {
    let backend = MockBackend::new(BackendSource::Primary, |_: &str| {
        Ok("The spreadsheets look fine to me.".to_string())
    });
    let pipeline = DocumentPipeline::new(extractor_for(backend.clone()));

    let report = pipeline.gst_excel_audit(&gst_workbooks()).await;
    assert!(report["error"].as_str().unwrap().starts_with("Error generating comprehensive GST report"));
    assert_eq!(report["metadata"]["excel_files_processed"], json!(2));

    let empty = pipeline.gst_excel_audit(&BTreeMap::new()).await;
    assert!(empty["error"].as_str().unwrap().contains("at least one spreadsheet"));
    assert_eq!(empty["metadata"]["excel_files_processed"], json!(0));
    assert_eq!(backend.calls(), 1);
}
