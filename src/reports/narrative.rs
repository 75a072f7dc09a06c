use super::{computed, PlannedReport, ReportContext, ReportPlan};
use crate::documents::{AgreementContract, AuditPapers};
use crate::llm::prompts::{report_prompt, AUDIT_SUMMARY_SHAPE, CONTRACT_ANALYSIS_SHAPE};
use crate::metrics::category_totals;
use crate::normalize::item_text;
use serde_json::{json, Value};

pub(crate) fn audit_papers(doc: &AuditPapers, ctx: &ReportContext<'_>) -> ReportPlan {
    let context = format!("{}\n\nOCR Text:\n{}", ctx.base_data, ctx.source_text);
    let adjustments_total = doc.adjustments_total();

    vec![
        (
            "audit_ready_summary",
            PlannedReport::Generated(report_prompt(
                "Generate an Audit-Ready Financial Summary from the audit papers.",
                AUDIT_SUMMARY_SHAPE,
                "Base Data",
                &context,
            )),
        ),
        (
            "supporting_schedules",
            computed(json!({
                "entity_name": doc.entity_name,
                "audit_period": doc.audit_period,
                "schedules": {
                    "key_findings": doc.key_findings,
                    "adjustments": doc.adjustments,
                    "recommendations": doc.recommendations,
                },
            })),
        ),
        (
            "adjustment_notes",
            computed(json!({
                "adjustments": doc.adjustments,
                "adjustment_count": doc.adjustments.len(),
                "total_adjustments": adjustments_total,
            })),
        ),
        (
            "working_papers",
            computed(json!({
                "audit_type": doc.audit_type,
                "auditor_name": doc.auditor_name,
                "findings": doc.key_findings.iter().map(item_text).collect::<Vec<_>>(),
                "recommendations": doc.recommendations.iter().map(item_text).collect::<Vec<_>>(),
            })),
        ),
        (
            "final_audit_pack",
            computed(json!({
                "entity_name": doc.entity_name,
                "audit_period": doc.audit_period,
                "audit_type": doc.audit_type,
                "auditor_name": doc.auditor_name,
                "audit_opinion": doc.audit_opinion,
                "key_findings_count": doc.key_findings.len(),
                "adjustments_count": doc.adjustments.len(),
                "total_adjustments": adjustments_total,
                "recommendations_count": doc.recommendations.len(),
            })),
        ),
    ]
}

pub(crate) fn agreement_contract(doc: &AgreementContract, ctx: &ReportContext<'_>) -> ReportPlan {
    let risk_levels = category_totals(
        doc.risks
            .iter()
            .map(|risk| (AgreementContract::risk_level(risk), Some(1.0))),
        "Unrated",
    );
    let high_risks: Vec<&Value> = doc
        .risks
        .iter()
        .filter(|risk| {
            AgreementContract::risk_level(risk).is_some_and(|level| level.eq_ignore_ascii_case("high"))
        })
        .collect();

    vec![
        (
            "contract_summary",
            computed(json!({
                "contract_type": doc.contract_type,
                "parties": doc.parties,
                "contract_date": doc.contract_date,
                "validity_period": doc.validity_period,
                "summary": doc.summary,
            })),
        ),
        (
            "key_clause_extraction",
            computed(json!({
                "key_terms": doc.key_terms,
                "clause_count": doc.key_terms.len(),
            })),
        ),
        (
            "risk_obligation_analysis",
            computed(json!({
                "risks": doc.risks,
                "obligations": doc.obligations,
                "risk_levels": risk_levels,
                "high_risk_items": high_risks,
                "obligation_count": doc.obligations.len(),
            })),
        ),
        (
            "term_compliance_summary",
            computed(json!({
                "compliance_requirements": doc.compliance_requirements,
                "requirement_count": doc.compliance_requirements.len(),
                "validity_period": doc.validity_period,
            })),
        ),
        (
            "contract_analysis",
            PlannedReport::Generated(report_prompt(
                "Analyze the contract/agreement and extract its terms, obligations, risks and compliance requirements.",
                CONTRACT_ANALYSIS_SHAPE,
                "Contract Text",
                ctx.source_text,
            )),
        ),
    ]
}
