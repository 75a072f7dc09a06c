use dotenv::dotenv;
use financial_document_extractor::{
    DocumentExtractor, DocumentPipeline, ExtractionEvent, ExtractionRequest, GatewayConfig, InMemoryCache,
    ModelGateway, PipelineConfig,
};
use anyhow::{anyhow, Context};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Usage: `cargo run --example extract_document -- <ocr-text-file> [document-type]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| anyhow!("pass the path of an OCR text file"))?;
    let declared = args.next();

    let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path))?;
    let text = String::from_utf8_lossy(&bytes).to_string();

    let pipeline_config = PipelineConfig::default();
    let cache = Arc::new(InMemoryCache::new());
    let gateway = ModelGateway::from_config(&GatewayConfig::from_env())?
        .with_cache(cache.clone(), pipeline_config.llm_cache_ttl());

    let (tx, mut rx) = mpsc::channel(16);
    let extractor = DocumentExtractor::new(gateway, pipeline_config).with_progress(tx);
    let pipeline = DocumentPipeline::new(extractor).with_cache(cache);

    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ExtractionEvent::Failed { reason } => println!("❌ {}", reason),
                other => println!("⏳ {:?}", other),
            }
        }
    });

    let request = ExtractionRequest::new(&bytes, declared.as_deref(), text);
    let extracted = pipeline.process(&request).await?;
    drop(pipeline);
    let _ = progress.await;

    println!("\n📄 {} (model: {})", extracted.document_type(), extracted.model_used);
    println!("{}", serde_json::to_string_pretty(&extracted.document)?);

    if !extracted.anomalies.is_empty() {
        println!("\n⚠️  Anomalies:");
        for anomaly in &extracted.anomalies {
            println!("  - {}", anomaly.description);
        }
    }

    println!("\n📊 Reports:");
    for (name, slot) in &extracted.reports.reports {
        match slot.error() {
            Some(error) => println!("  ✗ {}: {}", name, error),
            None => println!("  ✓ {}", name),
        }
    }

    Ok(())
}
