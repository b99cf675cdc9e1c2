//! Text extraction commands.

use std::path::Path;
use std::sync::Arc;

use console::style;

use medocr::config::Config;
use medocr::pdf::DirectTextParser;
use medocr::pipeline::{QualityScorer, StrategySelector};
use medocr::{DocumentIntelligenceClient, OcrClient, OcrPipeline, PipelineOptions};

use crate::cli::icons::{dim_arrow, error, success};

async fn read_pdf(file: &Path) -> anyhow::Result<Vec<u8>> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }
    Ok(tokio::fs::read(file).await?)
}

/// Run the full pipeline over one PDF.
pub async fn cmd_extract(
    config: &Config,
    file: &Path,
    force_enhanced: bool,
    json: bool,
) -> anyhow::Result<()> {
    let pdf = read_pdf(file).await?;

    let client = DocumentIntelligenceClient::new(config.ocr.clone())?;
    let hint = client.availability_hint();
    let pipeline = OcrPipeline::from_config(Arc::new(client), &config.pipeline);

    let result = match pipeline.run(&pdf, PipelineOptions { force_enhanced }).await {
        Ok(result) => result,
        Err(e) if e.is_config_missing() => {
            eprintln!("{} {}", error(), e);
            eprintln!("  {} {}", dim_arrow(), style(hint).dim());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    eprintln!(
        "{} {} ({} pages, {} mode, score {:.2})",
        success(),
        file.display(),
        result.page_count,
        result.mode,
        result.metrics.score
    );
    if !result.metrics.reasons.is_empty() {
        eprintln!(
            "  {} {}",
            dim_arrow(),
            style(result.metrics.reasons.join(", ")).dim()
        );
    }
    println!("{}", result.text);
    Ok(())
}

/// Direct parse and strategy decision only; never calls OCR.
pub async fn cmd_select(file: &Path, force_enhanced: bool) -> anyhow::Result<()> {
    let pdf = read_pdf(file).await?;
    let parsed = DirectTextParser::new().parse(&pdf)?;
    let decision = StrategySelector::new().select(
        &parsed.text,
        parsed.page_count,
        pdf.len() as u64,
        force_enhanced,
    );
    let metrics = QualityScorer::new().score(&parsed.text);

    println!("\n{}", style(file.display()).bold());
    println!("{}", "-".repeat(50));
    println!("  {:<15} {}", "Pages", parsed.page_count);
    println!("  {:<15} {}", "Embedded chars", parsed.text.trim().chars().count());
    println!("  {:<15} {:.1}", "Density", decision.signal_metrics.density);
    println!("  {:<15} {:.3}", "Weird ratio", decision.signal_metrics.weird_ratio);
    println!("  {:<15} {:.2}", "Text score", metrics.score);
    println!(
        "  {:<15} {} ({})",
        "Decision",
        style(decision.mode).cyan(),
        decision.reason
    );
    Ok(())
}
