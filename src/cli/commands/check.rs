//! Availability check for the OCR service and page renderer.

use console::style;

use medocr::config::Config;
use medocr::pdf::PopplerContext;
use medocr::{DocumentIntelligenceClient, OcrClient};

/// Print which enhanced-path dependencies are usable.
pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("OCR Pipeline Status").bold());
    println!("{}", "-".repeat(50));

    let renderer_status = if PopplerContext::is_available() {
        style("✓ found").green()
    } else {
        style("✗ not found").red()
    };
    println!("  {:<15} {}", "pdftoppm", renderer_status);
    if !PopplerContext::is_available() {
        println!(
            "                  {}",
            style("install poppler-utils").dim()
        );
    }

    let client = DocumentIntelligenceClient::new(config.ocr.clone())?;
    let client_status = if client.is_configured() {
        style("✓ configured").green()
    } else {
        style("✗ not configured").red()
    };
    println!("  {:<15} {}", client.name(), client_status);
    println!("                  {}", style(client.availability_hint()).dim());

    println!(
        "\n  {:<15} dpi={} max_pages={} timeout={}s",
        "Pipeline", config.pipeline.dpi, config.pipeline.max_pages, config.pipeline.timeout_secs
    );
    if let Some(path) = &config.source_path {
        println!("  {:<15} {}", "Config", path.display());
    }
    println!();
    Ok(())
}
