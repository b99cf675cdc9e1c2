//! Line-map hardening command.

use std::path::Path;

use console::style;

use medocr::hardening::{apply_hardening, should_trigger};
use medocr::{LexicalLine, ReviewFlag};

use crate::cli::icons::{dim_arrow, success, warn};

/// Harden a line map read from a text file and print the improved map.
pub async fn cmd_harden(
    file: &Path,
    score: Option<f64>,
    flag_codes: &[String],
    force: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }
    let contents = tokio::fs::read_to_string(file).await?;
    let lines: Vec<LexicalLine> = contents.lines().map(LexicalLine::from).collect();

    let flags: Vec<ReviewFlag> = flag_codes
        .iter()
        .filter_map(|code| code.parse().ok())
        .collect();

    if !should_trigger(score, &flags) {
        if !force {
            eprintln!(
                "{} Hardening not triggered (score {:?}, {} flags); use --force to run anyway",
                warn(),
                score,
                flags.len()
            );
            print!("{}", contents);
            return Ok(());
        }
        eprintln!("{} Hardening not triggered, running anyway", warn());
    }

    let result = apply_hardening(&lines);
    eprintln!(
        "{} Hardened {} lines, kept {} pass",
        success(),
        lines.len(),
        result.chosen_pass
    );
    for pass in &result.passes {
        eprintln!(
            "  {} {:<10} {}",
            dim_arrow(),
            pass.mode,
            style(format!("{} chars", pass.text_length)).dim()
        );
    }

    for line in &result.improved_map {
        println!("{}", line.text);
    }
    Ok(())
}
