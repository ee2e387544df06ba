use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use colored::*;
use tracing::info;

use super::OutputFormat;
use crate::stats::{Row, SummaryRow};

pub struct Reporter {
    format: OutputFormat,
    output_path: Option<String>,
}

impl Reporter {
    pub fn new(format: &str, output_path: Option<String>) -> Self {
        Self {
            format: OutputFormat::from(format),
            output_path,
        }
    }

    /// Renders the sorted rows and writes them to the output file, or to
    /// stdout when no path was given.
    pub fn write_report(&self, rows: &[Row]) -> Result<()> {
        let content = match self.format {
            OutputFormat::Csv => render_csv(rows)?,
            OutputFormat::Json => serde_json::to_string_pretty(rows)?,
        };

        match &self.output_path {
            Some(path) => {
                fs::write(path, content)
                    .with_context(|| format!("Failed to write report to {}", path))?;
                info!("Report saved to {}", path);
            }
            None => {
                std::io::stdout()
                    .write_all(content.as_bytes())
                    .context("Failed to write report to stdout")?;
            }
        }
        Ok(())
    }
}

fn render_csv(rows: &[Row]) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(["org", "repo", "user", "additions", "deletions", "prs"])?;
        for row in rows {
            let additions = row.additions.to_string();
            let deletions = row.deletions.to_string();
            let prs = row.prs.to_string();
            writer.write_record([
                row.org.as_str(),
                row.repo.as_str(),
                row.user.as_str(),
                additions.as_str(),
                deletions.as_str(),
                prs.as_str(),
            ])?;
        }
        writer.flush()?;
    }
    String::from_utf8(buf).context("csv output was not valid UTF-8")
}

/// Renders the organization-level top contributors to stderr, keeping stdout
/// clean for the report itself.
pub fn print_summary(repo_count: usize, summary: &[SummaryRow]) {
    eprintln!("Scanned {} repos. Top contributors (org total):", repo_count);
    for (i, row) in summary.iter().take(10).enumerate() {
        eprintln!(
            "  {}) {}  +{} / -{}  PRs:{}",
            i + 1,
            format!("{:<20}", row.user).bright_white(),
            row.additions,
            row.deletions,
            row.prs
        );
    }
}
