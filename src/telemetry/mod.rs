use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::runner::Status;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One record per (adapter, scenario). Every scenario produces exactly one,
/// terminal status included, even when the session died at startup.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    #[serde(rename = "Scenario")]
    pub scenario: String,
    #[serde(rename = "Adapter")]
    pub adapter: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Steps")]
    pub steps: usize,
    #[serde(rename = "Total Duration (ms)")]
    pub duration_ms: u64,
    #[serde(rename = "LLM Duration (ms)")]
    pub llm_duration_ms: u64,
    #[serde(rename = "Tool Duration (ms)")]
    pub tool_duration_ms: u64,
    #[serde(rename = "Prompt Tokens")]
    pub prompt_tokens: u32,
    #[serde(rename = "Completion Tokens")]
    pub completion_tokens: u32,
    #[serde(rename = "Token Efficiency")]
    pub token_efficiency: f64,
    #[serde(rename = "Avg Context Size (chars)")]
    pub avg_context_size: usize,
    #[serde(rename = "Error")]
    pub error: String,
}

/// Successes per thousand tokens spent; 0 when nothing was spent.
pub fn token_efficiency(success: bool, total_tokens: u32) -> f64 {
    if total_tokens == 0 {
        return 0.0;
    }
    let score = if success { 1.0 } else { 0.0 };
    score / (f64::from(total_tokens) / 1000.0)
}

/// Accumulates per-scenario records for one run and writes them out at the
/// end. Nothing here persists beyond the run.
#[derive(Default)]
pub struct Telemetry {
    results: Vec<Metrics>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metrics: Metrics) {
        info!(
            "[Metrics] {} | {} | {} | {} steps | {}ms",
            metrics.adapter,
            metrics.scenario,
            if metrics.success { "PASS" } else { "FAIL" },
            metrics.steps,
            metrics.duration_ms
        );
        self.results.push(metrics);
    }

    pub fn results(&self) -> &[Metrics] {
        &self.results
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), TelemetryError> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.results {
            writer.serialize(record)?;
        }
        writer.flush()?;
        info!("Results exported to {}", path.display());
        Ok(())
    }

    pub fn write_report(&self, path: &Path) -> Result<(), TelemetryError> {
        std::fs::write(path, self.render_report())?;
        info!("Report generated: {}", path.display());
        Ok(())
    }

    fn render_report(&self) -> String {
        let mut markdown = String::from("# UI Automation Benchmark Report\n\n");
        markdown.push_str(&format!(
            "Generated on: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        markdown.push_str("## Summary\n\n");
        markdown.push_str(
            "| Scenario | Adapter | Success | Status | Steps | Total (ms) | LLM (ms) | Tool (ms) | Efficiency |\n",
        );
        markdown.push_str(
            "| :--- | :--- | :--- | :--- | :--- | :--- | :--- | :--- | :--- |\n",
        );
        for record in &self.results {
            markdown.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {:.6} |\n",
                record.scenario,
                record.adapter,
                if record.success { "✅" } else { "❌" },
                record.status,
                record.steps,
                record.duration_ms,
                record.llm_duration_ms,
                record.tool_duration_ms,
                record.token_efficiency,
            ));
        }
        markdown.push_str("\n## Key Metrics\n\n");
        markdown.push_str("- **Total Duration**: end-to-end time for the scenario.\n");
        markdown.push_str("- **LLM Duration**: pure inference latency.\n");
        markdown.push_str(
            "- **Tool Duration**: time spent executing MCP commands (browser interaction).\n",
        );
        markdown.push_str(
            "- **Token Efficiency**: `success (1/0) / (total tokens / 1000)`: successful \
             scenarios per 1,000 tokens spent. Higher is better.\n",
        );
        markdown
    }
}
