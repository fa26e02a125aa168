use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcp_webbench::config::BenchConfig;
use mcp_webbench::llm::{ChatModel, LLMError, OpenAiChat};
use mcp_webbench::runner::{BenchRunner, Scenario, SCENARIOS};
use mcp_webbench::session::ProviderSpec;

#[derive(Debug, Parser)]
#[command(
    name = "mcp-webbench",
    about = "LLM-driven benchmark for MCP browser-automation servers"
)]
struct Args {
    /// Only run adapters whose name contains this substring (case-insensitive).
    #[arg(long)]
    adapter: Option<String>,

    /// Only run scenarios whose name contains this substring (case-insensitive).
    #[arg(long)]
    scenario: Option<String>,

    /// Model name override (defaults to LOCAL_LLM_MODEL or gpt-4o-mini).
    #[arg(long)]
    model: Option<String>,

    /// Output CSV path (defaults to RESULTS_FILE or results.csv).
    #[arg(long)]
    results: Option<PathBuf>,

    /// Output Markdown report path (defaults to REPORT_FILE or LAST_RUN_SUMMARY.md).
    #[arg(long)]
    report: Option<PathBuf>,
}

fn stock_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec::new("MCP-Playwright", "npx", &["-y", "@playwright/mcp"]),
        ProviderSpec::new("MCP-Chrome-DevTools", "npx", &["-y", "chrome-devtools-mcp"]),
        ProviderSpec::new("Vercel-Agent", "npx", &["-y", "agent-browser"]),
        ProviderSpec::new("Vibium", "npx", &["-y", "vibium", "mcp"]),
    ]
}

fn build_llm(model_override: Option<String>) -> Result<Arc<dyn ChatModel>, LLMError> {
    if let Ok(base_url) = env::var("LOCAL_LLM_URL") {
        let model = model_override
            .or_else(|| env::var("LOCAL_LLM_MODEL").ok())
            .unwrap_or_else(|| "llama3".to_string());
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key("local-no-key");
        return Ok(Arc::new(OpenAiChat::new(config).with_model(model)));
    }
    if let Ok(api_key) = env::var("OPENAI_API_KEY") {
        let model = model_override.unwrap_or_else(|| "gpt-4o-mini".to_string());
        let config = OpenAIConfig::new().with_api_key(api_key);
        return Ok(Arc::new(OpenAiChat::new(config).with_model(model)));
    }
    Err(LLMError::MissingConfiguration)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mcp_webbench=info")),
        )
        .init();

    let args = Args::parse();
    let config = BenchConfig::from_env();
    let llm = build_llm(args.model.clone())?;

    let providers: Vec<ProviderSpec> = match &args.adapter {
        Some(filter) => {
            let filter = filter.to_lowercase();
            stock_providers()
                .into_iter()
                .filter(|p| p.name.to_lowercase().contains(&filter))
                .collect()
        }
        None => stock_providers(),
    };
    if providers.is_empty() {
        return Err(format!(
            "No adapters found matching: {}",
            args.adapter.as_deref().unwrap_or("")
        )
        .into());
    }

    let scenarios: Vec<Scenario> = match &args.scenario {
        Some(filter) => {
            let filter = filter.to_lowercase();
            SCENARIOS
                .iter()
                .filter(|s| s.name.to_lowercase().contains(&filter))
                .cloned()
                .collect()
        }
        None => SCENARIOS.to_vec(),
    };
    if scenarios.is_empty() {
        return Err(format!(
            "No scenarios found matching: {}",
            args.scenario.as_deref().unwrap_or("")
        )
        .into());
    }

    let results_path = args.results.unwrap_or_else(|| config.results_file.clone());
    let report_path = args.report.unwrap_or_else(|| config.report_file.clone());

    let runner = BenchRunner::new(config, llm);
    let telemetry = runner.run(&providers, &scenarios).await;

    telemetry.export_csv(&results_path)?;
    telemetry.write_report(&report_path)?;
    Ok(())
}
