//! Electrolyte Planner CLI
//!
//! A thin wrapper around electrolyte-planner-core that provides the command-line interface.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use electrolyte_planner_core::{
    AppConfig, Coordinator, DocumentStore, ExperimentPlan, InMemoryDocumentStore, LanguageModel,
    OpenAiClient, QueryRequest,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "electrolyte-planner")]
#[command(about = "Turn battery electrolyte questions into ranked experiment plans")]
struct Args {
    /// Query in natural language
    query: Option<String>,

    /// Materials you want used, free text (e.g. "ZnCl2, DMSO")
    #[arg(long)]
    materials: Option<String>,

    /// Never call the model backend, even when an API key is set
    #[arg(long)]
    offline: bool,

    /// Directory of .txt/.md documents to search alongside the knowledge base
    #[arg(long = "docs")]
    docs_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long = "config")]
    config_path: Option<PathBuf>,

    /// Print the full response as JSON
    #[arg(long)]
    json: bool,

    /// Only classify the query
    #[arg(long = "classify-only")]
    classify_only: bool,

    /// Print stage status and exit
    #[arg(long)]
    status: bool,

    /// Enable verbose debug output
    #[arg(long, short = 'v')]
    verbose: bool,
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_llm(config: &AppConfig, offline: bool) -> Option<Arc<dyn LanguageModel>> {
    if offline {
        tracing::debug!("Offline mode, model backend disabled");
        return None;
    }
    if !config.llm.is_available() {
        tracing::info!(
            "No API key in {}, running with fallbacks",
            config.llm.api_key_env
        );
        return None;
    }
    match OpenAiClient::from_config(&config.llm) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!("Model backend unavailable: {}", e);
            None
        }
    }
}

/// `--docs` wins over `[literature] documents_dir`
fn documents_dir<'a>(args: &'a Args, config: &'a AppConfig) -> Option<&'a Path> {
    args.docs_dir
        .as_deref()
        .or(config.literature.documents_dir.as_deref())
}

fn build_store(dir: Option<&Path>, chunk_words: usize) -> Option<Box<dyn DocumentStore>> {
    let dir = dir?;
    let mut store = InMemoryDocumentStore::new(chunk_words);
    match store.load_dir(dir) {
        Ok(chunks) => {
            tracing::info!("Indexed {} chunks from {}", chunks, dir.display());
            Some(Box::new(store))
        }
        Err(e) => {
            tracing::warn!("Failed to load documents: {:#}", e);
            None
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn format_plan_table(plans: &[ExperimentPlan]) -> String {
    if plans.is_empty() {
        return String::new();
    }
    let mut lines = vec![
        format!("{:<3} {:<8}  {:>8}  {:>10}  {}", "#", "ID", "Priority", "Confidence", "Title"),
    ];
    for (i, plan) in plans.iter().enumerate() {
        let confidence = plan
            .prediction_confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{:<3} {:<8}  {:>8.2}  {:>10}  {}",
            i + 1,
            plan.plan_id,
            plan.priority_score,
            confidence,
            plan.title
        ));
    }
    lines.join("\n")
}

fn main() -> Result<()> {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let config = AppConfig::load(args.config_path.as_deref())?;
    let llm = build_llm(&config, args.offline);
    let store = build_store(documents_dir(&args, &config), config.literature.chunk_words);
    let coordinator = Coordinator::new(config, llm, store);

    if args.status {
        println!("{}", serde_json::to_string_pretty(&coordinator.agent_status())?);
        return Ok(());
    }

    let Some(query) = args.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        bail!("A query is required (try: electrolyte-planner \"Design a high-voltage electrolyte for NMC811\")");
    };

    if args.classify_only {
        println!("{}", serde_json::to_string_pretty(&coordinator.classify(query))?);
        return Ok(());
    }

    let request = QueryRequest {
        query: query.to_string(),
        user_materials: args.materials.clone(),
    };
    let response = coordinator.process(&request);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.summary);
    let table = format_plan_table(&response.experiment_plans);
    if !table.is_empty() {
        println!("\n{}", table);
    }
    tracing::debug!("Processed in {:.2}s", response.processing_time);

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use electrolyte_planner_core::{BatteryChemistry, ComponentRole, FormulationComponent};

    fn plan(id: &str, title: &str, priority: f64, confidence: Option<f64>) -> ExperimentPlan {
        ExperimentPlan {
            plan_id: id.to_string(),
            title: title.to_string(),
            formulation: vec![FormulationComponent::new("Ethylene Carbonate", "EC", 30.0, "vol%", ComponentRole::Solvent)],
            rationale: String::new(),
            battery_type: BatteryChemistry::LithiumIon,
            experimental_steps: Vec::new(),
            safety_considerations: Vec::new(),
            estimated_cost: "$300-600".to_string(),
            estimated_time: "4-8 weeks".to_string(),
            priority_score: priority,
            protocols: Vec::new(),
            predicted_performance: None,
            prediction_confidence: confidence,
            prediction_notes: None,
            llm_rationale: None,
        }
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "electrolyte-planner",
            "zinc electrolyte",
            "--materials",
            "ZnCl2, DMSO",
            "--offline",
            "--json",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.query.as_deref(), Some("zinc electrolyte"));
        assert_eq!(args.materials.as_deref(), Some("ZnCl2, DMSO"));
        assert!(args.offline && args.json && args.verbose);
        assert!(!args.classify_only);
    }

    #[test]
    fn test_status_without_query() {
        let args = Args::try_parse_from(["electrolyte-planner", "--status"]).unwrap();
        assert!(args.status);
        assert!(args.query.is_none());
    }

    #[test]
    fn test_docs_flag_overrides_config() {
        let mut config = AppConfig::default();
        config.literature.documents_dir = Some(PathBuf::from("/data/papers"));

        let args = Args::try_parse_from(["electrolyte-planner", "q"]).unwrap();
        assert_eq!(documents_dir(&args, &config), Some(Path::new("/data/papers")));

        let args = Args::try_parse_from(["electrolyte-planner", "q", "--docs", "notes"]).unwrap();
        assert_eq!(documents_dir(&args, &config), Some(Path::new("notes")));
    }

    #[test]
    fn test_offline_skips_model() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        assert!(build_llm(&config, true).is_none());
        assert!(build_llm(&config, false).is_some());

        config.llm.api_key = None;
        assert!(build_llm(&config, false).is_none());
    }

    #[test]
    fn test_missing_docs_dir_is_ignored() {
        assert!(build_store(Some(Path::new("/nonexistent/electrolyte-docs")), 200).is_none());
        assert!(build_store(None, 200).is_none());
    }

    #[test]
    fn test_plan_table() {
        let table = format_plan_table(&[
            plan("a1b2c3d4", "Optimized Li-ion Electrolyte", 0.9, Some(0.5)),
            plan("e5f6a7b8", "Baseline Commercial-type Electrolyte", 0.85, None),
        ]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("#   ID"));
        assert!(lines[1].contains("a1b2c3d4"));
        assert!(lines[1].contains("0.90"));
        assert!(lines[1].contains("50%"));
        assert!(lines[1].ends_with("Optimized Li-ion Electrolyte"));
        assert!(lines[2].contains(" - "));
        assert_eq!(format_plan_table(&[]), "");
    }
}
