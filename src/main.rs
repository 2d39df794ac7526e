use anyhow::{bail, Result};
use pantry_intake::ai_client::{DisabledGenerator, HttpTextGenerator, QuotaGuardedGenerator, TextGenerator};
use pantry_intake::batch::BatchOrchestrator;
use pantry_intake::config::AppConfig;
use pantry_intake::db::PgInventoryStore;
use pantry_intake::errors::error_logging;
use pantry_intake::extraction::FileTextExtractor;
use pantry_intake::localization::LocalizationManager;
use pantry_intake::matcher::IngredientMatcher;
use pantry_intake::merge::InventoryMergeEngine;
use pantry_intake::model::RawInput;
use pantry_intake::observability;
use pantry_intake::storage_advisor::RuleBasedStorageAdvisor;
use pantry_intake::store::{InventoryStore, MemoryStore};
use pantry_intake::structured_parser::StructuredItemParser;
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const USAGE: &str = "usage: pantry-intake [--lang <code>] <file>...";

/// Command line arguments
#[derive(Debug)]
struct CliArgs {
    language: String,
    files: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut language = "en".to_string();
    let mut files = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--lang" | "-l" => match args.next() {
                Some(code) if !code.trim().is_empty() => language = code,
                _ => bail!("--lang needs a language code\n{}", USAGE),
            },
            "--help" | "-h" => bail!(USAGE),
            _ => files.push(arg),
        }
    }

    if files.is_empty() {
        bail!(USAGE);
    }
    Ok(CliArgs { language, files })
}

/// Build the AI collaborator, or a disabled one when no key is configured
fn build_generator(config: &AppConfig) -> Result<Arc<dyn TextGenerator>> {
    if !config.ai.is_enabled() {
        info!("AI_API_KEY not set, every input uses the heuristic parser");
        return Ok(Arc::new(DisabledGenerator));
    }
    let client = HttpTextGenerator::new(config.ai.clone())?;
    Ok(Arc::new(QuotaGuardedGenerator::new(client, config.ai.daily_quota)))
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn InventoryStore>> {
    if config.database.url.is_none() {
        warn!("DATABASE_URL not set, using an in-memory store; nothing will be kept");
        return Ok(Arc::new(MemoryStore::new()));
    }
    match PgInventoryStore::connect(&config.database).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) => {
            error_logging::log_database_error(&format!("{:#}", e), "connect", None);
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = parse_args(env::args().skip(1))?;

    let config = AppConfig::from_env()?;
    if let Err(e) = config.validate() {
        error_logging::log_config_error(&e, "app_config", "startup_validation");
        return Err(e.into());
    }

    observability::init_observability_with_config(config.observability.clone()).await?;
    info!("{}", config.summary());

    let store = build_store(&config).await?;
    let parser = StructuredItemParser::new(build_generator(&config)?, config.parser.clone());
    let merge_engine = InventoryMergeEngine::new(
        Arc::new(RuleBasedStorageAdvisor::new()),
        Arc::clone(&store),
        IngredientMatcher::new(config.grouping.clone()),
    );
    let orchestrator = BatchOrchestrator::new(Arc::new(FileTextExtractor), parser, merge_engine, store);

    let inputs: Vec<RawInput> = cli
        .files
        .iter()
        .map(|path| RawInput::scan(path.as_str()).with_locale(cli.language.as_str()))
        .collect();

    // Ctrl-C stops before the next input; committed items stay
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current input");
            ctrl_c_token.cancel();
        }
    });

    let result = orchestrator.run_with_cancellation(&inputs, cancel).await;

    let localization = LocalizationManager::new()?;
    println!("{}", result.summary().render(&localization, &cli.language));
    for item in &result.items {
        println!(
            "  {} {} {} ({})",
            item.name, item.quantity, item.unit, item.category
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let cli = parse_args(args(&["--lang", "zh", "a.txt", "b.txt"])).unwrap();
        assert_eq!(cli.language, "zh");
        assert_eq!(cli.files, vec!["a.txt", "b.txt"]);

        let cli = parse_args(args(&["receipt.txt"])).unwrap();
        assert_eq!(cli.language, "en");
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--lang"])).is_err());
        assert!(parse_args(args(&["--help"])).is_err());
    }
}
