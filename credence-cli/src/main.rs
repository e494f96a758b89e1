//! Credence CLI
//!
//! Scores one content item for misinformation risk and explains the result.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use credence_core::{AnalysisRequest, Contribution, FusionFailure, FusionResult};
use credence_modules::{
    create_anthropic_vision, create_openai_vision, AnthropicVisionConfig, CatalogEntry,
    ModuleCatalog, OpenAIVisionConfig, SharedVision,
};
use credence_net::{create_client, HttpConfig};
use credence_runtime::{default_registry, FusionEngine, RuntimeConfig};

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_LOCAL_MODEL: &str = "llava";

/// Exit status for an item no module could assess
const EXIT_UNASSESSABLE: u8 = 2;

#[derive(Parser)]
#[command(name = "credence")]
#[command(author, version, about = "Credence: multi-signal credibility scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one content item
    Analyze {
        /// Claim or article text
        #[arg(short, long)]
        text: Option<String>,

        /// URL the item was published at
        #[arg(short, long)]
        url: Option<String>,

        /// Image URL or local path
        #[arg(short, long)]
        media: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Module catalog (TOML); defaults to the built-in catalog
        #[arg(long)]
        catalog: Option<PathBuf>,

        #[command(flatten)]
        services: ServiceArgs,
    },

    /// List the module catalog
    Modules {
        /// Module catalog (TOML); defaults to the built-in catalog
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ServiceArgs {
    /// Brave Search API key (or set BRAVE_API_KEY env var)
    #[arg(long, env = "BRAVE_API_KEY")]
    brave_key: Option<String>,

    /// Google Safe Browsing API key (or set SAFEBROWSING_API_KEY env var)
    #[arg(long, env = "SAFEBROWSING_API_KEY")]
    safebrowsing_key: Option<String>,

    /// OpenAI API key for the vision backend (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    /// Anthropic API key for the vision backend (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    anthropic_key: Option<String>,

    /// OpenRouter API key for the vision backend (or set OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY")]
    openrouter_key: Option<String>,

    /// Base URL of a local OpenAI-compatible vision server
    #[arg(long)]
    vision_url: Option<String>,

    /// Vision model override
    #[arg(long)]
    vision_model: Option<String>,

    /// Extra domain reputation entries (JSON), merged over the built-in list
    #[arg(long)]
    reputation_db: Option<PathBuf>,

    /// Proxy for outbound requests (http, https or socks5h)
    #[arg(long)]
    proxy: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Analyze {
            text,
            url,
            media,
            json,
            catalog,
            services,
        } => run_analyze(text, url, media, json, catalog, services).await,
        Commands::Modules { catalog } => {
            list_modules(catalog)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_catalog(path: Option<PathBuf>) -> Result<ModuleCatalog> {
    Ok(match path {
        Some(path) => ModuleCatalog::load_from_file(path)?,
        None => ModuleCatalog::load_embedded()?,
    })
}

fn http_config(services: &ServiceArgs) -> HttpConfig {
    match &services.proxy {
        Some(proxy) => HttpConfig::default().with_proxy(proxy.as_str()),
        None => HttpConfig::default(),
    }
}

/// Precedence: local server, Anthropic, OpenAI, OpenRouter
fn vision_backend(services: &ServiceArgs, http: &HttpConfig) -> Result<Option<SharedVision>> {
    let model = |default: &'static str| services.vision_model.as_deref().unwrap_or(default).to_string();

    let backend = if let Some(url) = &services.vision_url {
        create_openai_vision(
            OpenAIVisionConfig::local(url, &model(DEFAULT_LOCAL_MODEL)),
            create_client(http)?,
        )?
    } else if let Some(key) = &services.anthropic_key {
        create_anthropic_vision(
            AnthropicVisionConfig::new(key, &model(DEFAULT_ANTHROPIC_MODEL)),
            create_client(http)?,
        )?
    } else if let Some(key) = &services.openai_key {
        create_openai_vision(
            OpenAIVisionConfig::openai(key, &model(DEFAULT_OPENAI_MODEL)),
            create_client(http)?,
        )?
    } else if let Some(key) = &services.openrouter_key {
        create_openai_vision(
            OpenAIVisionConfig::openrouter(key, &model(DEFAULT_OPENROUTER_MODEL)),
            create_client(http)?,
        )?
    } else {
        return Ok(None);
    };

    Ok(Some(backend))
}

/// Process exit status for an evaluation outcome
fn exit_status(outcome: &Result<FusionResult, FusionFailure>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(_) => EXIT_UNASSESSABLE,
    }
}

async fn run_analyze(
    text: Option<String>,
    url: Option<String>,
    media: Option<String>,
    json: bool,
    catalog: Option<PathBuf>,
    services: ServiceArgs,
) -> Result<ExitCode> {
    let request = AnalysisRequest::builder()
        .fields(text, url, media)
        .build()?;

    let catalog = load_catalog(catalog)?;

    let http = http_config(&services);
    let config = RuntimeConfig {
        vision: vision_backend(&services, &http)?,
        http,
        brave_api_key: services.brave_key,
        safebrowsing_api_key: services.safebrowsing_key,
        reputation_db: services.reputation_db,
    };

    let registry = default_registry(&catalog, config)?;
    let engine = FusionEngine::new(registry.into());

    let outcome = engine.evaluate(&request).await;
    match &outcome {
        Ok(result) if json => println!("{}", serde_json::to_string_pretty(result)?),
        Ok(result) => print_report(result),
        Err(failure) if json => println!("{}", serde_json::to_string_pretty(failure.breakdown())?),
        Err(failure) => print_failure(failure),
    }
    Ok(ExitCode::from(exit_status(&outcome)))
}

fn print_report(result: &FusionResult) {
    println!("Verdict:     {}", result.verdict);
    println!("Risk:        {:.3}", result.overall_score);
    println!("Credibility: {:.3}", result.credibility());
    let contributors = result.contributors().count();
    if result.degraded {
        let excluded: Vec<_> = result
            .excluded()
            .map(|c| format!("{} {}", c.module_id, c.status))
            .collect();
        println!(
            "Degraded:    yes ({} of {} modules scored; {})",
            contributors,
            result.breakdown.len(),
            excluded.join(", ")
        );
    } else {
        println!("Degraded:    no ({} modules scored)", contributors);
    }
    println!();
    print_breakdown(&result.breakdown);
}

fn print_failure(failure: &FusionFailure) {
    println!("Verdict:     insufficient signal");
    println!("Reason:      {}", failure);
    if !failure.breakdown().is_empty() {
        println!();
        print_breakdown(failure.breakdown());
    }
}

fn print_breakdown(breakdown: &[Contribution]) {
    println!(
        "{:<18} {:<10} {:>6} {:>6}  {}",
        "MODULE", "STATUS", "RISK", "WEIGHT", "RATIONALE"
    );
    for row in breakdown {
        let risk = row
            .normalized_score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<18} {:<10} {:>6} {:>6.2}  {}",
            row.module_id,
            row.status.to_string(),
            risk,
            row.effective_weight,
            row.rationale
        );
    }
}

fn catalog_row(entry: &CatalogEntry) -> String {
    format!(
        "{:<18} {:<8} {:>6.2} {:>7}ms  {}",
        entry.id,
        if entry.enabled { "yes" } else { "no" },
        entry.weight,
        entry.timeout_ms,
        entry.normalizer.describe()
    )
}

fn list_modules(catalog: Option<PathBuf>) -> Result<()> {
    let catalog = load_catalog(catalog)?;

    println!(
        "{:<18} {:<8} {:>6} {:>9}  {}",
        "MODULE", "ENABLED", "WEIGHT", "TIMEOUT", "NORMALIZER"
    );
    for entry in catalog.entries() {
        println!("{}", catalog_row(entry));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use credence_core::{fuse, ModuleSpec, SignalResult};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_analyze() {
        let cli = parse(&[
            "credence",
            "-v",
            "2",
            "analyze",
            "--text",
            "Central bank withdraws 500 notes",
            "--url",
            "https://example.com/a",
            "--json",
            "--proxy",
            "socks5h://127.0.0.1:9050",
        ]);
        assert_eq!(cli.verbose, 2);

        match cli.command {
            Commands::Analyze {
                text,
                url,
                media,
                json,
                catalog,
                services,
            } => {
                assert_eq!(text.as_deref(), Some("Central bank withdraws 500 notes"));
                assert_eq!(url.as_deref(), Some("https://example.com/a"));
                assert!(media.is_none());
                assert!(json);
                assert!(catalog.is_none());
                assert_eq!(http_config(&services).proxy.as_deref(), Some("socks5h://127.0.0.1:9050"));
            }
            Commands::Modules { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_parse_modules_and_rejects_unknown() {
        let cli = parse(&["credence", "modules", "--catalog", "custom.toml"]);
        match cli.command {
            Commands::Modules { catalog } => {
                assert_eq!(catalog, Some(PathBuf::from("custom.toml")));
            }
            Commands::Analyze { .. } => panic!("expected modules"),
        }
        assert_eq!(cli.verbose, 1);

        assert!(Cli::try_parse_from(["credence", "analyze", "--bogus"]).is_err());
        assert!(Cli::try_parse_from(["credence"]).is_err());
    }

    #[test]
    fn test_catalog_rows() {
        let catalog = load_catalog(None).unwrap();
        let rows: Vec<_> = catalog.entries().iter().map(catalog_row).collect();

        assert_eq!(rows.len(), catalog.len());
        assert!(rows[0].starts_with("tone"));
        let integrity = rows.iter().find(|r| r.starts_with("media_integrity")).unwrap();
        assert!(integrity.contains(" no "));
    }

    #[test]
    fn test_exit_status_marks_unassessable() {
        let specs = vec![ModuleSpec::new("tone", 1.0)];

        let scored = fuse(vec![SignalResult::success("tone", 0.4, 1.0, "mild")], &specs);
        assert_eq!(exit_status(&scored), 0);

        let unassessable = fuse(vec![SignalResult::failed("tone", "down")], &specs);
        assert_eq!(exit_status(&unassessable), EXIT_UNASSESSABLE);
        assert_eq!(EXIT_UNASSESSABLE, 2);
    }

    #[test]
    fn test_no_vision_credentials_means_no_backend() {
        let cli = parse(&["credence", "analyze", "--media", "photo.jpg"]);
        if let Commands::Analyze { services, .. } = cli.command {
            if services.anthropic_key.is_none()
                && services.openai_key.is_none()
                && services.openrouter_key.is_none()
            {
                let backend = vision_backend(&services, &HttpConfig::default()).unwrap();
                assert!(backend.is_none());
            }
        }
    }
}
