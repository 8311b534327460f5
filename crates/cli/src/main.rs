mod repository;

use std::path::{Path, PathBuf};
use std::process;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use minibroker_core::config::{
    DEFAULT_REPOSITORY_URL, ENV_CATALOG_ENABLED_ONLY, ENV_NAMESPACE, ENV_REPOSITORY_URL,
    SERVICE_ACCOUNT_NAMESPACE_PATH,
};
use minibroker_core::{
    build_catalog, BrokerConfig, Catalog, ChartRepository, ConfigError, ProviderRegistry,
};
use tracing_subscriber::EnvFilter;

use crate::repository::LocalIndexRepository;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Minibroker service broker tooling.
#[derive(Parser)]
#[command(name = "minibroker", version, about = "Minibroker service broker tooling")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Namespace holding the broker's instance records
    #[arg(long, global = true, env = ENV_NAMESPACE)]
    namespace: Option<String>,

    /// Namespace file read when no namespace is given
    #[arg(long, global = true, default_value = SERVICE_ACCOUNT_NAMESPACE_PATH)]
    namespace_file: PathBuf,

    /// Chart repository URL
    #[arg(long, global = true, env = ENV_REPOSITORY_URL, default_value = DEFAULT_REPOSITORY_URL)]
    repository_url: String,

    /// Only list services that have a credential provider
    #[arg(
        long,
        global = true,
        env = ENV_CATALOG_ENABLED_ONLY,
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    enabled_only: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// The broker configuration these flags describe.
    fn config(&self) -> Result<BrokerConfig, ConfigError> {
        let namespace = match self.namespace.as_deref().map(str::trim) {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => BrokerConfig::discover_namespace(&self.namespace_file)?,
        };
        let config = BrokerConfig::new(namespace)
            .with_repository_url(&self.repository_url)
            .with_catalog_enabled_only(self.enabled_only);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the service catalog built from a chart repository index
    Catalog {
        /// Path to the repository index.yaml
        #[arg(long)]
        index: PathBuf,
    },
    /// Print the effective broker configuration
    Config,
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Catalog { index } => {
            cmd_catalog(index, cli.enabled_only, cli.output).await;
        }
        Commands::Config => cmd_config(&cli),
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_catalog(index: &Path, enabled_only: bool, output: OutputFormat) {
    let repository = match LocalIndexRepository::load(index) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("error loading index '{}': {}", index.display(), e), output);
            process::exit(1);
        }
    };
    let charts = match repository.list_charts().await {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error listing charts: {}", e), output);
            process::exit(1);
        }
    };

    let providers = ProviderRegistry::with_defaults();
    let catalog = build_catalog(&charts, |name| !enabled_only || providers.contains(name));
    tracing::info!(services = catalog.services.len(), enabled_only, "catalog built");

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&catalog) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                report_error(&format!("serialization error: {}", e), output);
                process::exit(1);
            }
        },
        OutputFormat::Text => print!("{}", render_catalog(&catalog)),
    }
}

fn cmd_config(cli: &Cli) {
    let config = match cli.config() {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), cli.output);
            process::exit(1);
        }
    };

    match cli.output {
        OutputFormat::Json => match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                report_error(&format!("serialization error: {}", e), cli.output);
                process::exit(1);
            }
        },
        OutputFormat::Text => {
            println!("namespace: {}", config.namespace);
            println!("repository_url: {}", config.repository_url);
            println!("catalog_enabled_only: {}", config.catalog_enabled_only);
        }
    }
}

fn render_catalog(catalog: &Catalog) -> String {
    if catalog.is_empty() {
        return "no services\n".to_string();
    }

    let mut out = String::new();
    for service in &catalog.services {
        out.push_str(&service.id);
        if !service.tags.is_empty() {
            out.push_str(&format!(" [{}]", service.tags.join(", ")));
        }
        out.push('\n');
        for plan in &service.plans {
            out.push_str(&format!(
                "  {}  (chart {})  {}\n",
                plan.id, plan.chart_version, plan.description
            ));
        }
    }
    out
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            let body = serde_json::json!({ "error": msg });
            eprintln!("{}", body);
        }
    }
}
