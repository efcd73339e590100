//! `campaigner` CLI: ask the orchestrator, render charts offline, list
//! capabilities.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use uuid::Uuid;

use campaigner::artifacts::DirArtifactStore;
use campaigner::capability::contract::BrandContext;
use campaigner::capability::fixture::FixtureData;
use campaigner::capability::model::ModelSpecialist;
use campaigner::capability::{
    Capabilities, CapabilityName, CapabilityRegistry, ChartCapability, ChartTool, Specialist,
};
use campaigner::chart::{ChartKind, ChartSpec};
use campaigner::config::Config;
use campaigner::logging;
use campaigner::pipeline::Controller;
use campaigner::providers::openai::OpenAiProvider;
use campaigner::providers::LlmProvider;

#[derive(Parser)]
#[command(
    name = "campaigner",
    version,
    about = "Call-budgeted marketing-analytics orchestrator"
)]
struct Cli {
    /// Config file (default: ./campaigner.toml or $CAMPAIGNER_CONFIG_PATH).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write JSON logs to this directory in addition to stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a request through the pipeline and print the report.
    Ask {
        /// The request, in Hebrew or English.
        #[arg(required = true)]
        request: Vec<String>,

        /// Serve data from a JSON file instead of the warehouse model.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Render charts from a JSON data file and print the outcome.
    Chart {
        /// Data payload (records, column-oriented or a data envelope).
        #[arg(long)]
        data: PathBuf,

        /// Preferred time column.
        #[arg(long)]
        time_column: Option<String>,

        /// Preferred metric; repeat for several.
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Chart kind hint.
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Artifact directory (default: the configured one).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the capability registry as JSON.
    Capabilities,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Line,
    Bar,
}

impl From<KindArg> for ChartKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Line => Self::Line,
            KindArg::Bar => Self::Bar,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_production(dir)?),
        None => {
            logging::init_cli();
            None
        }
    };

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ask { request, data } => ask(&config, &request.join(" "), data.as_deref()).await,
        Command::Chart {
            data,
            time_column,
            metrics,
            kind,
            out,
        } => {
            let spec = ChartSpec {
                preferred_time_column: time_column,
                preferred_metrics: metrics,
                chart_kind_hint: kind.map(ChartKind::from),
            };
            chart(&config, &data, spec, out)
        }
        Command::Capabilities => {
            let registry = CapabilityRegistry::standard()?;
            let json = serde_json::to_string_pretty(registry.descriptors())
                .context("failed to serialize registry")?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn ask(config: &Config, request: &str, data: Option<&Path>) -> anyhow::Result<()> {
    let registry = Arc::new(CapabilityRegistry::standard()?);
    let capabilities = build_capabilities(config, data);
    let controller = Controller::new(registry, capabilities, config.brand_policy());

    let report = controller
        .run(request)
        .await
        .context("pipeline failed")?;
    println!("{report}");
    Ok(())
}

fn chart(config: &Config, data: &Path, spec: ChartSpec, out: Option<PathBuf>) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(data)
        .with_context(|| format!("failed to read {}", data.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", data.display()))?;

    let root = out.unwrap_or_else(|| config.artifacts.dir.clone());
    let tool = ChartCapability::new(
        Arc::new(DirArtifactStore::new(root.clone())),
        config.chart_options(),
    );
    let request_id = Uuid::new_v4().to_string();
    let outcome = tool.plot(&request_id, &payload, &[spec]);
    info!(request_id = %request_id, dir = %root.display(), artifacts = outcome.artifacts.len(), "charts rendered");

    let json = serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?;
    println!("{json}");
    if !outcome.is_success() {
        anyhow::bail!("chart rendering failed");
    }
    Ok(())
}

fn build_capabilities(config: &Config, data: Option<&Path>) -> Capabilities {
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        &config.model.base_url,
        config.model.model.clone(),
        config.model.api_key(|key| std::env::var(key).ok()),
    ));
    let fallback = BrandContext {
        brand: config.brand.default.clone(),
        language: config.brand.language.clone(),
    };
    let specialist = |name: CapabilityName| -> Arc<dyn Specialist> {
        Arc::new(ModelSpecialist::new(
            name,
            Arc::clone(&provider),
            fallback.clone(),
            config.warehouse_hints(),
            config.model.max_tokens,
        ))
    };

    let data_specialist: Arc<dyn Specialist> =
        match data.map(Path::to_path_buf).or_else(|| config.data.fixture.clone()) {
            Some(path) => {
                info!(path = %path.display(), "serving data from file");
                Arc::new(FixtureData::new(path))
            }
            None => specialist(CapabilityName::Data),
        };

    Capabilities {
        data: data_specialist,
        performance: specialist(CapabilityName::Performance),
        creative: specialist(CapabilityName::Creative),
        research: specialist(CapabilityName::Research),
        chart: Arc::new(ChartCapability::new(
            Arc::new(DirArtifactStore::new(config.artifacts.dir.clone())),
            config.chart_options(),
        )),
    }
}
