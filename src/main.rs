use std::{
    io::{self, BufReader},
    sync::Arc,
};

use anyhow::{Context, Result};
use tracing::info;

use eda_agent::{
    agent::{EdaAgent, LlmPlanner},
    cli::Cli,
    config::{AgentSettings, Config},
    functions::Registry,
    handlers,
    llm::{ChatBackend, LlmClient},
    printer::Printers,
    table,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cfg = Config::load();
    let mut settings = AgentSettings::from_config(&cfg);
    // CLI overrides config
    if let Some(model) = args.model.clone() {
        settings.model = model;
    }

    let table = table::load(&args.path)
        .with_context(|| format!("failed to load dataset {}", args.path.display()))?;

    let backend: Arc<dyn ChatBackend> = Arc::new(LlmClient::from_config(&cfg)?);
    let registry = Registry::new(backend.clone(), settings.vision_model.clone());
    let planner = LlmPlanner::new(backend, settings.model.clone(), registry.schemas());
    info!(model = %settings.model, "agent ready");
    let mut agent = EdaAgent::new(table, Box::new(planner), registry, settings);

    let printers = Printers::for_stdout(!args.no_md);
    let mut stdout = io::stdout();
    if args.interactive {
        let stdin = BufReader::new(io::stdin());
        handlers::interactive::run_loop(&mut agent, stdin, &mut stdout, &printers).await
    } else {
        handlers::analyze::run(&mut agent, &mut stdout, &printers).await
    }
}
