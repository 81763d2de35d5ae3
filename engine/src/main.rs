use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use routecast_agents::{Agent, AgentConfig, HttpFetchEndpoint, HttpSearchEndpoint, MockFetch, MockSearch, RetrievalAgent};
use routecast_aggregator::{emit, ResultAggregator};
use routecast_breaker::BreakerRegistry;
use routecast_checkpoint::CheckpointStore;
use routecast_config::AppConfig;
use routecast_judge::Judge;
use routecast_llm::{build_auto_provider, ClientConfig, LlmClient, ProviderCredentials};
use routecast_metrics::MetricsSink;
use routecast_orchestrator::Orchestrator;
use routecast_route::{CachedRouteProvider, HttpMapsClient, LiveRouteProvider, RouteBundle};
use routecast_scheduler::Scheduler;
use routecast_types::AgentKind;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "routecast")]
#[command(about = "Enriches a driving route with per-step video, song and knowledge-article picks")]
struct Cli {
    /// Route origin, e.g. "Boston Common, Boston, MA"
    origin: String,
    /// Route destination, e.g. "MIT, Cambridge, MA"
    destination: String,

    #[arg(long, default_value = "routecast.yaml")]
    config: PathBuf,

    /// Pre-shaped route document (Task[] JSON); when set, skips the live directions API.
    #[arg(long)]
    cached_route: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Where to write the formatted output; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, path = %cli.config.display(), "config file unreadable; using documented defaults");
            AppConfig::default()
        }
    };

    let transaction_id = uuid::Uuid::new_v4().to_string();
    let checkpoint = CheckpointStore::new(config.output.checkpoint_dir.clone());
    checkpoint
        .prune_older_than(config.output.checkpoint_retention_days)
        .await
        .context("pruning old checkpoints")?;

    let metrics = Arc::new(MetricsSink::new(config.metrics.file.clone()));
    let flush_handle = metrics.clone().spawn_periodic_flush(config.metrics.update_interval());

    let bundle = load_route(&cli, &config, &checkpoint, &transaction_id).await?;
    info!(steps = bundle.tasks.len(), transaction_id, "route loaded");

    let breakers = BreakerRegistry::new(config.circuit_breaker.to_breaker_config());
    let llm = build_llm_client();

    let mut agents: HashMap<AgentKind, Arc<dyn Agent>> = HashMap::new();
    for kind in AgentKind::ALL {
        let agent_config = kind_config(&config, kind).to_agent_config();
        agents.insert(kind, build_agent(kind, agent_config, breakers.clone(), llm.clone(), checkpoint.clone(), metrics.clone()));
    }

    let judge = Arc::new(Judge::new(
        config.judge.to_judge_config(),
        llm.clone(),
        checkpoint.clone(),
        metrics.clone(),
    ));
    let aggregator = Arc::new(ResultAggregator::new(checkpoint.clone()));
    let orchestrator = Orchestrator::new(agents, judge, aggregator.clone(), metrics.clone(), config.orchestrator.max_workers);

    let (tx, rx) = tokio::sync::mpsc::channel(config.orchestrator.max_workers.max(1) * 2);
    let scheduler = Scheduler::new(checkpoint.clone());
    let cancel = CancellationToken::new();

    let scheduler_run = scheduler.run(bundle.tasks, config.scheduler_interval(), tx, cancel);
    let orchestrator_run = orchestrator.run(rx);
    tokio::join!(scheduler_run, orchestrator_run);

    let steps = aggregator.finish().await;
    info!(steps = steps.len(), "pipeline complete");

    flush_handle.abort();
    metrics.flush().await;

    let rendered = match cli.format {
        OutputFormat::Json => emit::to_json_array(&steps)?,
        OutputFormat::Markdown => emit::to_markdown(&steps),
        OutputFormat::Csv => emit::to_csv(&steps),
    };

    match cli.output {
        Some(path) => {
            tokio::fs::write(&path, rendered).await.with_context(|| format!("writing output to {}", path.display()))?;
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

async fn load_route(cli: &Cli, config: &AppConfig, checkpoint: &CheckpointStore, transaction_id: &str) -> anyhow::Result<RouteBundle> {
    if let Some(path) = &cli.cached_route {
        return CachedRouteProvider::new(checkpoint.clone())
            .load(path, transaction_id, &cli.destination)
            .await
            .context("loading cached route");
    }

    let maps_base_url = std::env::var("ROUTECAST_MAPS_BASE_URL").ok();
    let maps_api_key = std::env::var("ROUTECAST_MAPS_API_KEY").ok().filter(|v| !v.trim().is_empty());

    match (maps_base_url, maps_api_key) {
        (Some(base_url), Some(api_key)) => {
            let client = HttpMapsClient::new(base_url, api_key);
            let provider = LiveRouteProvider::new(client.clone(), client, config.route_provider.to_live_route_config(), checkpoint.clone());
            provider
                .plan(&cli.origin, &cli.destination, transaction_id)
                .await
                .map_err(anyhow::Error::from)
        }
        _ => anyhow::bail!(
            "no route source available: set ROUTECAST_MAPS_BASE_URL and ROUTECAST_MAPS_API_KEY for a live route, or pass --cached-route"
        ),
    }
}

fn build_llm_client() -> Option<Arc<LlmClient>> {
    let credentials = ProviderCredentials::from_env();
    let provider = build_auto_provider(&credentials);
    Some(Arc::new(LlmClient::new(provider, ClientConfig::default())))
}

fn kind_config(config: &AppConfig, kind: AgentKind) -> routecast_config::AgentKindConfig {
    match kind {
        AgentKind::Video => config.agents.video.clone(),
        AgentKind::Song => config.agents.song.clone(),
        AgentKind::Knowledge => config.agents.knowledge.clone(),
    }
}

fn build_agent(
    kind: AgentKind,
    agent_config: AgentConfig,
    breakers: BreakerRegistry,
    llm: Option<Arc<LlmClient>>,
    checkpoint: CheckpointStore,
    metrics: Arc<MetricsSink>,
) -> Arc<dyn Agent> {
    let prefix = kind.as_str().to_ascii_uppercase();
    let search_url = std::env::var(format!("ROUTECAST_{prefix}_SEARCH_URL")).ok();
    let fetch_url = std::env::var(format!("ROUTECAST_{prefix}_FETCH_URL")).ok();
    let api_key = std::env::var(format!("ROUTECAST_{prefix}_API_KEY")).ok().filter(|v| !v.trim().is_empty());

    match (search_url, fetch_url) {
        (Some(search_url), Some(fetch_url)) => {
            info!(kind = kind.as_str(), "using configured upstream endpoint");
            Arc::new(RetrievalAgent::new(
                kind,
                HttpSearchEndpoint::new(search_url, api_key.clone(), kind.as_str()),
                HttpFetchEndpoint::new(fetch_url, api_key),
                breakers,
                llm,
                checkpoint,
                metrics,
                agent_config,
            ))
        }
        _ => {
            info!(kind = kind.as_str(), "no upstream endpoint configured; using the deterministic mock");
            Arc::new(RetrievalAgent::new(
                kind,
                MockSearch { kind },
                MockFetch,
                breakers,
                llm,
                checkpoint,
                metrics,
                agent_config,
            ))
        }
    }
}
