//! Command implementations.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use recommend_catalog::{verify_catalog, CatalogBuilder, CatalogReport, LocalCatalog};
use recommend_embeddings::{CandleEmbedder, CandleLoader, EmbedderManager, ModelCache};
use recommend_resolver::{
    FailingResolver, GeminiResolver, GeminiResolverConfig, QueryNormalizer, TextResolver,
};
use recommend_service::{
    evaluate, run_server_with_shutdown, AppState, EvalCase, Recommender, ResultCache,
    SearchOrchestrator,
};
use recommend_types::{RankedResult, Settings};

/// Load settings and apply the global CLI overrides.
///
/// Precedence: defaults, config file, `RECOMMEND_*` environment, CLI flags.
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    catalog_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(catalog) = catalog_override {
        settings.catalog_path = catalog.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn model_cache(settings: &Settings) -> ModelCache {
    ModelCache::new(settings.expanded_model_cache_dir(), settings.model_repo.clone())
}

fn build_resolver(settings: &Settings) -> Result<Arc<dyn TextResolver>> {
    match GeminiResolverConfig::from_settings(&settings.resolver) {
        Ok(config) => {
            let resolver = GeminiResolver::new(config).context("Failed to create resolver")?;
            Ok(Arc::new(resolver))
        }
        Err(e) => {
            warn!(error = %e, "URL queries will use the fallback query");
            Ok(Arc::new(FailingResolver::new(e.to_string())))
        }
    }
}

/// Wire the full pipeline against the on-disk catalog.
///
/// The model's dimension is checked against the catalog manifest here, before
/// any request; the model weights themselves load on first use.
pub fn build_recommender(settings: &Settings) -> Result<Recommender> {
    let manager = Arc::new(EmbedderManager::new(
        CandleLoader::new(model_cache(settings)),
        settings.residency,
    ));
    let dimension = manager
        .model_dimension()
        .context("Failed to read embedding model configuration")?;

    let catalog_path = settings.expanded_catalog_path();
    let catalog = LocalCatalog::open(&catalog_path, dimension)
        .with_context(|| format!("Failed to open catalog at {}", catalog_path.display()))?;

    let orchestrator = Arc::new(SearchOrchestrator::new(
        manager,
        Arc::new(catalog),
        settings.max_top_k,
    ));
    let normalizer = QueryNormalizer::new(build_resolver(settings)?);
    let cache = Arc::new(ResultCache::new(settings.cache_capacity));

    Ok(Recommender::new(normalizer, orchestrator, cache))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Serve the HTTP API until Ctrl+C or SIGTERM.
pub async fn start_server(
    mut settings: Settings,
    host_override: Option<&str>,
    port_override: Option<u16>,
) -> Result<()> {
    if let Some(host) = host_override {
        settings.http_host = host.to_string();
    }
    if let Some(port) = port_override {
        settings.http_port = port;
    }

    info!("Assessment recommender starting...");
    info!("  Catalog path: {}", settings.catalog_path);
    info!("  Model: {}", settings.model_repo);
    info!("  HTTP address: {}", settings.http_addr());
    info!("  Residency: {:?}", settings.residency);

    let addr: SocketAddr = settings
        .http_addr()
        .parse()
        .context("Invalid HTTP address")?;

    let recommender = build_recommender(&settings)?;
    let state = AppState::new(recommender, settings.default_top_k);

    run_server_with_shutdown(
        addr,
        state,
        Duration::from_secs(settings.request_timeout_secs),
        shutdown_signal(),
    )
    .await
    .context("Server error")
}

/// Build the catalog from raw JSON at `input`.
pub fn build_catalog(settings: &Settings, input: &Path) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let embedder =
        CandleEmbedder::load(&model_cache(settings)).context("Failed to load embedding model")?;

    let catalog_path = settings.expanded_catalog_path();
    let stats = CatalogBuilder::new(&embedder)
        .build_from_json(&catalog_path, &json)
        .context("Catalog build failed")?;

    println!(
        "Indexed {} assessments into {} ({} records skipped)",
        stats.items_indexed,
        catalog_path.display(),
        stats.records_skipped
    );
    println!(
        "Model: {} ({} dims)",
        stats.manifest.model, stats.manifest.dimension
    );
    Ok(())
}

/// Report on the catalog. Returns whether it is ready to serve.
pub fn verify(settings: &Settings) -> Result<bool> {
    let report = verify_catalog(settings.expanded_catalog_path())?;
    match &report {
        CatalogReport::Ready { .. } => println!("OK: {report}"),
        _ => println!("FAILED: {report}"),
    }
    Ok(report.is_ready())
}

/// Numbered result table.
pub fn format_results(result: &RankedResult) -> String {
    if result.is_empty() {
        return "No recommendations found.".to_string();
    }

    let mut out = String::new();
    for ranked in result.iter() {
        let item = &ranked.item;
        out.push_str(&format!("{:>2}. {}\n", ranked.rank, item.name));
        out.push_str(&format!("    URL:      {}\n", item.url));
        out.push_str(&format!("    Duration: {}\n", item.duration));
        out.push_str(&format!(
            "    Remote: {}  Adaptive/IRT: {}  Type: {}\n",
            item.remote_testing, item.adaptive_irt_support, item.test_type
        ));
    }
    out
}

/// Run one query through the in-process pipeline.
pub async fn run_query(settings: &Settings, text: &str, top_k: Option<usize>) -> Result<()> {
    let k = top_k.unwrap_or(settings.default_top_k);
    let recommender = build_recommender(settings)?;
    let result = recommender
        .recommend(text, None, k)
        .await
        .context("Recommendation failed")?;

    print!("{}", format_results(&result));
    Ok(())
}

/// Score the pipeline against the cases in `cases_path`.
pub async fn run_evaluation(settings: &Settings, cases_path: &Path, k: usize) -> Result<()> {
    ensure!(
        (1..=settings.max_top_k).contains(&k),
        "top_k must be between 1 and {}",
        settings.max_top_k
    );

    let json = std::fs::read_to_string(cases_path)
        .with_context(|| format!("Failed to read {}", cases_path.display()))?;
    let cases: Vec<EvalCase> =
        serde_json::from_str(&json).context("Evaluation file must be a list of cases")?;
    if cases.is_empty() {
        bail!("No evaluation cases in {}", cases_path.display());
    }

    let recommender = build_recommender(settings)?;
    let report = evaluate(&recommender, &cases, k).await;

    for score in &report.queries {
        println!("Query: {}", score.query);
        match &score.error {
            Some(e) => println!("  error: {e}\n"),
            None => println!(
                "  Recall@{k}: {:.2}, AP@{k}: {:.2}\n",
                score.recall, score.average_precision
            ),
        }
    }
    println!("Mean Recall@{k}: {:.2}", report.mean_recall);
    println!("MAP@{k}: {:.2}", report.map);
    if report.failed() > 0 {
        println!("{} queries failed and were not scored", report.failed());
    }
    Ok(())
}
