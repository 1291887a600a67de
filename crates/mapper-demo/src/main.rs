//! mapper-demo: routes one set of mapper interfaces across two databases.

mod backend;
mod config;
mod mappers;
mod service;
mod target;
mod workload;

use config::DemoConfig;
use service::TransactionTestService;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("MAPPER_DEMO_CONFIG").ok())
        .unwrap_or_else(|| "mapper-demo.toml".to_string());

    let operations_override = args
        .iter()
        .position(|a| a == "--operations")
        .and_then(|i| args.get(i + 1))
        .map(|v| v.parse::<usize>())
        .transpose()?;

    let skip_duplicate_check = args.iter().any(|a| a == "--skip-duplicate-check");

    // Load configuration
    let mut config = DemoConfig::load(&config_path)?;

    // Apply CLI overrides (take precedence over TOML and env vars)
    if let Some(operations) = operations_override {
        config.workload.operations = operations;
    }
    if skip_duplicate_check {
        config.workload.duplicate_check = false;
    }

    // The OTLP batch exporter needs a reactor, so build the runtime first
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let _tracing_guard = routed_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            databases = config.databases.len(),
            operations = config.workload.operations,
            max_concurrent = config.workload.max_concurrent,
            "Starting mapper-demo"
        );

        run(config).await
    })
}

async fn run(config: DemoConfig) -> anyhow::Result<()> {
    // Fails here, before any routed call, if a target has no database
    let proxies = service::build_proxies(&config.databases)?;
    let service = TransactionTestService::new(&proxies)?;

    let report = workload::run(service.clone(), &config.workload).await?;

    tracing::info!(
        report = %serde_json::to_string(&report)?,
        stats = %serde_json::to_string(&proxies.stats().snapshot())?,
        "Workload finished"
    );

    for (interface, targets) in service.materialized_targets() {
        tracing::info!(interface = interface, targets = ?targets, "Materialized mapper targets");
    }

    for (target, factory) in proxies.registry().backends() {
        let database = factory.database();
        tracing::info!(
            key = %target,
            database = %database.name(),
            data_1_rows = database.row_count("DATA_1"),
            data_2_rows = database.row_count("DATA_2"),
            mappers = factory.materialized(),
            "Database summary"
        );
    }

    if report.failed > 0 || report.duplicate_key_propagated == Some(false) {
        anyhow::bail!(
            "workload had {} failed operation(s), duplicate check: {:?}",
            report.failed,
            report.duplicate_key_propagated
        );
    }

    Ok(())
}
