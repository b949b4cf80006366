use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, ExplainHandle};
use readmit_core::config::cohort_size_from_env_value;
use readmit_core::{Cohort, CohortConfig, ExplainConfig, builtin_samples, samples_from_json};
use readmit_explain::FallbackExplainer;

/// Main entry point for the readmission dashboard server
///
/// Resolves configuration from the environment once, seeds the demo cohort, probes the
/// prediction hosts so the first healthy one is tried first, then serves the REST API with
/// Swagger UI at `/swagger-ui`.
///
/// # Environment Variables
/// - `READMIT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `READMIT_API_BASE`: primary prediction host (ignored when it is the static site host)
/// - `READMIT_FALLBACK_APIS`: comma separated fallback hosts
/// - `READMIT_REQUEST_TIMEOUT_SECS`: per-host attempt timeout (default: 30)
/// - `READMIT_DEMO_COHORT_SIZE`: synthetic patients seeded at startup (default: 28)
/// - `READMIT_SAMPLE_FILE`: JSON array of patients for `POST /explain/sample` (default: built-in)
/// - `API_KEY`: when set, required in the `x-api-key` header on uploads
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - any configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("readmit_run=info".parse()?)
                .add_directive("readmit_core=info".parse()?)
                .add_directive("readmit_explain=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("READMIT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let explain_cfg = ExplainConfig::from_env_values(
        std::env::var("READMIT_API_BASE").ok(),
        std::env::var("READMIT_FALLBACK_APIS").ok(),
        std::env::var("READMIT_REQUEST_TIMEOUT_SECS").ok(),
    )?;
    let cohort_cfg = CohortConfig {
        seed_size: cohort_size_from_env_value(std::env::var("READMIT_DEMO_COHORT_SIZE").ok())?,
        ..CohortConfig::default()
    };

    let mut explainer = FallbackExplainer::from_config(&explain_cfg)?;
    match explainer.prefer_healthy().await {
        Some(host) => tracing::info!("++ Prediction host {}", host),
        None => tracing::warn!(
            "No prediction host answered its health check; keeping configured order"
        ),
    }

    let mut cohort = Cohort::new(cohort_cfg.max_cohort_size);
    cohort.seed_demo(cohort_cfg.seed_size, &mut StdRng::from_entropy());
    tracing::info!("++ Seeded {} demo patients", cohort.len());

    let samples = match std::env::var("READMIT_SAMPLE_FILE") {
        Ok(path) => match std::fs::read(&path) {
            Ok(bytes) => samples_from_json(&bytes),
            Err(e) => {
                tracing::warn!("Cannot read sample file {}: {}", path, e);
                builtin_samples()
            }
        },
        Err(_) => builtin_samples(),
    };
    tracing::info!("++ {} sample patients available", samples.len());

    let state = AppState::new(cohort, ExplainHandle::new(explainer), &cohort_cfg)
        .with_api_key(std::env::var("API_KEY").ok())
        .with_samples(samples);

    tracing::info!("++ Starting readmission REST API on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, api_rest::router(state)).await?;

    Ok(())
}
